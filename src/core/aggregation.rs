use crate::core::detector::RuntimeInterval;
use crate::core::units::duration_in_hours;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use thiserror::Error;

/// Pure folds over already-detected runtime intervals: per-room totals,
/// energy conversion via a linear power rate, and cross-room summaries.

pub(crate) fn total_duration(intervals: &[RuntimeInterval]) -> TimeDelta {
    intervals
        .iter()
        .fold(TimeDelta::zero(), |acc, interval| acc + interval.duration())
}

/// Detection outcome for one room, read-only once constructed.
#[derive(Clone, Debug)]
pub struct RoomResult {
    room_id: String,
    intervals: Vec<RuntimeInterval>,
    total_runtime: TimeDelta,
    sample_span: (NaiveDateTime, NaiveDateTime),
}

impl RoomResult {
    pub fn new(
        room_id: impl Into<String>,
        intervals: Vec<RuntimeInterval>,
        sample_span: (NaiveDateTime, NaiveDateTime),
    ) -> Self {
        let total_runtime = total_duration(&intervals);
        Self {
            room_id: room_id.into(),
            intervals,
            total_runtime,
            sample_span,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn intervals(&self) -> &[RuntimeInterval] {
        &self.intervals
    }

    pub fn total_runtime(&self) -> TimeDelta {
        self.total_runtime
    }

    pub fn sample_span(&self) -> (NaiveDateTime, NaiveDateTime) {
        self.sample_span
    }

    /// Calendar dates covered by the room's data.
    pub fn period(&self) -> (NaiveDate, NaiveDate) {
        (self.sample_span.0.date(), self.sample_span.1.date())
    }

    pub fn energy_kwh(&self, power_rate_kw: f64) -> f64 {
        duration_in_hours(self.total_runtime) * power_rate_kw
    }
}

/// Totals across all successfully analysed rooms.
#[derive(Clone, Debug, PartialEq)]
pub struct CombinedSummary {
    pub total_runtime: TimeDelta,
    pub energy_kwh: f64,
    pub period: (NaiveDate, NaiveDate),
    pub day_count: i64,
    /// Average runtime per calendar day, present when the combined period
    /// spans more than one day.
    pub average_runtime_per_day: Option<TimeDelta>,
}

#[derive(Clone, Copy, Debug, Error)]
#[error("cannot summarise an empty set of room results")]
pub struct EmptySummaryError;

/// Fold per-room results into combined totals. Rooms are independent, so the
/// combined runtime is a simple sum; the combined period is the widest date
/// range any room covers, counted inclusive of both endpoints.
pub fn summarise<'a>(
    results: impl IntoIterator<Item = &'a RoomResult>,
    power_rate_kw: f64,
) -> Result<CombinedSummary, EmptySummaryError> {
    let mut total_runtime = TimeDelta::zero();
    let mut period: Option<(NaiveDate, NaiveDate)> = None;

    for result in results {
        total_runtime = total_runtime + result.total_runtime();
        let (first, last) = result.period();
        period = Some(match period {
            Some((start, end)) => (start.min(first), end.max(last)),
            None => (first, last),
        });
    }

    let period = period.ok_or(EmptySummaryError)?;
    let day_count = (period.1 - period.0).num_days() + 1;
    let average_runtime_per_day =
        (day_count > 1).then(|| total_runtime / day_count as i32);

    Ok(CombinedSummary {
        total_runtime,
        energy_kwh: duration_in_hours(total_runtime) * power_rate_kw,
        period,
        day_count,
        average_runtime_per_day,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::units::format_clock_duration;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 8, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn room_with_runtime(room_id: &str, day: u32, hours: i64) -> RoomResult {
        RoomResult::new(
            room_id,
            vec![RuntimeInterval {
                start: at(day, 12),
                end: at(day, 12 + hours as u32),
            }],
            (at(day, 0), at(day, 23)),
        )
    }

    #[rstest]
    fn should_total_interval_durations_per_room() {
        let result = RoomResult::new(
            "Wohnzimmer",
            vec![
                RuntimeInterval {
                    start: at(1, 10),
                    end: at(1, 11),
                },
                RuntimeInterval {
                    start: at(1, 14),
                    end: at(1, 16),
                },
            ],
            (at(1, 0), at(1, 23)),
        );

        assert_eq!(result.total_runtime(), TimeDelta::hours(3));
        assert_eq!(result.period(), (at(1, 0).date(), at(1, 0).date()));
        assert_relative_eq!(result.energy_kwh(1.3), 3.9, max_relative = 1e-12);
    }

    #[rstest]
    fn should_combine_independent_rooms() {
        // one 1-hour room and one 2-hour room at 1.3 kW
        let rooms = [
            room_with_runtime("Wohnzimmer", 1, 1),
            room_with_runtime("Schlafzimmer", 1, 2),
        ];

        let summary = summarise(&rooms, 1.3).unwrap();

        assert_eq!(summary.total_runtime, TimeDelta::hours(3));
        assert_relative_eq!(summary.energy_kwh, 3.9, max_relative = 1e-12);
        assert_eq!(format!("{:.2}", summary.energy_kwh), "3.90");
        assert_eq!(format_clock_duration(summary.total_runtime), "03:00");
        assert_eq!(summary.day_count, 1);
        assert_eq!(summary.average_runtime_per_day, None);
    }

    #[rstest]
    fn should_widen_period_and_average_over_inclusive_day_count() {
        let rooms = [
            RoomResult::new(
                "Wohnzimmer",
                vec![RuntimeInterval {
                    start: at(1, 10),
                    end: at(1, 15),
                }],
                (at(1, 0), at(3, 23)),
            ),
            RoomResult::new(
                "Schlafzimmer",
                vec![RuntimeInterval {
                    start: at(2, 10),
                    end: at(2, 15),
                }],
                (at(2, 0), at(5, 23)),
            ),
        ];

        let summary = summarise(&rooms, 1.3).unwrap();

        assert_eq!(summary.period, (at(1, 0).date(), at(5, 0).date()));
        assert_eq!(summary.day_count, 5);
        assert_eq!(
            summary.average_runtime_per_day,
            Some(TimeDelta::hours(2)),
            "10 hours over 5 inclusive days"
        );
    }

    #[rstest]
    fn should_reject_empty_result_set() {
        let no_rooms: [RoomResult; 0] = [];
        assert!(summarise(&no_rooms, 1.3).is_err());
    }

    #[rstest]
    fn rooms_without_intervals_contribute_zero() {
        let rooms = [
            RoomResult::new("Wohnzimmer", vec![], (at(1, 0), at(1, 23))),
            room_with_runtime("Schlafzimmer", 1, 2),
        ];

        let summary = summarise(&rooms, 1.0).unwrap();

        assert_eq!(summary.total_runtime, TimeDelta::hours(2));
        assert_relative_eq!(summary.energy_kwh, 2.0);
    }
}
