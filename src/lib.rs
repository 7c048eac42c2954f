pub mod core;
mod errors;
pub mod input;
pub mod output;
pub mod read_temperature_file;

pub use crate::errors::AnalysisError;

use crate::core::aggregation::{summarise, CombinedSummary, RoomResult};
use crate::core::detector::{RuntimeDetector, Sample};
use crate::core::units::{duration_in_hours, format_clock_duration};
use crate::input::AnalysisSettings;
use crate::output::Output;
use anyhow::anyhow;
use chrono::TimeDelta;
use csv::WriterBuilder;
use indexmap::IndexMap;
use rayon::prelude::*;
use std::io::Read;
use tracing::{info, warn};

/// Everything one analysis run produced, for the presentation layer to render.
#[derive(Debug)]
pub struct RunResults {
    pub rooms: IndexMap<String, RoomResult>,
    pub skipped_rooms: Vec<SkippedRoom>,
    pub summary: CombinedSummary,
    pub sweep: Option<Vec<SweepPoint>>,
}

/// A room whose input was rejected; the rest of the batch still ran.
#[derive(Clone, Debug)]
pub struct SkippedRoom {
    pub room_id: String,
    pub reason: String,
}

/// Combined totals for one sustain duration explored by the sweep.
#[derive(Clone, Debug)]
pub struct SweepPoint {
    pub sustain: TimeDelta,
    pub total_runtime: TimeDelta,
    pub energy_kwh: f64,
}

/// Run the whole analysis: load each room's series, infer runtime intervals,
/// aggregate and (optionally) sweep the sustain duration, writing CSV reports
/// through `output`.
///
/// Rooms are processed independently. A room whose data is rejected is
/// logged, recorded in `skipped_rooms` and excluded from the totals; only a
/// batch in which no room survives is an error.
pub fn run_analysis<R: Read>(
    rooms: Vec<(String, R)>,
    settings: &AnalysisSettings,
    output: impl Output,
    run_sweep: bool,
) -> Result<RunResults, AnalysisError> {
    settings.validate()?;
    let detector = RuntimeDetector::new(settings.detection_config()?);

    let mut room_samples: IndexMap<String, Vec<Sample>> = IndexMap::new();
    let mut skipped_rooms: Vec<SkippedRoom> = Vec::new();
    for (room_id, source) in rooms {
        match read_temperature_file::temperature_data_to_samples(source, &room_id) {
            Ok(samples) => {
                room_samples.insert(room_id, samples);
            }
            Err(error) => {
                warn!("skipping room {room_id}: {error:#}");
                skipped_rooms.push(SkippedRoom {
                    room_id,
                    reason: format!("{error:#}"),
                });
            }
        }
    }
    if room_samples.is_empty() {
        return Err(AnalysisError::InvalidRequest(anyhow!(
            "no room produced a usable sample series"
        )));
    }

    let rooms: IndexMap<String, RoomResult> = room_samples
        .iter()
        .map(|(room_id, samples)| {
            let intervals = detector.detect(samples);
            info!(
                "analysed room {room_id}: {} runtime interval(s)",
                intervals.len()
            );
            let sample_span = (
                samples[0].timestamp,
                samples[samples.len() - 1].timestamp,
            );
            (
                room_id.clone(),
                RoomResult::new(room_id.clone(), intervals, sample_span),
            )
        })
        .collect();

    let summary = summarise(rooms.values(), settings.power_consumption_rate_kw)?;

    let sweep = run_sweep
        .then(|| sweep_sustain_durations(&room_samples, settings))
        .transpose()?;

    write_reports(
        output,
        &rooms,
        &summary,
        sweep.as_deref(),
        settings.power_consumption_rate_kw,
    )?;

    Ok(RunResults {
        rooms,
        skipped_rooms,
        summary,
        sweep,
    })
}

/// Re-run detection across the configured range of sustain durations. Each
/// sweep point is independent of every other, so they run in parallel; the
/// detector state never crosses a room or config boundary.
fn sweep_sustain_durations(
    room_samples: &IndexMap<String, Vec<Sample>>,
    settings: &AnalysisSettings,
) -> Result<Vec<SweepPoint>, AnalysisError> {
    let base_config = settings.detection_config()?;

    settings
        .sweep_values()
        .into_par_iter()
        .map(|sustain| {
            let detector = RuntimeDetector::new(base_config.with_sustain_duration(sustain)?);
            let total_runtime = room_samples
                .values()
                .map(|samples| {
                    detector
                        .detect(samples)
                        .iter()
                        .fold(TimeDelta::zero(), |acc, interval| acc + interval.duration())
                })
                .fold(TimeDelta::zero(), |acc, room_total| acc + room_total);

            Ok(SweepPoint {
                sustain,
                total_runtime,
                energy_kwh: duration_in_hours(total_runtime)
                    * settings.power_consumption_rate_kw,
            })
        })
        .collect()
}

const SUMMARY_REPORT_KEY: &str = "summary";
const SWEEP_REPORT_KEY: &str = "sustain_sweep";
const COMBINED_ROOMS_LABEL: &str = "all rooms";

fn write_reports(
    output: impl Output,
    rooms: &IndexMap<String, RoomResult>,
    summary: &CombinedSummary,
    sweep: Option<&[SweepPoint]>,
    power_rate_kw: f64,
) -> anyhow::Result<()> {
    if output.is_noop() {
        return Ok(());
    }

    for (room_id, result) in rooms {
        let writer = output.writer_for_report_key(room_id)?;
        let mut writer = WriterBuilder::new().from_writer(writer);

        writer.write_record(["Interval start", "Interval end", "Duration"])?;
        writer.write_record(["[datetime]", "[datetime]", "[mins]"])?;
        for interval in result.intervals() {
            writer.write_record([
                interval.start.to_string(),
                interval.end.to_string(),
                interval.duration().num_minutes().to_string(),
            ])?;
        }
        writer.flush()?;
    }

    let writer = output.writer_for_report_key(SUMMARY_REPORT_KEY)?;
    let mut writer = WriterBuilder::new().from_writer(writer);
    writer.write_record([
        "Room",
        "Total runtime",
        "Energy consumed",
        "Period start",
        "Period end",
    ])?;
    writer.write_record(["", "[HH:MM]", "[kWh]", "[date]", "[date]"])?;
    for (room_id, result) in rooms {
        let (period_start, period_end) = result.period();
        writer.write_record([
            room_id.clone(),
            format_clock_duration(result.total_runtime()),
            format!("{:.2}", result.energy_kwh(power_rate_kw)),
            period_start.to_string(),
            period_end.to_string(),
        ])?;
    }
    writer.write_record([
        COMBINED_ROOMS_LABEL.to_owned(),
        format_clock_duration(summary.total_runtime),
        format!("{:.2}", summary.energy_kwh),
        summary.period.0.to_string(),
        summary.period.1.to_string(),
    ])?;
    if let Some(average) = summary.average_runtime_per_day {
        writer.write_record([
            "average per day".to_owned(),
            format_clock_duration(average),
            String::new(),
            String::new(),
            String::new(),
        ])?;
    }
    writer.flush()?;

    if let Some(sweep) = sweep {
        let writer = output.writer_for_report_key(SWEEP_REPORT_KEY)?;
        let mut writer = WriterBuilder::new().from_writer(writer);
        writer.write_record(["Sustain", "Total runtime", "Energy consumed"])?;
        writer.write_record(["[mins]", "[HH:MM]", "[kWh]"])?;
        for point in sweep {
            writer.write_record([
                format!("{:.1}", point.sustain.num_seconds() as f64 / 60.),
                format_clock_duration(point.total_runtime),
                format!("{:.2}", point.energy_kwh),
            ])?;
        }
        writer.flush()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{FileOutput, SinkOutput};
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, NaiveDateTime};
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn series_start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 8, 19)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap()
    }

    /// CSV for one room: readings at 1-minute spacing, shifted by `deltas`.
    fn room_csv(initial: f64, deltas: &[f64]) -> String {
        let mut lines = vec!["Timestamp,Temperature_Celsius(°C)".to_owned()];
        let mut temperature = initial;
        lines.push(format!(
            "{},{temperature}",
            series_start().format("%Y-%m-%d %H:%M:%S")
        ));
        for (i, delta) in deltas.iter().enumerate() {
            temperature += delta;
            let timestamp = series_start() + TimeDelta::minutes(i as i64 + 1);
            lines.push(format!(
                "{},{temperature}",
                timestamp.format("%Y-%m-%d %H:%M:%S")
            ));
        }
        lines.join("\n")
    }

    fn cooling_cycle_csv() -> String {
        let mut deltas = vec![-0.3; 10];
        deltas.extend(vec![0.3; 10]);
        room_csv(30.0, &deltas)
    }

    #[fixture]
    fn settings() -> AnalysisSettings {
        AnalysisSettings::default()
    }

    #[rstest]
    fn should_analyse_all_rooms_and_combine_totals(settings: AnalysisSettings) {
        let wohnzimmer = cooling_cycle_csv();
        let schlafzimmer = cooling_cycle_csv();
        let rooms = vec![
            ("Wohnzimmer".to_owned(), wohnzimmer.as_bytes()),
            ("Schlafzimmer".to_owned(), schlafzimmer.as_bytes()),
        ];

        let results = run_analysis(rooms, &settings, SinkOutput, false).unwrap();

        assert_eq!(results.rooms.len(), 2);
        assert!(results.skipped_rooms.is_empty());
        // each room runs 10 minutes (onset 5 minutes into the drop, cessation
        // 5 minutes into the rise)
        assert_eq!(
            results.rooms["Wohnzimmer"].total_runtime(),
            TimeDelta::minutes(10)
        );
        assert_eq!(results.summary.total_runtime, TimeDelta::minutes(20));
        assert_relative_eq!(
            results.summary.energy_kwh,
            20. / 60. * 1.3,
            max_relative = 1e-12
        );
        assert_eq!(results.summary.average_runtime_per_day, None);
        assert!(results.sweep.is_none());
    }

    #[rstest]
    fn should_skip_defective_room_and_keep_the_rest(settings: AnalysisSettings) {
        let good = cooling_cycle_csv();
        let rooms = vec![
            ("Schlafzimmer".to_owned(), "Timestamp,Temperature_Celsius\n2023-08-19 14:00:00,27.5\n".as_bytes()),
            ("Wohnzimmer".to_owned(), good.as_bytes()),
        ];

        let results = run_analysis(rooms, &settings, SinkOutput, false).unwrap();

        assert_eq!(results.rooms.keys().collect::<Vec<_>>(), vec!["Wohnzimmer"]);
        assert_eq!(results.skipped_rooms.len(), 1);
        assert_eq!(results.skipped_rooms[0].room_id, "Schlafzimmer");
        assert!(results.skipped_rooms[0].reason.contains("at least 2"));
    }

    #[rstest]
    fn should_fail_when_no_room_survives(settings: AnalysisSettings) {
        let rooms = vec![("Wohnzimmer".to_owned(), "not,a header\n".as_bytes())];

        assert!(matches!(
            run_analysis(rooms, &settings, SinkOutput, false),
            Err(AnalysisError::InvalidRequest(_))
        ));
    }

    #[rstest]
    fn should_reject_invalid_settings_before_loading_anything() {
        let mut settings = AnalysisSettings::default();
        settings.power_consumption_rate_kw = 0.;
        let rooms: Vec<(String, &[u8])> = vec![];

        assert!(matches!(
            run_analysis(rooms, &settings, SinkOutput, false),
            Err(AnalysisError::InvalidSettings(_))
        ));
    }

    #[rstest]
    fn sweep_covers_range_and_never_grows_with_sustain(mut settings: AnalysisSettings) {
        settings.sweep.start_minutes = 1.0;
        settings.sweep.end_minutes = 8.0;
        settings.sweep.step_minutes = 1.0;
        let csv = cooling_cycle_csv();
        let rooms = vec![("Wohnzimmer".to_owned(), csv.as_bytes())];

        let results = run_analysis(rooms, &settings, SinkOutput, true).unwrap();

        let sweep = results.sweep.unwrap();
        assert_eq!(sweep.len(), 8);
        assert_eq!(sweep[0].sustain, TimeDelta::minutes(1));
        for pair in sweep.windows(2) {
            assert!(pair[0].sustain < pair[1].sustain);
            assert!(
                pair[1].total_runtime <= pair[0].total_runtime,
                "longer sustain must not increase total runtime"
            );
        }
    }

    #[rstest]
    fn should_write_csv_reports_per_room_and_summary(settings: AnalysisSettings) {
        let directory =
            std::env::temp_dir().join(format!("acr-reports-{}", std::process::id()));
        std::fs::create_dir_all(&directory).unwrap();
        let output = FileOutput::new(directory.clone(), "{}_runtime_results.csv".to_owned());
        let csv = cooling_cycle_csv();
        let rooms = vec![("Wohnzimmer".to_owned(), csv.as_bytes())];

        run_analysis(rooms, &settings, output, false).unwrap();

        let summary =
            std::fs::read_to_string(directory.join("summary_runtime_results.csv")).unwrap();
        assert!(summary.starts_with("Room,Total runtime,Energy consumed"));
        assert!(summary.contains("all rooms"));
        let room_report =
            std::fs::read_to_string(directory.join("Wohnzimmer_runtime_results.csv")).unwrap();
        assert!(room_report.contains("[mins]"));

        std::fs::remove_dir_all(&directory).unwrap();
    }
}
