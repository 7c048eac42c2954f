use chrono::TimeDelta;

pub const SECONDS_PER_MINUTE: u32 = 60;
pub const SECONDS_PER_HOUR: u32 = 3_600;
pub const MINUTES_PER_HOUR: u32 = 60;
pub const HOURS_PER_DAY: u32 = 24;

pub fn duration_in_hours(duration: TimeDelta) -> f64 {
    duration.num_seconds() as f64 / SECONDS_PER_HOUR as f64
}

/// Convert a (possibly fractional) number of minutes into a duration, rounded
/// to whole seconds.
pub fn minutes_to_duration(minutes: f64) -> TimeDelta {
    TimeDelta::seconds((minutes * SECONDS_PER_MINUTE as f64).round() as i64)
}

/// Render a duration as zero-padded "HH:MM". Durations of a day or more keep
/// counting hours rather than rolling over.
pub fn format_clock_duration(duration: TimeDelta) -> String {
    let total_minutes = duration.num_minutes();
    let hours = total_minutes / MINUTES_PER_HOUR as i64;
    let minutes = total_minutes % MINUTES_PER_HOUR as i64;
    format!("{hours:02}:{minutes:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    fn should_convert_duration_to_hours() {
        assert_relative_eq!(duration_in_hours(TimeDelta::minutes(90)), 1.5);
        assert_relative_eq!(duration_in_hours(TimeDelta::zero()), 0.);
    }

    #[rstest]
    #[case(5.0, 300)]
    #[case(0.5, 30)]
    #[case(1.25, 75)]
    fn should_convert_minutes_to_duration(#[case] minutes: f64, #[case] expected_seconds: i64) {
        assert_eq!(minutes_to_duration(minutes).num_seconds(), expected_seconds);
    }

    #[rstest]
    #[case(TimeDelta::zero(), "00:00")]
    #[case(TimeDelta::minutes(65), "01:05")]
    #[case(TimeDelta::minutes(1570), "26:10")]
    fn should_format_clock_durations(#[case] duration: TimeDelta, #[case] expected: &str) {
        assert_eq!(format_clock_duration(duration), expected);
    }
}
