use chrono::{NaiveDateTime, TimeDelta};
use itertools::Itertools;
use thiserror::Error;

/// This module infers when an air-conditioning unit was running from the rate
/// of change of room temperature.

/// One timestamped temperature reading. Series are ordered ascending by
/// timestamp before they reach the detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub temperature: f64,
}

/// Hysteresis band for the rate detector.
///
/// A state transition is only confirmed once the rate condition has held for
/// `sustain_duration` of cumulative elapsed time with no contrary reading in
/// between. Readings between the two rate thresholds fall in a dead band
/// where accumulated evidence is kept but not extended.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionConfig {
    drop_rate_threshold: f64,
    rise_rate_threshold: f64,
    sustain_duration: TimeDelta,
}

pub const DEFAULT_DROP_RATE_THRESHOLD: f64 = -0.1;
pub const DEFAULT_RISE_RATE_THRESHOLD: f64 = 0.1;
pub const DEFAULT_SUSTAIN_MINUTES: i64 = 5;

impl DetectionConfig {
    /// Construct a detection config, rejecting bands that could not have come
    /// from a correctly wired caller.
    ///
    /// Arguments:
    /// * `drop_rate_threshold` - temperature change per sampling interval below which the room counts as being cooled, in degrees (negative)
    /// * `rise_rate_threshold` - temperature change per sampling interval above which the room counts as warming back up, in degrees (positive)
    /// * `sustain_duration` - cumulative time a rate condition must hold before a transition is confirmed
    pub fn new(
        drop_rate_threshold: f64,
        rise_rate_threshold: f64,
        sustain_duration: TimeDelta,
    ) -> Result<Self, DetectionConfigError> {
        if !(drop_rate_threshold < 0.) {
            return Err(DetectionConfigError::DropRateNotNegative(
                drop_rate_threshold,
            ));
        }
        if !(rise_rate_threshold > 0.) {
            return Err(DetectionConfigError::RiseRateNotPositive(
                rise_rate_threshold,
            ));
        }
        if sustain_duration <= TimeDelta::zero() {
            return Err(DetectionConfigError::SustainNotPositive(sustain_duration));
        }

        Ok(Self {
            drop_rate_threshold,
            rise_rate_threshold,
            sustain_duration,
        })
    }

    pub fn drop_rate_threshold(&self) -> f64 {
        self.drop_rate_threshold
    }

    pub fn rise_rate_threshold(&self) -> f64 {
        self.rise_rate_threshold
    }

    pub fn sustain_duration(&self) -> TimeDelta {
        self.sustain_duration
    }

    /// The same band with a different sustain duration, e.g. for sweeping
    /// sustain values over an otherwise fixed config.
    pub fn with_sustain_duration(
        &self,
        sustain_duration: TimeDelta,
    ) -> Result<Self, DetectionConfigError> {
        Self::new(
            self.drop_rate_threshold,
            self.rise_rate_threshold,
            sustain_duration,
        )
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            drop_rate_threshold: DEFAULT_DROP_RATE_THRESHOLD,
            rise_rate_threshold: DEFAULT_RISE_RATE_THRESHOLD,
            sustain_duration: TimeDelta::minutes(DEFAULT_SUSTAIN_MINUTES),
        }
    }
}

#[derive(Clone, Copy, Debug, Error)]
pub enum DetectionConfigError {
    #[error("drop rate threshold must be negative, got {0}")]
    DropRateNotNegative(f64),
    #[error("rise rate threshold must be positive, got {0}")]
    RiseRateNotPositive(f64),
    #[error("sustain duration must be positive, got {0}")]
    SustainNotPositive(TimeDelta),
}

/// One continuous inferred "AC on" period. Intervals produced for a room are
/// disjoint and ordered ascending by start time, with `end > start`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl RuntimeInterval {
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }
}

/// Transient state for one detection run over one room's series.
struct DetectorState {
    running: bool,
    pending_start: Option<NaiveDateTime>,
    drop_accum: TimeDelta,
    rise_accum: TimeDelta,
}

impl DetectorState {
    fn new() -> Self {
        Self {
            running: false,
            pending_start: None,
            drop_accum: TimeDelta::zero(),
            rise_accum: TimeDelta::zero(),
        }
    }
}

/// Hysteresis rate detector for AC runtime.
///
/// A single sharp reading is treated as noise: the onset (sustained drop) and
/// cessation (sustained rise) conditions must each accumulate
/// `sustain_duration` of elapsed time before the state flips. A reading of
/// the opposite sign clears the opposing accumulator, since drop and rise are
/// contradictory evidence.
#[derive(Clone, Copy, Debug)]
pub struct RuntimeDetector {
    config: DetectionConfig,
}

impl RuntimeDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Infer runtime intervals from an ordered temperature series.
    ///
    /// The rate is evaluated per consecutive sample pair using the actual
    /// elapsed wall time between the two readings, so irregular sampling
    /// gaps are handled without assuming a fixed step. A series still
    /// running at the end of data is closed at the final sample. Fewer than
    /// 2 samples give no rate to evaluate and an empty result.
    pub fn detect(&self, samples: &[Sample]) -> Vec<RuntimeInterval> {
        let mut state = DetectorState::new();
        let mut intervals: Vec<RuntimeInterval> = Vec::new();

        for (previous, current) in samples.iter().tuple_windows() {
            let delta_temp = current.temperature - previous.temperature;
            let elapsed = current.timestamp - previous.timestamp;

            if delta_temp < self.config.drop_rate_threshold {
                state.drop_accum = state.drop_accum + elapsed;
                state.rise_accum = TimeDelta::zero();

                // drop_accum is deliberately not cleared on transition; while
                // running it accumulates with no further effect
                if state.drop_accum >= self.config.sustain_duration && !state.running {
                    state.running = true;
                    state.pending_start = Some(current.timestamp);
                }
            } else if delta_temp > self.config.rise_rate_threshold {
                state.rise_accum = state.rise_accum + elapsed;
                state.drop_accum = TimeDelta::zero();

                if state.rise_accum >= self.config.sustain_duration && state.running {
                    if let Some(start) = state.pending_start.take() {
                        intervals.push(RuntimeInterval {
                            start,
                            end: current.timestamp,
                        });
                    }
                    state.running = false;
                }
            }
            // readings inside the dead band leave accumulators and state untouched
        }

        // a run still open at the end of data closes at the last sample
        if state.running {
            if let (Some(start), Some(last)) = (state.pending_start, samples.last()) {
                if last.timestamp > start {
                    intervals.push(RuntimeInterval {
                        start,
                        end: last.timestamp,
                    });
                }
            }
        }

        intervals
    }
}
