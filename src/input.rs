use crate::core::detector::{
    DetectionConfig, DetectionConfigError, DEFAULT_DROP_RATE_THRESHOLD,
    DEFAULT_RISE_RATE_THRESHOLD, DEFAULT_SUSTAIN_MINUTES,
};
use crate::core::units::minutes_to_duration;
use anyhow::{anyhow, bail};
use chrono::TimeDelta;
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Settings surface for one analysis run, usually populated from a JSON file
/// and/or command-line overrides. Validated once, before any detection.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AnalysisSettings {
    #[serde(default)]
    pub detection: DetectionSettings,
    #[serde(default = "default_power_rate")]
    pub power_consumption_rate_kw: f64,
    #[serde(default)]
    pub sweep: SweepSettings,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DetectionSettings {
    #[serde(default = "default_drop_rate")]
    pub drop_rate_threshold: f64,
    #[serde(default = "default_rise_rate")]
    pub rise_rate_threshold: f64,
    #[serde(default = "default_sustain_minutes")]
    pub sustain_minutes: f64,
}

/// Range of sustain durations explored when a sweep is requested.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SweepSettings {
    #[serde(default = "default_sweep_start")]
    pub start_minutes: f64,
    #[serde(default = "default_sweep_end")]
    pub end_minutes: f64,
    #[serde(default = "default_sweep_step")]
    pub step_minutes: f64,
}

fn default_power_rate() -> f64 {
    1.3
}

fn default_drop_rate() -> f64 {
    DEFAULT_DROP_RATE_THRESHOLD
}

fn default_rise_rate() -> f64 {
    DEFAULT_RISE_RATE_THRESHOLD
}

fn default_sustain_minutes() -> f64 {
    DEFAULT_SUSTAIN_MINUTES as f64
}

fn default_sweep_start() -> f64 {
    0.5
}

fn default_sweep_end() -> f64 {
    5.0
}

fn default_sweep_step() -> f64 {
    0.5
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            drop_rate_threshold: default_drop_rate(),
            rise_rate_threshold: default_rise_rate(),
            sustain_minutes: default_sustain_minutes(),
        }
    }
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            start_minutes: default_sweep_start(),
            end_minutes: default_sweep_end(),
            step_minutes: default_sweep_step(),
        }
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            detection: Default::default(),
            power_consumption_rate_kw: default_power_rate(),
            sweep: Default::default(),
        }
    }
}

impl AnalysisSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.detection_config()?;
        if !(self.power_consumption_rate_kw > 0.) {
            return Err(SettingsError::NonPositivePowerRate(
                self.power_consumption_rate_kw,
            ));
        }
        let SweepSettings {
            start_minutes,
            end_minutes,
            step_minutes,
        } = self.sweep;
        if !(start_minutes > 0.) || !(step_minutes > 0.) || end_minutes < start_minutes {
            return Err(SettingsError::BadSweepRange {
                start_minutes,
                end_minutes,
                step_minutes,
            });
        }

        Ok(())
    }

    pub fn detection_config(&self) -> Result<DetectionConfig, DetectionConfigError> {
        DetectionConfig::new(
            self.detection.drop_rate_threshold,
            self.detection.rise_rate_threshold,
            minutes_to_duration(self.detection.sustain_minutes),
        )
    }

    /// Expand the sweep range into concrete sustain durations, endpoints
    /// included. Steps are resolved on whole seconds so that fractional
    /// minutes do not drift.
    pub fn sweep_values(&self) -> Vec<TimeDelta> {
        let start = minutes_to_duration(self.sweep.start_minutes).num_seconds();
        let end = minutes_to_duration(self.sweep.end_minutes).num_seconds();
        let step = minutes_to_duration(self.sweep.step_minutes).num_seconds().max(1);

        (start..=end)
            .step_by(step as usize)
            .map(TimeDelta::seconds)
            .collect()
    }
}

#[derive(Clone, Copy, Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Detection(#[from] DetectionConfigError),
    #[error("power consumption rate must be positive, got {0} kW")]
    NonPositivePowerRate(f64),
    #[error("sweep range is empty or stepless: {start_minutes}..{end_minutes} minutes in steps of {step_minutes}")]
    BadSweepRange {
        start_minutes: f64,
        end_minutes: f64,
        step_minutes: f64,
    },
}

/// Deserialise settings from JSON and validate them in one go.
pub fn ingest_settings(json: impl Read) -> anyhow::Result<AnalysisSettings> {
    let settings: AnalysisSettings =
        serde_json::from_reader(json).map_err(|error| anyhow!("invalid settings: {error}"))?;
    settings.validate()?;
    Ok(settings)
}

const ROOM_FILE_SUFFIX: &str = "_data.csv";

/// Discover per-room data files in a directory, non-recursively.
///
/// A file named `<Room>_data.csv` contributes room id `<Room>`; hidden files
/// are ignored and rooms come back sorted by id so runs are reproducible.
pub fn discover_room_files(directory: &Path) -> anyhow::Result<IndexMap<String, PathBuf>> {
    let entries = fs::read_dir(directory)
        .map_err(|error| anyhow!("could not read data directory {directory:?}: {error}"))?;

    let mut rooms: Vec<(String, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        if let Some(room_id) = name.strip_suffix(ROOM_FILE_SUFFIX) {
            if !room_id.is_empty() {
                rooms.push((room_id.to_owned(), entry.path()));
            }
        }
    }

    if rooms.is_empty() {
        bail!("no '*{ROOM_FILE_SUFFIX}' files found in {directory:?}");
    }

    rooms.sort_by(|(a, _), (b, _)| a.cmp(b));

    Ok(rooms.into_iter().collect())
}
