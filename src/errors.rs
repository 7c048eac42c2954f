use crate::core::aggregation::EmptySummaryError;
use crate::core::detector::DetectionConfigError;
use crate::input::SettingsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Request was considered invalid due to error: {0}")]
    InvalidRequest(#[from] anyhow::Error),
    #[error("Analysis settings were rejected: {0}")]
    InvalidSettings(#[from] SettingsError),
    #[error("Detection configuration was rejected: {0}")]
    InvalidDetectionConfig(#[from] DetectionConfigError),
    #[error("Error during aggregation of results: {0}")]
    FailureInAggregation(#[from] EmptySummaryError),
}
