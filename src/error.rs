//! Error types for the ecosystem health engine

use crate::types::Dataset;
use thiserror::Error;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Empty dataset after filtering: {0}")]
    EmptyDataset(Dataset),

    #[error("No region has total enrolment above {0}")]
    NoRegions(u64),

    #[error("Activity counts sum past {}", u64::MAX)]
    CountOverflow,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
