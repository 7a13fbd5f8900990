//! Adapter for converting ingest.raw_record.v1 to typed activity records
//!
//! Malformed records (bad date, negative or missing counts) are dropped and
//! counted per dataset. They never abort a run.

use crate::error::ComputeError;
use crate::schema::raw_record::*;
use crate::types::{ActivitySet, Dataset};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Records dropped during ingestion, per dataset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropReport {
    pub enrolment: usize,
    pub biometric: usize,
    pub demographic: usize,
}

impl DropReport {
    pub fn record(&mut self, dataset: Dataset) {
        match dataset {
            Dataset::Enrolment => self.enrolment += 1,
            Dataset::Biometric => self.biometric += 1,
            Dataset::Demographic => self.demographic += 1,
        }
    }

    pub fn get(&self, dataset: Dataset) -> usize {
        match dataset {
            Dataset::Enrolment => self.enrolment,
            Dataset::Biometric => self.biometric,
            Dataset::Demographic => self.demographic,
        }
    }

    pub fn total(&self) -> usize {
        self.enrolment + self.biometric + self.demographic
    }
}

/// Validated streams plus what was dropped on the way
#[derive(Debug, Clone, Default)]
pub struct Ingested {
    pub activity: ActivitySet,
    pub dropped: DropReport,
}

/// Adapter for converting raw records to activity records
pub struct RawRecordAdapter;

impl RawRecordAdapter {
    /// Parse a JSON string containing an array of RawRecords
    pub fn parse_array(json: &str) -> Result<Vec<RawRecord>, ComputeError> {
        let records: Vec<RawRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON (newline-delimited JSON) containing RawRecords
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<RawRecord>, ComputeError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(ComputeError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }

    /// Convert raw records into the three typed streams, dropping malformed ones
    pub fn to_activity(records: &[RawRecord]) -> Ingested {
        let mut ingested = Ingested::default();

        for record in records {
            match record.to_activity() {
                Ok(activity) => ingested.activity.push(activity),
                Err(_) => ingested.dropped.record(record.dataset),
            }
        }

        if ingested.dropped.total() > 0 {
            warn!(
                enrolment = ingested.dropped.enrolment,
                biometric = ingested.dropped.biometric,
                demographic = ingested.dropped.demographic,
                "dropped malformed records"
            );
        }

        ingested
    }

    /// Validate a batch of records
    pub fn validate_records(records: &[RawRecord]) -> Vec<ValidationResult> {
        records
            .iter()
            .enumerate()
            .filter_map(|(idx, record)| {
                record.validate().err().map(|error| ValidationResult {
                    index: idx,
                    dataset: record.dataset,
                    region: record.region.clone(),
                    error,
                })
            })
            .collect()
    }
}

/// A failed record and why it failed
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub index: usize,
    pub dataset: Dataset,
    pub region: String,
    pub error: ValidationError,
}
