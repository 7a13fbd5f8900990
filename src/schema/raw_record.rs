//! ingest.raw_record.v1 schema definition
//!
//! One record per (dataset, region, sub-region, date) with per-bracket counts
//! keyed by the source column names:
//! - enrolment: `age_0_5`, `age_5_17`, `age_18_greater`
//! - biometric: `bio_age_5_17`, `bio_age_17_`
//! - demographic: `demo_age_5_17`, `demo_age_17_`

use crate::types::{
    ActivityRecord, Dataset, EnrolmentCounts, EnrolmentRecord, UpdateCounts, UpdateRecord,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current schema version
pub const SCHEMA_VERSION: &str = "ingest.raw_record.v1";

/// Accepted date layouts; day-first variants match the source exports
const DATE_FORMATS: [&str; 4] = ["%d-%m-%Y", "%d/%m/%Y", "%Y-%m-%d", "%d.%m.%Y"];

/// Largest accepted bracket count (2^53, the last integer an f64 holds exactly)
pub const MAX_COUNT: u64 = 1 << 53;

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// Parse a calendar date in any accepted layout
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}

/// A record as delivered by the ingestion collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Schema version identifier
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Which stream the record belongs to
    pub dataset: Dataset,
    /// Region (state) name, not yet normalized
    #[serde(alias = "state")]
    pub region: String,
    /// Sub-region (district) name, not yet normalized
    #[serde(alias = "district")]
    pub sub_region: String,
    /// Observation date as written in the source
    pub date: String,
    /// Per-bracket counts
    #[serde(default)]
    pub counts: BTreeMap<String, serde_json::Value>,
}

impl RawRecord {
    fn new(dataset: Dataset, region: &str, sub_region: &str, date: &str) -> Self {
        RawRecord {
            schema_version: SCHEMA_VERSION.to_string(),
            dataset,
            region: region.to_string(),
            sub_region: sub_region.to_string(),
            date: date.to_string(),
            counts: BTreeMap::new(),
        }
    }

    /// Create an enrolment record
    pub fn enrolment(
        region: &str,
        sub_region: &str,
        date: &str,
        age_0_5: i64,
        age_5_17: i64,
        age_18_greater: i64,
    ) -> Self {
        Self::new(Dataset::Enrolment, region, sub_region, date)
            .with_count("age_0_5", age_0_5)
            .with_count("age_5_17", age_5_17)
            .with_count("age_18_greater", age_18_greater)
    }

    /// Create a biometric update record
    pub fn biometric(region: &str, sub_region: &str, date: &str, age_5_17: i64, age_17_plus: i64) -> Self {
        Self::new(Dataset::Biometric, region, sub_region, date)
            .with_count("bio_age_5_17", age_5_17)
            .with_count("bio_age_17_", age_17_plus)
    }

    /// Create a demographic update record
    pub fn demographic(region: &str, sub_region: &str, date: &str, age_5_17: i64, age_17_plus: i64) -> Self {
        Self::new(Dataset::Demographic, region, sub_region, date)
            .with_count("demo_age_5_17", age_5_17)
            .with_count("demo_age_17_", age_17_plus)
    }

    /// Set one bracket count
    pub fn with_count(mut self, bracket: &str, value: i64) -> Self {
        self.counts.insert(bracket.to_string(), serde_json::Value::from(value));
        self
    }

    /// Validate the record schema
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.to_activity().map(|_| ())
    }

    /// Validate and convert into a typed activity record
    pub fn to_activity(&self) -> Result<ActivityRecord, ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::InvalidSchemaVersion {
                expected: SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }

        if self.region.trim().is_empty() {
            return Err(ValidationError::EmptyIdentifier { field: "region" });
        }
        if self.sub_region.trim().is_empty() {
            return Err(ValidationError::EmptyIdentifier { field: "sub_region" });
        }

        let date = parse_date(&self.date).ok_or_else(|| ValidationError::InvalidDate {
            value: self.date.clone(),
        })?;

        let record = match self.dataset {
            Dataset::Enrolment => ActivityRecord::Enrolment(EnrolmentRecord {
                region: self.region.clone(),
                sub_region: self.sub_region.clone(),
                date,
                counts: EnrolmentCounts {
                    age_0_5: self.count("age_0_5")?,
                    age_5_17: self.count("age_5_17")?,
                    age_18_plus: self.count("age_18_greater")?,
                },
            }),
            Dataset::Biometric => ActivityRecord::Biometric(UpdateRecord {
                region: self.region.clone(),
                sub_region: self.sub_region.clone(),
                date,
                counts: UpdateCounts {
                    age_5_17: self.count("bio_age_5_17")?,
                    age_17_plus: self.count("bio_age_17_")?,
                },
            }),
            Dataset::Demographic => ActivityRecord::Demographic(UpdateRecord {
                region: self.region.clone(),
                sub_region: self.sub_region.clone(),
                date,
                counts: UpdateCounts {
                    age_5_17: self.count("demo_age_5_17")?,
                    age_17_plus: self.count("demo_age_17_")?,
                },
            }),
        };

        Ok(record)
    }

    /// Read one bracket as a non-negative integer.
    ///
    /// Whole-valued floats (`12.0`) are accepted since spreadsheet exports
    /// often write counts that way. Counts above [`MAX_COUNT`] are invalid.
    fn count(&self, bracket: &'static str) -> Result<u64, ValidationError> {
        let value = match self.counts.get(bracket) {
            None | Some(serde_json::Value::Null) => {
                return Err(ValidationError::MissingCount { bracket })
            }
            Some(value) => value,
        };

        if let Some(n) = value.as_u64().filter(|&n| n <= MAX_COUNT) {
            return Ok(n);
        }
        if let Some(n) = value.as_i64().filter(|&n| n < 0) {
            return Err(ValidationError::NegativeCount { bracket, value: n as f64 });
        }
        match value.as_f64() {
            Some(f) if f < 0.0 => Err(ValidationError::NegativeCount { bracket, value: f }),
            Some(f) if f.fract() == 0.0 && f <= MAX_COUNT as f64 => Ok(f as u64),
            _ => Err(ValidationError::InvalidCount {
                bracket,
                value: value.to_string(),
            }),
        }
    }
}

/// Validation errors for raw records (MalformedRecord cases)
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Empty {field}")]
    EmptyIdentifier { field: &'static str },

    #[error("Unparseable date: {value:?}")]
    InvalidDate { value: String },

    #[error("Missing count for {bracket}")]
    MissingCount { bracket: &'static str },

    #[error("Negative count for {bracket}: {value}")]
    NegativeCount { bracket: &'static str, value: f64 },

    #[error("Count for {bracket} is not a whole number: {value}")]
    InvalidCount { bracket: &'static str, value: String },
}
