//! Engine configuration
//!
//! Score weights, classifier thresholds and the fallback values used when a
//! pillar formula has nothing to divide by. Every value is named and
//! overridable; `EngineConfig::default()` reproduces the reference policy.

use crate::error::ComputeError;
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Composite score weights (must sum to 1.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub idi: f64,
    pub gci: f64,
    pub tcs: f64,
    pub yir: f64,
    pub ubi: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            idi: 0.25,
            gci: 0.25,
            tcs: 0.20,
            yir: 0.20,
            ubi: 0.10,
        }
    }
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.idi + self.gci + self.tcs + self.yir + self.ubi
    }

    fn as_array(&self) -> [(&'static str, f64); 5] {
        [
            ("idi", self.idi),
            ("gci", self.gci),
            ("tcs", self.tcs),
            ("yir", self.yir),
            ("ubi", self.ubi),
        ]
    }
}

/// Constants used when rescaling pillars to 0-100
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringParams {
    /// Added to the IDI range so identical regions do not divide by zero
    pub idi_epsilon: f64,
    /// Ideal biometric share of all updates
    pub ubi_ideal: f64,
    /// YIR at or above this value earns the full score
    pub yir_cap: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            idi_epsilon: 0.001,
            ubi_ideal: 0.425,
            yir_cap: 1.5,
        }
    }
}

/// Thresholds of the archetype rule cascade
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    pub youth_exclusion_yir: f64,
    pub ubi_low: f64,
    pub ubi_high: f64,
    pub geographic_gci: f64,
    pub sleepwalker_tcs: f64,
    pub sleepwalker_health: f64,
    pub leader_health: f64,
    pub leader_tcs: f64,
    pub leader_gci: f64,
    pub leader_yir: f64,
    pub sprinter_idi: f64,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            youth_exclusion_yir: 0.6,
            ubi_low: 0.25,
            ubi_high: 0.65,
            geographic_gci: 0.6,
            sleepwalker_tcs: 0.4,
            sleepwalker_health: 40.0,
            leader_health: 70.0,
            leader_tcs: 0.6,
            leader_gci: 0.4,
            leader_yir: 0.8,
            sprinter_idi: 0.03,
        }
    }
}

/// Fallback values for degenerate pillar inputs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeutralDefaults {
    /// UBI when a region has no updates at all
    pub ubi_no_updates: f64,
    /// YIR when the national youth ratio is zero
    pub yir_undefined_baseline: f64,
    /// TCS with fewer than two time buckets or a zero mean
    pub tcs_insufficient: f64,
    /// GCI with fewer than two sub-regions
    pub gci_single_subregion: f64,
}

impl Default for NeutralDefaults {
    fn default() -> Self {
        Self {
            ubi_no_updates: 0.5,
            yir_undefined_baseline: 1.0,
            tcs_insufficient: 0.5,
            gci_single_subregion: 0.0,
        }
    }
}

/// Calendar granularity of the time-bucket view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBucketing {
    Day,
    /// ISO week starting on Monday
    Week,
    #[default]
    Month,
}

impl TimeBucketing {
    /// First day of the bucket containing `date`
    pub fn bucket_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            TimeBucketing::Day => date,
            TimeBucketing::Week => {
                date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
            TimeBucketing::Month => date.with_day(1).unwrap_or(date),
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub weights: ScoreWeights,
    pub scoring: ScoringParams,
    pub thresholds: ClassifierThresholds,
    pub defaults: NeutralDefaults,
    pub bucketing: TimeBucketing,
    /// Keep only regions whose total enrolment is strictly above this value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_region_enrolment: Option<u64>,
}

impl EngineConfig {
    /// Load configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to pretty JSON
    pub fn to_json(&self) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(self).map_err(|e| ComputeError::EncodingError(e.to_string()))
    }

    /// Check that weights and constants describe a usable policy
    pub fn validate(&self) -> Result<(), ComputeError> {
        for (name, weight) in self.weights.as_array() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ComputeError::InvalidConfig(format!(
                    "weight {} must be a non-negative number, got {}",
                    name, weight
                )));
            }
        }

        let sum = self.weights.sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(ComputeError::InvalidConfig(format!(
                "weights must sum to 1.0, got {}",
                sum
            )));
        }

        let positive = [
            ("idi_epsilon", self.scoring.idi_epsilon),
            ("ubi_ideal", self.scoring.ubi_ideal),
            ("yir_cap", self.scoring.yir_cap),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ComputeError::InvalidConfig(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        let t = &self.thresholds;
        let finite = [
            t.youth_exclusion_yir,
            t.ubi_low,
            t.ubi_high,
            t.geographic_gci,
            t.sleepwalker_tcs,
            t.sleepwalker_health,
            t.leader_health,
            t.leader_tcs,
            t.leader_gci,
            t.leader_yir,
            t.sprinter_idi,
            self.defaults.ubi_no_updates,
            self.defaults.yir_undefined_baseline,
            self.defaults.tcs_insufficient,
            self.defaults.gci_single_subregion,
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(ComputeError::InvalidConfig(
                "thresholds and defaults must be finite".to_string(),
            ));
        }

        if t.ubi_low > t.ubi_high {
            return Err(ComputeError::InvalidConfig(format!(
                "ubi_low ({}) exceeds ubi_high ({})",
                t.ubi_low, t.ubi_high
            )));
        }

        Ok(())
    }
}
