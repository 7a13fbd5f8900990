//! Risk mapping
//!
//! Translates raw age-segmented counts and pillar metrics into five service
//! risk percentages. Every risk is clamped to [0, 100]; duplicated update
//! entries across periods can push the raw formulas out of range.

use crate::types::{PillarMetrics, RegionAggregate, RiskSet};

/// Risk mapper (stateless)
pub struct RiskMapper;

impl RiskMapper {
    /// Derive the full risk set for one region
    pub fn map(region: &RegionAggregate, metrics: &PillarMetrics, health_score: f64) -> RiskSet {
        let pds = pds_risk(region);
        let dbt = dbt_risk(region);
        let scholarship = scholarship_risk(metrics);
        let otp = otp_risk(region);
        let banking = banking_risk(health_score);

        RiskSet {
            pds,
            dbt,
            scholarship,
            otp,
            banking,
            composite: (pds + dbt + scholarship + otp + banking) / 5.0,
        }
    }
}

/// Adults enrolled but not refreshing biometrics (ration distribution)
fn pds_risk(region: &RegionAggregate) -> f64 {
    shortfall(region.biometric.age_17_plus, region.enrolment.age_18_plus)
}

/// Adults enrolled but not refreshing demographics (benefit transfer)
fn dbt_risk(region: &RegionAggregate) -> f64 {
    shortfall(region.demographic.age_17_plus, region.enrolment.age_18_plus)
}

fn scholarship_risk(metrics: &PillarMetrics) -> f64 {
    clamp_percent(100.0 * (1.0 - metrics.yir))
}

/// Children enrolled without a matching demographic update
fn otp_risk(region: &RegionAggregate) -> f64 {
    shortfall(region.demographic.age_5_17, region.enrolment.age_5_17)
}

fn banking_risk(health_score: f64) -> f64 {
    clamp_percent(100.0 - health_score)
}

/// `100 * (1 - done / expected)`, 0 when nothing is expected
fn shortfall(done: u64, expected: u64) -> f64 {
    if expected == 0 {
        return 0.0;
    }
    clamp_percent(100.0 * (1.0 - done as f64 / expected as f64))
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}
