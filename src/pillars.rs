//! Pillar metric calculation
//!
//! This module derives the five independent pillar metrics for each region:
//! - Infrastructure Deficit Index (IDI)
//! - Update Balance Index (UBI)
//! - Youth Inclusion Ratio (YIR)
//! - Geographic Concentration Index (GCI)
//! - Temporal Consistency Score (TCS)
//!
//! Each metric reads only the region's own aggregates and the national totals,
//! so regions can be computed independently.

use crate::aggregator::AggregateTables;
use crate::config::NeutralDefaults;
use crate::gini::gini;
use crate::types::{NationalTotals, PillarMetrics, RegionAggregate, RegionPillars};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Pillar calculator bound to one set of national totals
pub struct PillarCalculator<'a> {
    national: NationalTotals,
    national_youth_ratio: f64,
    defaults: &'a NeutralDefaults,
}

impl<'a> PillarCalculator<'a> {
    pub fn new(national: NationalTotals, defaults: &'a NeutralDefaults) -> Self {
        Self {
            national,
            national_youth_ratio: share(national.youth_updates, national.adult_updates),
            defaults,
        }
    }

    pub fn national(&self) -> &NationalTotals {
        &self.national
    }

    /// National youth-to-adult update ratio used as the YIR baseline.
    ///
    /// Unlike the regional ratio there is no unit divisor: with no adult
    /// updates nationally the ratio is 0 and YIR falls back to its baseline.
    pub fn national_youth_ratio(&self) -> f64 {
        self.national_youth_ratio
    }

    /// Compute pillars for every region in the tables
    pub fn compute_all(&self, tables: &AggregateTables) -> Vec<RegionPillars> {
        let sub_regions = tables.sub_region_updates();
        let time_buckets = tables.time_bucket_updates();
        let empty: Vec<f64> = Vec::new();

        let compute_one = |region: &RegionAggregate| {
            let name = region.region.as_str();
            self.compute(
                region,
                sub_regions.get(name).unwrap_or(&empty),
                time_buckets.get(name).unwrap_or(&empty),
            )
        };

        #[cfg(feature = "parallel")]
        let pillars = tables.regions.par_iter().map(compute_one).collect();

        #[cfg(not(feature = "parallel"))]
        let pillars = tables.regions.iter().map(compute_one).collect();

        pillars
    }

    /// Compute pillars for a single region
    pub fn compute(
        &self,
        region: &RegionAggregate,
        sub_region_updates: &[f64],
        time_bucket_updates: &[f64],
    ) -> RegionPillars {
        let enrol_share = share(region.total_enrolment(), self.national.enrolment);
        let update_share = share(region.total_updates(), self.national.updates());

        let metrics = PillarMetrics {
            idi: enrol_share - update_share,
            ubi: self.compute_ubi(region),
            yir: self.compute_yir(region),
            gci: self.compute_gci(sub_region_updates),
            tcs: self.compute_tcs(time_bucket_updates),
        };

        RegionPillars {
            aggregate: region.clone(),
            enrol_share,
            update_share,
            metrics,
        }
    }

    /// Biometric share of all updates; neutral when there are none
    fn compute_ubi(&self, region: &RegionAggregate) -> f64 {
        let total = region.total_updates();
        if total == 0 {
            return self.defaults.ubi_no_updates;
        }
        (region.total_biometric() as f64 / total as f64).clamp(0.0, 1.0)
    }

    /// Region youth ratio relative to the national youth ratio
    fn compute_yir(&self, region: &RegionAggregate) -> f64 {
        if self.national_youth_ratio == 0.0 || !self.national_youth_ratio.is_finite() {
            return self.defaults.yir_undefined_baseline;
        }
        youth_ratio(region.youth_updates(), region.adult_updates()) / self.national_youth_ratio
    }

    fn compute_gci(&self, sub_region_updates: &[f64]) -> f64 {
        if sub_region_updates.len() < 2 {
            return self.defaults.gci_single_subregion;
        }
        gini(sub_region_updates)
    }

    /// 1 - coefficient of variation (population std / mean), floored at 0
    fn compute_tcs(&self, time_bucket_updates: &[f64]) -> f64 {
        if time_bucket_updates.len() < 2 {
            return self.defaults.tcs_insufficient;
        }

        let n = time_bucket_updates.len() as f64;
        let mean = time_bucket_updates.iter().sum::<f64>() / n;
        if mean <= 0.0 {
            return self.defaults.tcs_insufficient;
        }

        let variance = time_bucket_updates
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / n;
        let cv = variance.sqrt() / mean;

        (1.0 - cv).clamp(0.0, 1.0)
    }
}

/// `part / whole`; 0 when `whole` is 0
fn share(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Youth-to-adult ratio with a zero adult count replaced by 1
fn youth_ratio(youth: u64, adult: u64) -> f64 {
    let divisor = if adult == 0 { 1 } else { adult };
    youth as f64 / divisor as f64
}
