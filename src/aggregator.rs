//! Multi-level aggregation
//!
//! Collapses the three record streams into three views:
//! - per region (every age bracket, every category)
//! - per region and sub-region (update totals, for concentration)
//! - per region and time bucket (update totals, for stability)
//!
//! Region keys are the union over all streams; a region missing from a stream
//! is kept with zero-filled counts for that stream.

use crate::config::TimeBucketing;
use crate::error::ComputeError;
use crate::types::{
    ActivitySet, Dataset, EnrolmentRecord, RegionAggregate, SubRegionAggregate,
    TimeBucketAggregate, UpdateRecord,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Canonical form of a region or sub-region name.
///
/// Trims, collapses inner whitespace and title-cases each word so that
/// `"  west   BENGAL"` and `"West Bengal"` group together.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// The three aggregation views
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateTables {
    /// One row per region, sorted by name
    pub regions: Vec<RegionAggregate>,
    /// One row per (region, sub-region), sorted
    pub sub_regions: Vec<SubRegionAggregate>,
    /// One row per (region, bucket), sorted
    pub time_buckets: Vec<TimeBucketAggregate>,
    /// Datasets that contributed at least one record to each region
    pub datasets: BTreeMap<String, BTreeSet<Dataset>>,
}

impl AggregateTables {
    pub fn region(&self, name: &str) -> Option<&RegionAggregate> {
        self.regions.iter().find(|r| r.region == name)
    }

    /// Sub-region update totals grouped by region
    pub fn sub_region_updates(&self) -> BTreeMap<&str, Vec<f64>> {
        let mut grouped: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for row in &self.sub_regions {
            grouped
                .entry(row.region.as_str())
                .or_default()
                .push(row.total_updates as f64);
        }
        grouped
    }

    /// Time-bucket update totals grouped by region
    pub fn time_bucket_updates(&self) -> BTreeMap<&str, Vec<f64>> {
        let mut grouped: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for row in &self.time_buckets {
            grouped
                .entry(row.region.as_str())
                .or_default()
                .push(row.total_updates as f64);
        }
        grouped
    }

    /// Drop regions (and their sub-region and bucket rows) failing `keep`
    pub fn retain_regions<F>(&mut self, keep: F)
    where
        F: Fn(&RegionAggregate) -> bool,
    {
        self.regions.retain(|r| keep(r));
        let kept: BTreeSet<&str> = self.regions.iter().map(|r| r.region.as_str()).collect();
        self.sub_regions.retain(|s| kept.contains(s.region.as_str()));
        self.time_buckets.retain(|t| kept.contains(t.region.as_str()));
        self.datasets.retain(|region, _| kept.contains(region.as_str()));
    }

    /// Whether any retained region received a record from `dataset`
    pub fn has_records(&self, dataset: Dataset) -> bool {
        self.datasets.values().any(|sources| sources.contains(&dataset))
    }
}

/// Builds the aggregation views from validated records
pub struct Aggregator {
    bucketing: TimeBucketing,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(TimeBucketing::default())
    }
}

impl Aggregator {
    pub fn new(bucketing: TimeBucketing) -> Self {
        Self { bucketing }
    }

    /// Aggregate all three streams of an activity set
    pub fn aggregate(&self, activity: &ActivitySet) -> Result<AggregateTables, ComputeError> {
        self.aggregate_streams(&activity.enrolment, &activity.biometric, &activity.demographic)
    }

    /// Aggregate the three streams passed separately.
    ///
    /// Records whose region or sub-region name is blank after normalization
    /// are skipped. Fails with `CountOverflow` when the grand total of all
    /// counts does not fit in a `u64`; every per-region and national sum is
    /// bounded by that total.
    pub fn aggregate_streams(
        &self,
        enrolment: &[EnrolmentRecord],
        biometric: &[UpdateRecord],
        demographic: &[UpdateRecord],
    ) -> Result<AggregateTables, ComputeError> {
        if grand_total(enrolment, biometric, demographic).is_none() {
            return Err(ComputeError::CountOverflow);
        }

        // Union of region keys across every stream, zero-filled
        let mut regions: BTreeMap<String, RegionAggregate> = BTreeMap::new();
        let mut datasets: BTreeMap<String, BTreeSet<Dataset>> = BTreeMap::new();
        let mut sub_regions: BTreeMap<(String, String), u64> = BTreeMap::new();
        let mut time_buckets: BTreeMap<(String, NaiveDate), u64> = BTreeMap::new();
        let mut skipped = 0usize;

        for record in enrolment {
            let (region, _) = match keys(&record.region, &record.sub_region) {
                Some(keys) => keys,
                None => {
                    skipped += 1;
                    continue;
                }
            };
            let agg = regions
                .entry(region.clone())
                .or_insert_with(|| RegionAggregate::new(region.clone()));
            agg.enrolment.age_0_5 += record.counts.age_0_5;
            agg.enrolment.age_5_17 += record.counts.age_5_17;
            agg.enrolment.age_18_plus += record.counts.age_18_plus;
            datasets.entry(region).or_default().insert(Dataset::Enrolment);
        }

        let updates = [(Dataset::Biometric, biometric), (Dataset::Demographic, demographic)];
        for (dataset, stream) in updates {
            for record in stream {
                let (region, sub_region) = match keys(&record.region, &record.sub_region) {
                    Some(keys) => keys,
                    None => {
                        skipped += 1;
                        continue;
                    }
                };
                let agg = regions
                    .entry(region.clone())
                    .or_insert_with(|| RegionAggregate::new(region.clone()));
                let counts = match dataset {
                    Dataset::Biometric => &mut agg.biometric,
                    _ => &mut agg.demographic,
                };
                counts.age_5_17 += record.counts.age_5_17;
                counts.age_17_plus += record.counts.age_17_plus;

                let total = record.counts.total();
                let bucket = self.bucketing.bucket_start(record.date);
                *sub_regions
                    .entry((region.clone(), sub_region))
                    .or_insert(0) += total;
                *time_buckets.entry((region.clone(), bucket)).or_insert(0) += total;
                datasets.entry(region).or_default().insert(dataset);
            }
        }

        if skipped > 0 {
            warn!(skipped, "skipped records with a blank region or sub-region");
        }

        let tables = AggregateTables {
            regions: regions.into_values().collect(),
            sub_regions: sub_regions
                .into_iter()
                .map(|((region, sub_region), total_updates)| SubRegionAggregate {
                    region,
                    sub_region,
                    total_updates,
                })
                .collect(),
            time_buckets: time_buckets
                .into_iter()
                .map(|((region, bucket_start), total_updates)| TimeBucketAggregate {
                    region,
                    bucket_start,
                    total_updates,
                })
                .collect(),
            datasets,
        };

        debug!(
            regions = tables.regions.len(),
            sub_regions = tables.sub_regions.len(),
            time_buckets = tables.time_buckets.len(),
            "aggregation complete"
        );

        Ok(tables)
    }
}

/// Normalized (region, sub-region) pair; `None` when either is blank
fn keys(region: &str, sub_region: &str) -> Option<(String, String)> {
    let region = normalize_name(region);
    let sub_region = normalize_name(sub_region);
    if region.is_empty() || sub_region.is_empty() {
        None
    } else {
        Some((region, sub_region))
    }
}

/// Sum of every bracket count in every stream, `None` on overflow
fn grand_total(
    enrolment: &[EnrolmentRecord],
    biometric: &[UpdateRecord],
    demographic: &[UpdateRecord],
) -> Option<u64> {
    let enrol = enrolment
        .iter()
        .flat_map(|r| [r.counts.age_0_5, r.counts.age_5_17, r.counts.age_18_plus]);
    let updates = biometric
        .iter()
        .chain(demographic)
        .flat_map(|r| [r.counts.age_5_17, r.counts.age_17_plus]);
    enrol
        .chain(updates)
        .try_fold(0u64, |acc, n| acc.checked_add(n))
}
