//! Core types for the ecosystem health pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: activity records, aggregates, pillar metrics, scores, archetypes,
//! risks and the final per-region output row.

use crate::schema::DropReport;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Record stream identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dataset {
    Enrolment,
    Biometric,
    Demographic,
}

impl Dataset {
    pub const ALL: [Dataset; 3] = [Dataset::Enrolment, Dataset::Biometric, Dataset::Demographic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::Enrolment => "enrolment",
            Dataset::Biometric => "biometric",
            Dataset::Demographic => "demographic",
        }
    }

    /// Age-bracket count keys expected on raw records of this dataset
    pub fn brackets(&self) -> &'static [&'static str] {
        match self {
            Dataset::Enrolment => &["age_0_5", "age_5_17", "age_18_greater"],
            Dataset::Biometric => &["bio_age_5_17", "bio_age_17_"],
            Dataset::Demographic => &["demo_age_5_17", "demo_age_17_"],
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enrolment counts per age bracket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrolmentCounts {
    pub age_0_5: u64,
    pub age_5_17: u64,
    pub age_18_plus: u64,
}

impl EnrolmentCounts {
    pub fn total(&self) -> u64 {
        self.age_0_5
            .saturating_add(self.age_5_17)
            .saturating_add(self.age_18_plus)
    }
}

/// Update counts per age bracket (shared by biometric and demographic updates)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCounts {
    pub age_5_17: u64,
    pub age_17_plus: u64,
}

impl UpdateCounts {
    pub fn total(&self) -> u64 {
        self.age_5_17.saturating_add(self.age_17_plus)
    }
}

/// One validated enrolment observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrolmentRecord {
    pub region: String,
    pub sub_region: String,
    pub date: NaiveDate,
    pub counts: EnrolmentCounts,
}

/// One validated biometric or demographic update observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub region: String,
    pub sub_region: String,
    pub date: NaiveDate,
    pub counts: UpdateCounts,
}

/// One validated record from any of the three streams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dataset", rename_all = "lowercase")]
pub enum ActivityRecord {
    Enrolment(EnrolmentRecord),
    Biometric(UpdateRecord),
    Demographic(UpdateRecord),
}

impl ActivityRecord {
    pub fn dataset(&self) -> Dataset {
        match self {
            ActivityRecord::Enrolment(_) => Dataset::Enrolment,
            ActivityRecord::Biometric(_) => Dataset::Biometric,
            ActivityRecord::Demographic(_) => Dataset::Demographic,
        }
    }
}

/// The three validated record streams fed into the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivitySet {
    pub enrolment: Vec<EnrolmentRecord>,
    pub biometric: Vec<UpdateRecord>,
    pub demographic: Vec<UpdateRecord>,
}

impl ActivitySet {
    /// Route a record to its stream
    pub fn push(&mut self, record: ActivityRecord) {
        match record {
            ActivityRecord::Enrolment(r) => self.enrolment.push(r),
            ActivityRecord::Biometric(r) => self.biometric.push(r),
            ActivityRecord::Demographic(r) => self.demographic.push(r),
        }
    }

    /// Number of records in a given stream
    pub fn len_of(&self, dataset: Dataset) -> usize {
        match dataset {
            Dataset::Enrolment => self.enrolment.len(),
            Dataset::Biometric => self.biometric.len(),
            Dataset::Demographic => self.demographic.len(),
        }
    }
}

/// Summed counts for one region across all sub-regions and dates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionAggregate {
    /// Canonical region name
    pub region: String,
    pub enrolment: EnrolmentCounts,
    pub biometric: UpdateCounts,
    pub demographic: UpdateCounts,
}

impl RegionAggregate {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Default::default()
        }
    }

    pub fn total_enrolment(&self) -> u64 {
        self.enrolment.total()
    }

    pub fn total_biometric(&self) -> u64 {
        self.biometric.total()
    }

    pub fn total_demographic(&self) -> u64 {
        self.demographic.total()
    }

    /// Biometric plus demographic updates
    pub fn total_updates(&self) -> u64 {
        self.total_biometric().saturating_add(self.total_demographic())
    }

    /// Updates recorded for the 5-17 bracket in either category
    pub fn youth_updates(&self) -> u64 {
        self.biometric.age_5_17.saturating_add(self.demographic.age_5_17)
    }

    /// Updates recorded for the 17+ bracket in either category
    pub fn adult_updates(&self) -> u64 {
        self.biometric.age_17_plus.saturating_add(self.demographic.age_17_plus)
    }
}

/// Update total for one (region, sub-region) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubRegionAggregate {
    pub region: String,
    pub sub_region: String,
    pub total_updates: u64,
}

/// Update total for one (region, time bucket) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBucketAggregate {
    pub region: String,
    /// First calendar day of the bucket
    pub bucket_start: NaiveDate,
    pub total_updates: u64,
}

/// National sums over the retained regions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NationalTotals {
    pub enrolment: u64,
    pub biometric: u64,
    pub demographic: u64,
    pub youth_updates: u64,
    pub adult_updates: u64,
}

impl NationalTotals {
    pub fn from_regions<'a>(regions: impl IntoIterator<Item = &'a RegionAggregate>) -> Self {
        regions
            .into_iter()
            .fold(NationalTotals::default(), |mut acc, r| {
                acc.enrolment = acc.enrolment.saturating_add(r.total_enrolment());
                acc.biometric = acc.biometric.saturating_add(r.total_biometric());
                acc.demographic = acc.demographic.saturating_add(r.total_demographic());
                acc.youth_updates = acc.youth_updates.saturating_add(r.youth_updates());
                acc.adult_updates = acc.adult_updates.saturating_add(r.adult_updates());
                acc
            })
    }

    pub fn updates(&self) -> u64 {
        self.biometric.saturating_add(self.demographic)
    }
}

/// The five independent pillar metrics for one region
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PillarMetrics {
    /// Infrastructure Deficit Index (enrolment share minus update share)
    pub idi: f64,
    /// Update Balance Index (biometric / total updates)
    pub ubi: f64,
    /// Youth Inclusion Ratio (region youth ratio / national youth ratio)
    pub yir: f64,
    /// Geographic Concentration Index (Gini over sub-region updates)
    pub gci: f64,
    /// Temporal Consistency Score (1 - CV over time buckets)
    pub tcs: f64,
}

/// Pillar metrics with the aggregate they were derived from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionPillars {
    pub aggregate: RegionAggregate,
    /// Region enrolment / national enrolment
    pub enrol_share: f64,
    /// Region updates / national updates
    pub update_share: f64,
    pub metrics: PillarMetrics,
}

/// Pillar metrics rescaled to 0-100
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PillarScores {
    pub idi: f64,
    pub ubi: f64,
    pub yir: f64,
    pub gci: f64,
    pub tcs: f64,
}

/// Region classification label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Archetype {
    #[serde(rename = "Digital Leader")]
    DigitalLeader,
    #[serde(rename = "Sprinter")]
    Sprinter,
    #[serde(rename = "Sleepwalker")]
    Sleepwalker,
    #[serde(rename = "Moderate")]
    Moderate,
    #[serde(rename = "Excluded (Youth)")]
    ExcludedYouth,
    #[serde(rename = "Excluded (Update Imbalance)")]
    ExcludedUpdateImbalance,
    #[serde(rename = "Excluded (Geographic)")]
    ExcludedGeographic,
}

impl Archetype {
    pub const ALL: [Archetype; 7] = [
        Archetype::DigitalLeader,
        Archetype::Sprinter,
        Archetype::Sleepwalker,
        Archetype::Moderate,
        Archetype::ExcludedYouth,
        Archetype::ExcludedUpdateImbalance,
        Archetype::ExcludedGeographic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::DigitalLeader => "Digital Leader",
            Archetype::Sprinter => "Sprinter",
            Archetype::Sleepwalker => "Sleepwalker",
            Archetype::Moderate => "Moderate",
            Archetype::ExcludedYouth => "Excluded (Youth)",
            Archetype::ExcludedUpdateImbalance => "Excluded (Update Imbalance)",
            Archetype::ExcludedGeographic => "Excluded (Geographic)",
        }
    }

    pub fn is_excluded(&self) -> bool {
        matches!(
            self,
            Archetype::ExcludedYouth
                | Archetype::ExcludedUpdateImbalance
                | Archetype::ExcludedGeographic
        )
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Real-world risk percentages (0-100)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskSet {
    pub pds: f64,
    pub dbt: f64,
    pub scholarship: f64,
    pub otp: f64,
    pub banking: f64,
    /// Unweighted mean of the five risks
    pub composite: f64,
}

/// One output row: everything the engine knows about a region
///
/// Field order is the column order of the output table (see [`COLUMNS`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionMetrics {
    pub region: String,

    pub enrol_age_0_5: u64,
    pub enrol_age_5_17: u64,
    pub enrol_age_18_plus: u64,
    pub total_enrolment: u64,
    pub bio_age_5_17: u64,
    pub bio_age_17_plus: u64,
    pub total_biometric: u64,
    pub demo_age_5_17: u64,
    pub demo_age_17_plus: u64,
    pub total_demographic: u64,
    pub total_updates: u64,

    pub enrol_share: f64,
    pub update_share: f64,

    pub idi: f64,
    pub ubi: f64,
    pub yir: f64,
    pub gci: f64,
    pub tcs: f64,

    pub idi_score: f64,
    pub ubi_score: f64,
    pub yir_score: f64,
    pub gci_score: f64,
    pub tcs_score: f64,

    pub health_score: f64,
    pub archetype: Archetype,

    pub pds_risk: f64,
    pub dbt_risk: f64,
    pub scholarship_risk: f64,
    pub otp_risk: f64,
    pub banking_risk: f64,
    pub composite_problem_risk: f64,
}

/// Output column names, in serialization order
pub const COLUMNS: [&str; 32] = [
    "region",
    "enrol_age_0_5",
    "enrol_age_5_17",
    "enrol_age_18_plus",
    "total_enrolment",
    "bio_age_5_17",
    "bio_age_17_plus",
    "total_biometric",
    "demo_age_5_17",
    "demo_age_17_plus",
    "total_demographic",
    "total_updates",
    "enrol_share",
    "update_share",
    "idi",
    "ubi",
    "yir",
    "gci",
    "tcs",
    "idi_score",
    "ubi_score",
    "yir_score",
    "gci_score",
    "tcs_score",
    "health_score",
    "archetype",
    "pds_risk",
    "dbt_risk",
    "scholarship_risk",
    "otp_risk",
    "banking_risk",
    "composite_problem_risk",
];

impl RegionMetrics {
    /// Assemble a row from the outputs of every stage
    pub fn assemble(
        pillars: &RegionPillars,
        scores: &PillarScores,
        health_score: f64,
        archetype: Archetype,
        risks: &RiskSet,
    ) -> Self {
        let agg = &pillars.aggregate;
        Self {
            region: agg.region.clone(),
            enrol_age_0_5: agg.enrolment.age_0_5,
            enrol_age_5_17: agg.enrolment.age_5_17,
            enrol_age_18_plus: agg.enrolment.age_18_plus,
            total_enrolment: agg.total_enrolment(),
            bio_age_5_17: agg.biometric.age_5_17,
            bio_age_17_plus: agg.biometric.age_17_plus,
            total_biometric: agg.total_biometric(),
            demo_age_5_17: agg.demographic.age_5_17,
            demo_age_17_plus: agg.demographic.age_17_plus,
            total_demographic: agg.total_demographic(),
            total_updates: agg.total_updates(),
            enrol_share: pillars.enrol_share,
            update_share: pillars.update_share,
            idi: pillars.metrics.idi,
            ubi: pillars.metrics.ubi,
            yir: pillars.metrics.yir,
            gci: pillars.metrics.gci,
            tcs: pillars.metrics.tcs,
            idi_score: scores.idi,
            ubi_score: scores.ubi,
            yir_score: scores.yir,
            gci_score: scores.gci,
            tcs_score: scores.tcs,
            health_score,
            archetype,
            pds_risk: risks.pds,
            dbt_risk: risks.dbt,
            scholarship_risk: risks.scholarship,
            otp_risk: risks.otp,
            banking_risk: risks.banking,
            composite_problem_risk: risks.composite,
        }
    }
}

/// Output table producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// National figures the pillar metrics were computed against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NationalSummary {
    pub totals: NationalTotals,
    pub total_updates: u64,
    pub youth_update_ratio: f64,
    pub regions: usize,
}

/// Complete output table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionTable {
    pub table_version: String,
    pub producer: TableProducer,
    pub computed_at_utc: String,
    pub national: NationalSummary,
    pub dropped: DropReport,
    /// One row per region, sorted by region name
    pub rows: Vec<RegionMetrics>,
}

impl RegionTable {
    pub fn row(&self, region: &str) -> Option<&RegionMetrics> {
        self.rows.iter().find(|r| r.region == region)
    }

    /// Number of regions per archetype (archetypes with no region omitted)
    pub fn archetype_counts(&self) -> BTreeMap<Archetype, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry(row.archetype).or_insert(0) += 1;
        }
        counts
    }

    /// Regions ranked by Health Score, best first
    pub fn top_by_health(&self, n: usize) -> Vec<&RegionMetrics> {
        let mut ranked: Vec<&RegionMetrics> = self.rows.iter().collect();
        ranked.sort_by(|a, b| {
            b.health_score
                .total_cmp(&a.health_score)
                .then_with(|| a.region.cmp(&b.region))
        });
        ranked.truncate(n);
        ranked
    }
}
