//! Pipeline orchestration
//!
//! This module provides the public API of the engine.
//! It runs the full batch from validated records to the region table.

use crate::aggregator::Aggregator;
use crate::classifier::ArchetypeClassifier;
use crate::config::EngineConfig;
use crate::encoder::TableEncoder;
use crate::error::ComputeError;
use crate::pillars::PillarCalculator;
use crate::risk::RiskMapper;
use crate::schema::{DropReport, RawRecord, RawRecordAdapter};
use crate::scorer::{HealthScorer, IdiRange};
use crate::types::{
    ActivitySet, Dataset, EnrolmentRecord, NationalSummary, NationalTotals, RegionMetrics,
    RegionPillars, RegionTable, UpdateRecord,
};
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Compute the region table from the three validated record streams.
///
/// Pipeline stages:
/// 1. Aggregator - region, sub-region and time-bucket views
/// 2. PillarCalculator - five pillar metrics against national totals
/// 3. HealthScorer - pillar scores and Health Score (after the IDI range barrier)
/// 4. ArchetypeClassifier - first matching rule of the cascade
/// 5. RiskMapper - five risk percentages and their mean
///
/// Either the full table is returned or an error; never a partial table.
///
/// # Example
/// ```ignore
/// let table = compute(&enrolment, &biometric, &demographic, &EngineConfig::default())?;
/// ```
pub fn compute(
    enrolment: &[EnrolmentRecord],
    biometric: &[UpdateRecord],
    demographic: &[UpdateRecord],
    config: &EngineConfig,
) -> Result<RegionTable, ComputeError> {
    config.validate()?;
    let encoder = TableEncoder::new();
    let (rows, national) = run_stages(enrolment, biometric, demographic, config)?;
    Ok(encoder.encode(rows, national, DropReport::default()))
}

fn run_stages(
    enrolment: &[EnrolmentRecord],
    biometric: &[UpdateRecord],
    demographic: &[UpdateRecord],
    config: &EngineConfig,
) -> Result<(Vec<RegionMetrics>, NationalSummary), ComputeError> {
    let streams = [
        (Dataset::Enrolment, enrolment.len()),
        (Dataset::Biometric, biometric.len()),
        (Dataset::Demographic, demographic.len()),
    ];
    if let Some((dataset, _)) = streams.iter().find(|(_, len)| *len == 0) {
        return Err(ComputeError::EmptyDataset(*dataset));
    }

    // Stage 1: aggregate
    let mut tables =
        Aggregator::new(config.bucketing).aggregate_streams(enrolment, biometric, demographic)?;

    if let Some(min) = config.min_region_enrolment {
        let before = tables.regions.len();
        tables.retain_regions(|r| r.total_enrolment() > min);
        debug!(
            kept = tables.regions.len(),
            removed = before - tables.regions.len(),
            min_enrolment = min,
            "applied region filter"
        );
        if tables.regions.is_empty() {
            return Err(ComputeError::NoRegions(min));
        }
    }

    // Every stream must still reach a retained region
    if let Some(dataset) = Dataset::ALL.into_iter().find(|&d| !tables.has_records(d)) {
        return Err(ComputeError::EmptyDataset(dataset));
    }

    // Stage 2: pillar metrics against national totals
    let national = NationalTotals::from_regions(&tables.regions);
    let calculator = PillarCalculator::new(national, &config.defaults);
    let pillars = calculator.compute_all(&tables);

    // Stage 3 needs every IDI before any region can be scored
    let idi_range = IdiRange::from_pillars(&pillars)
        .ok_or_else(|| ComputeError::NoRegions(config.min_region_enrolment.unwrap_or(0)))?;
    debug!(min = idi_range.min, max = idi_range.max, "idi range");

    let scorer = HealthScorer::new(&config.weights, &config.scoring, idi_range);
    let classifier = ArchetypeClassifier::new(&config.thresholds);

    // Stages 3-5 per region
    let finish = |p: &RegionPillars| {
        let (scores, health) = scorer.score(&p.metrics);
        let archetype = classifier.classify(&p.metrics, health);
        let risks = RiskMapper::map(&p.aggregate, &p.metrics, health);
        RegionMetrics::assemble(p, &scores, health, archetype, &risks)
    };

    #[cfg(feature = "parallel")]
    let rows: Vec<RegionMetrics> = pillars.par_iter().map(finish).collect();

    #[cfg(not(feature = "parallel"))]
    let rows: Vec<RegionMetrics> = pillars.iter().map(finish).collect();

    let summary = NationalSummary {
        totals: national,
        total_updates: national.updates(),
        youth_update_ratio: calculator.national_youth_ratio(),
        regions: rows.len(),
    };

    info!(
        regions = rows.len(),
        national_enrolment = national.enrolment,
        national_updates = national.updates(),
        "region table computed"
    );

    Ok((rows, summary))
}

/// Reusable engine holding a validated configuration.
///
/// Use this when several batches are computed with the same policy.
pub struct HealthEngine {
    config: EngineConfig,
    encoder: TableEncoder,
}

impl Default for HealthEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthEngine {
    /// Create an engine with the default policy
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            encoder: TableEncoder::new(),
        }
    }

    /// Create an engine with a specific configuration
    pub fn with_config(config: EngineConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            config,
            encoder: TableEncoder::new(),
        })
    }

    /// Create an engine from a JSON configuration
    pub fn from_config_json(json: &str) -> Result<Self, ComputeError> {
        Self::with_config(EngineConfig::from_json(json)?)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compute from an in-memory activity set
    pub fn compute(&self, activity: &ActivitySet) -> Result<RegionTable, ComputeError> {
        self.compute_with_drops(activity, DropReport::default())
    }

    /// Validate raw records, drop the malformed ones, then compute
    pub fn compute_raw(&self, records: &[RawRecord]) -> Result<RegionTable, ComputeError> {
        let ingested = RawRecordAdapter::to_activity(records);
        self.compute_with_drops(&ingested.activity, ingested.dropped)
    }

    /// JSON array of raw records in, compact JSON table out
    pub fn compute_json(&self, json: &str) -> Result<String, ComputeError> {
        let records = RawRecordAdapter::parse_array(json)?;
        let table = self.compute_raw(&records)?;
        TableEncoder::to_json(&table)
    }

    fn compute_with_drops(
        &self,
        activity: &ActivitySet,
        dropped: DropReport,
    ) -> Result<RegionTable, ComputeError> {
        let (rows, national) = run_stages(
            &activity.enrolment,
            &activity.biometric,
            &activity.demographic,
            &self.config,
        )?;
        Ok(self.encoder.encode(rows, national, dropped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeBucketing;
    use crate::types::{Archetype, EnrolmentCounts, UpdateCounts};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn enrol(region: &str, sub: &str, m: u32, counts: (u64, u64, u64)) -> EnrolmentRecord {
        EnrolmentRecord {
            region: region.to_string(),
            sub_region: sub.to_string(),
            date: date(m, 1),
            counts: EnrolmentCounts {
                age_0_5: counts.0,
                age_5_17: counts.1,
                age_18_plus: counts.2,
            },
        }
    }

    fn update(region: &str, sub: &str, m: u32, youth: u64, adult: u64) -> UpdateRecord {
        UpdateRecord {
            region: region.to_string(),
            sub_region: sub.to_string(),
            date: date(m, 1),
            counts: UpdateCounts {
                age_5_17: youth,
                age_17_plus: adult,
            },
        }
    }

    /// Region A is one tenth of the nation in every field; B is the other nine tenths.
    fn scenario() -> ActivitySet {
        ActivitySet {
            enrolment: vec![
                enrol("A", "a1", 1, (100, 200, 700)),
                enrol("B", "b1", 1, (900, 1800, 6300)),
            ],
            biometric: vec![update("A", "a1", 1, 150, 100), update("B", "b1", 1, 1350, 900)],
            demographic: vec![update("A", "a1", 1, 150, 100), update("B", "b1", 1, 1350, 900)],
        }
    }

    fn sample_raw_json() -> &'static str {
        r#"[
            {"dataset":"enrolment","state":"Kerala","district":"Kollam","date":"01-01-2025","counts":{"age_0_5":50,"age_5_17":120,"age_18_greater":400}},
            {"dataset":"enrolment","state":"kerala ","district":"Idukki","date":"15-02-2025","counts":{"age_0_5":10,"age_5_17":30,"age_18_greater":90}},
            {"dataset":"enrolment","state":"Bihar","district":"Patna","date":"03-01-2025","counts":{"age_0_5":300,"age_5_17":800,"age_18_greater":1200}},
            {"dataset":"enrolment","state":"Bihar","district":"Patna","date":"not-a-date","counts":{"age_0_5":1,"age_5_17":1,"age_18_greater":1}},
            {"dataset":"biometric","state":"Kerala","district":"Kollam","date":"01-01-2025","counts":{"bio_age_5_17":90,"bio_age_17_":200}},
            {"dataset":"biometric","state":"Kerala","district":"Idukki","date":"01-02-2025","counts":{"bio_age_5_17":60,"bio_age_17_":150}},
            {"dataset":"biometric","state":"Bihar","district":"Patna","date":"05-01-2025","counts":{"bio_age_5_17":40,"bio_age_17_":300}},
            {"dataset":"demographic","state":"Kerala","district":"Kollam","date":"07-01-2025","counts":{"demo_age_5_17":80,"demo_age_17_":300}},
            {"dataset":"demographic","state":"Bihar","district":"Gaya","date":"09-02-2025","counts":{"demo_age_5_17":20,"demo_age_17_":-4}}
        ]"#
    }

    #[test]
    fn test_scenario_region_a() {
        let table = HealthEngine::new().compute(&scenario()).unwrap();
        let a = table.row("A").unwrap();

        assert!((a.ubi - 0.5).abs() < 1e-12);
        assert!((a.yir - 1.0).abs() < 1e-12);
        assert!((table.national.youth_update_ratio - 1.5).abs() < 1e-12);
        assert_ne!(a.archetype, Archetype::ExcludedYouth);
        assert_eq!(a.total_updates, a.total_biometric + a.total_demographic);
    }

    #[test]
    fn test_empty_dataset_is_fatal() {
        let mut activity = scenario();
        activity.demographic.clear();

        let result = HealthEngine::new().compute(&activity);
        assert!(matches!(
            result,
            Err(ComputeError::EmptyDataset(Dataset::Demographic))
        ));
    }

    #[test]
    fn test_region_without_updates() {
        let mut activity = scenario();
        activity.enrolment.push(enrol("C", "c1", 1, (10, 10, 10)));

        let table = HealthEngine::new().compute(&activity).unwrap();
        let c = table.row("C").unwrap();

        assert_eq!(c.total_updates, 0);
        assert_eq!(c.gci, 0.0);
        assert_eq!(c.ubi, 0.5);
        assert_eq!(c.tcs, 0.5);
    }

    #[test]
    fn test_zero_adult_enrolment_risks() {
        let mut activity = scenario();
        activity.enrolment.push(enrol("D", "d1", 1, (10, 10, 0)));
        activity.biometric.push(update("D", "d1", 1, 5, 5));

        let table = HealthEngine::new().compute(&activity).unwrap();
        let d = table.row("D").unwrap();

        assert_eq!(d.pds_risk, 0.0);
        assert_eq!(d.dbt_risk, 0.0);
        assert!(!d.composite_problem_risk.is_nan());
    }

    #[test]
    fn test_compute_json_drops_malformed() {
        let json = HealthEngine::new().compute_json(sample_raw_json()).unwrap();
        let table: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(table["dropped"]["enrolment"], 1);
        assert_eq!(table["dropped"]["demographic"], 1);
        assert_eq!(table["dropped"]["biometric"], 0);

        let rows = table["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["region"], "Bihar");
        assert_eq!(rows[1]["region"], "Kerala");
        assert_eq!(rows[1]["total_enrolment"], 700);
    }

    #[test]
    fn test_demographic_only_malformed_is_empty_dataset() {
        let json = r#"[
            {"dataset":"enrolment","region":"A","sub_region":"x","date":"2025-01-01","counts":{"age_0_5":1,"age_5_17":1,"age_18_greater":1}},
            {"dataset":"biometric","region":"A","sub_region":"x","date":"2025-01-01","counts":{"bio_age_5_17":1,"bio_age_17_":1}},
            {"dataset":"demographic","region":"A","sub_region":"x","date":"2025-99-01","counts":{"demo_age_5_17":1,"demo_age_17_":1}}
        ]"#;

        let result = HealthEngine::new().compute_json(json);
        assert!(matches!(
            result,
            Err(ComputeError::EmptyDataset(Dataset::Demographic))
        ));
    }

    #[test]
    fn test_region_filter() {
        let mut activity = scenario();
        activity.enrolment.push(enrol("Tiny", "t", 1, (1, 1, 1)));
        activity.biometric.push(update("Tiny", "t", 1, 1, 1));

        let config = EngineConfig {
            min_region_enrolment: Some(100),
            ..Default::default()
        };
        let table = HealthEngine::with_config(config).unwrap().compute(&activity).unwrap();

        assert!(table.row("Tiny").is_none());
        assert_eq!(table.rows.len(), 2);
        let idi_sum: f64 = table.rows.iter().map(|r| r.idi).sum();
        assert!(idi_sum.abs() < 1e-9);

        let config = EngineConfig {
            min_region_enrolment: Some(1_000_000),
            ..Default::default()
        };
        let result = HealthEngine::with_config(config).unwrap().compute(&activity);
        assert!(matches!(result, Err(ComputeError::NoRegions(1_000_000))));
    }

    #[test]
    fn test_stream_emptied_by_region_filter() {
        let mut activity = scenario();
        activity.demographic = vec![update("Tiny", "t", 1, 5, 5)];
        activity.enrolment.push(enrol("Tiny", "t", 1, (1, 1, 1)));

        let config = EngineConfig {
            min_region_enrolment: Some(100),
            ..Default::default()
        };
        let result = HealthEngine::with_config(config).unwrap().compute(&activity);
        assert!(matches!(
            result,
            Err(ComputeError::EmptyDataset(Dataset::Demographic))
        ));
    }

    #[test]
    fn test_blank_region_records_do_not_form_a_region() {
        let mut activity = scenario();
        activity.biometric.push(update("   ", "x", 1, 40, 40));

        let table = HealthEngine::new().compute(&activity).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert!(table.row("").is_none());

        activity.biometric = vec![update("  ", "x", 1, 40, 40)];
        let result = HealthEngine::new().compute(&activity);
        assert!(matches!(
            result,
            Err(ComputeError::EmptyDataset(Dataset::Biometric))
        ));
    }

    #[test]
    fn test_count_overflow_is_an_error() {
        let mut activity = scenario();
        activity.biometric = vec![
            update("A", "a1", 1, u64::MAX / 2 + 1, 0),
            update("B", "b1", 1, u64::MAX / 2 + 1, 0),
        ];

        let result = HealthEngine::new().compute(&activity);
        assert!(matches!(result, Err(ComputeError::CountOverflow)));
    }

    #[test]
    fn test_oversized_raw_counts_are_dropped() {
        let json = r#"[
            {"dataset":"enrolment","state":"Kerala","district":"Kollam","date":"01-01-2025","counts":{"age_0_5":50,"age_5_17":120,"age_18_greater":400}},
            {"dataset":"biometric","state":"Kerala","district":"Kollam","date":"01-01-2025","counts":{"bio_age_5_17":18446744073709551615,"bio_age_17_":18446744073709551615}},
            {"dataset":"demographic","state":"Kerala","district":"Kollam","date":"07-01-2025","counts":{"demo_age_5_17":80,"demo_age_17_":300}}
        ]"#;

        let result = HealthEngine::new().compute_json(json);
        assert!(matches!(
            result,
            Err(ComputeError::EmptyDataset(Dataset::Biometric))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.weights.ubi = 0.5;
        assert!(HealthEngine::with_config(config.clone()).is_err());

        let s = scenario();
        assert!(compute(&s.enrolment, &s.biometric, &s.demographic, &config).is_err());
    }

    #[test]
    fn test_temporal_consistency_from_buckets() {
        let activity = ActivitySet {
            enrolment: vec![enrol("A", "x", 1, (10, 10, 10))],
            biometric: vec![
                update("A", "x", 1, 50, 50),
                update("A", "x", 2, 150, 150),
                update("A", "y", 2, 0, 0),
            ],
            demographic: vec![update("A", "x", 3, 0, 1)],
        };

        let config = EngineConfig {
            bucketing: TimeBucketing::Month,
            ..Default::default()
        };
        let table = HealthEngine::with_config(config).unwrap().compute(&activity).unwrap();
        let a = table.row("A").unwrap();

        // Monthly totals [100, 300, 1]
        let values = [100.0_f64, 300.0, 1.0];
        let mean = values.iter().sum::<f64>() / 3.0;
        let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 3.0).sqrt();
        assert!((a.tcs - (1.0 - std / mean).max(0.0)).abs() < 1e-12);
    }

    #[test]
    fn test_idempotent() {
        let engine = HealthEngine::new();
        let first = engine.compute(&scenario()).unwrap();
        let second = engine.compute(&scenario()).unwrap();
        assert_eq!(first.rows, second.rows);
        assert_eq!(first.national, second.national);
    }

    #[test]
    fn test_stateless_compute_matches_engine() {
        let s = scenario();
        let stateless = compute(&s.enrolment, &s.biometric, &s.demographic, &EngineConfig::default())
            .unwrap();
        let engine = HealthEngine::new().compute(&s).unwrap();
        assert_eq!(stateless.rows, engine.rows);
    }

    #[test]
    fn test_invalid_json() {
        let result = HealthEngine::new().compute_json("not valid json");
        assert!(matches!(result, Err(ComputeError::JsonError(_))));
    }

    fn arb_update(regions: usize) -> impl Strategy<Value = UpdateRecord> {
        (0..regions, 0..4usize, 1..=12u32, 0..5_000u64, 0..5_000u64).prop_map(
            |(r, s, m, youth, adult)| UpdateRecord {
                region: format!("R{}", r),
                sub_region: format!("S{}", s),
                date: date(m, 1),
                counts: UpdateCounts {
                    age_5_17: youth,
                    age_17_plus: adult,
                },
            },
        )
    }

    fn arb_enrolment(regions: usize) -> impl Strategy<Value = EnrolmentRecord> {
        (0..regions, 0..4usize, 1..=12u32, 0..5_000u64, 0..5_000u64, 0..5_000u64).prop_map(
            |(r, s, m, a, b, c)| EnrolmentRecord {
                region: format!("R{}", r),
                sub_region: format!("S{}", s),
                date: date(m, 1),
                counts: EnrolmentCounts {
                    age_0_5: a,
                    age_5_17: b,
                    age_18_plus: c,
                },
            },
        )
    }

    fn arb_activity() -> impl Strategy<Value = ActivitySet> {
        (
            proptest::collection::vec(arb_enrolment(8), 1..40),
            proptest::collection::vec(arb_update(8), 1..40),
            proptest::collection::vec(arb_update(8), 1..40),
        )
            .prop_map(|(enrolment, biometric, demographic)| ActivitySet {
                enrolment,
                biometric,
                demographic,
            })
    }

    proptest! {
        #[test]
        fn idi_sums_to_zero(activity in arb_activity()) {
            let table = HealthEngine::new().compute(&activity).unwrap();
            let sum: f64 = table.rows.iter().map(|r| r.idi).sum();
            prop_assert!(sum.abs() < 1e-6, "IDI sum was {}", sum);
        }

        #[test]
        fn metrics_and_scores_bounded(activity in arb_activity()) {
            let table = HealthEngine::new().compute(&activity).unwrap();
            for row in &table.rows {
                prop_assert!((0.0..=1.0).contains(&row.ubi));
                prop_assert!((0.0..=1.0).contains(&row.gci));
                prop_assert!((0.0..=1.0).contains(&row.tcs));
                prop_assert!((0.0..=100.0).contains(&row.health_score));
                for risk in [
                    row.pds_risk,
                    row.dbt_risk,
                    row.scholarship_risk,
                    row.otp_risk,
                    row.banking_risk,
                    row.composite_problem_risk,
                ] {
                    prop_assert!((0.0..=100.0).contains(&risk));
                }
            }
        }

        #[test]
        fn one_archetype_per_region(activity in arb_activity()) {
            let table = HealthEngine::new().compute(&activity).unwrap();
            let counted: usize = table.archetype_counts().values().sum();
            prop_assert_eq!(counted, table.rows.len());
            for row in &table.rows {
                prop_assert!(Archetype::ALL.contains(&row.archetype));
                if row.yir < 0.6 {
                    prop_assert_eq!(row.archetype, Archetype::ExcludedYouth);
                }
            }
        }

        #[test]
        fn sub_region_and_bucket_sums_match(activity in arb_activity()) {
            let tables = Aggregator::default().aggregate(&activity).unwrap();
            let subs = tables.sub_region_updates();
            let buckets = tables.time_bucket_updates();
            for region in &tables.regions {
                let name = region.region.as_str();
                let sub_sum: f64 = subs.get(name).map(|v| v.iter().sum()).unwrap_or(0.0);
                let bucket_sum: f64 = buckets.get(name).map(|v| v.iter().sum()).unwrap_or(0.0);
                prop_assert_eq!(sub_sum, region.total_updates() as f64);
                prop_assert_eq!(bucket_sum, region.total_updates() as f64);
            }
        }

        #[test]
        fn pipeline_is_idempotent(activity in arb_activity()) {
            let engine = HealthEngine::new();
            let first = engine.compute(&activity).unwrap();
            let second = engine.compute(&activity).unwrap();
            prop_assert_eq!(first.rows, second.rows);
        }
    }
}
