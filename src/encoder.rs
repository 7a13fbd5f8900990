//! Output table encoding
//!
//! This module wraps computed rows into a `RegionTable` envelope and
//! serializes it. Row content depends only on the input; `instance_id` and
//! `computed_at_utc` live on the envelope.

use crate::error::ComputeError;
use crate::schema::DropReport;
use crate::types::{NationalSummary, RegionMetrics, RegionTable, TableProducer};
use crate::{ENGINE_VERSION, PRODUCER_NAME};
use chrono::Utc;
use uuid::Uuid;

/// Current output table version
pub const TABLE_VERSION: &str = "region_health.v1";

/// Table encoder for producing output envelopes
#[derive(Debug, Clone)]
pub struct TableEncoder {
    instance_id: String,
}

impl Default for TableEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Wrap rows into a table envelope
    pub fn encode(
        &self,
        rows: Vec<RegionMetrics>,
        national: NationalSummary,
        dropped: DropReport,
    ) -> RegionTable {
        RegionTable {
            table_version: TABLE_VERSION.to_string(),
            producer: TableProducer {
                name: PRODUCER_NAME.to_string(),
                version: ENGINE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            national,
            dropped,
            rows,
        }
    }

    /// Full envelope as compact JSON
    pub fn to_json(table: &RegionTable) -> Result<String, ComputeError> {
        serde_json::to_string(table).map_err(|e| ComputeError::EncodingError(e.to_string()))
    }

    /// Full envelope as pretty JSON
    pub fn to_json_pretty(table: &RegionTable) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(table).map_err(|e| ComputeError::EncodingError(e.to_string()))
    }

    /// Rows only, one JSON object per line
    pub fn to_ndjson(table: &RegionTable) -> Result<String, ComputeError> {
        let mut out = String::new();
        for row in &table.rows {
            let line =
                serde_json::to_string(row).map_err(|e| ComputeError::EncodingError(e.to_string()))?;
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Archetype, NationalTotals, PillarMetrics, PillarScores, RegionAggregate, RegionPillars,
        RiskSet,
    };

    fn make_row(region: &str, health: f64, archetype: Archetype) -> RegionMetrics {
        let pillars = RegionPillars {
            aggregate: RegionAggregate::new(region),
            enrol_share: 0.1,
            update_share: 0.1,
            metrics: PillarMetrics::default(),
        };
        RegionMetrics::assemble(&pillars, &PillarScores::default(), health, archetype, &RiskSet::default())
    }

    fn make_table() -> RegionTable {
        let encoder = TableEncoder::with_instance_id("test-instance".to_string());
        encoder.encode(
            vec![
                make_row("A", 40.0, Archetype::Moderate),
                make_row("B", 80.0, Archetype::DigitalLeader),
                make_row("C", 60.0, Archetype::Moderate),
            ],
            NationalSummary {
                totals: NationalTotals::default(),
                total_updates: 0,
                youth_update_ratio: 0.0,
                regions: 3,
            },
            DropReport::default(),
        )
    }

    #[test]
    fn test_encode_envelope() {
        let table = make_table();
        assert_eq!(table.table_version, TABLE_VERSION);
        assert_eq!(table.producer.name, PRODUCER_NAME);
        assert_eq!(table.producer.instance_id, "test-instance");
        assert_eq!(table.rows.len(), 3);
    }

    #[test]
    fn test_encode_to_json() {
        let table = make_table();
        let json = TableEncoder::to_json(&table).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["rows"][1]["archetype"], "Digital Leader");
        assert_eq!(value["national"]["regions"], 3);

        let parsed: RegionTable = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.producer, table.producer);
        assert_eq!(parsed.rows.len(), table.rows.len());
        assert_eq!(parsed.rows[2].archetype, Archetype::Moderate);
    }

    #[test]
    fn test_encode_to_ndjson() {
        let table = make_table();
        let ndjson = TableEncoder::to_ndjson(&table).unwrap();
        let lines: Vec<&str> = ndjson.lines().collect();

        assert_eq!(lines.len(), 3);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["region"], "A");
    }

    #[test]
    fn test_summaries() {
        let table = make_table();

        let counts = table.archetype_counts();
        assert_eq!(counts[&Archetype::Moderate], 2);
        assert_eq!(counts[&Archetype::DigitalLeader], 1);
        assert!(!counts.contains_key(&Archetype::Sprinter));

        let top: Vec<&str> = table.top_by_health(2).iter().map(|r| r.region.as_str()).collect();
        assert_eq!(top, vec!["B", "C"]);
    }
}
