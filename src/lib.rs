//! Ecosystem Health - batch scoring engine for identity-registration ecosystems
//!
//! The engine turns enrolment and update activity into one row per region
//! through a deterministic pipeline: aggregation → pillar metrics → health
//! score → archetype classification → service risk mapping.
//!
//! ## Modules
//!
//! - **Ingestion**: `schema` validates `ingest.raw_record.v1` records and drops malformed ones
//! - **Pipeline**: `aggregator`, `pillars`, `scorer`, `classifier`, `risk`
//! - **Output**: `encoder` wraps rows into a versioned `RegionTable`

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod encoder;
pub mod error;
pub mod gini;
pub mod pillars;
pub mod pipeline;
pub mod risk;
pub mod schema;
pub mod scorer;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::EngineConfig;
pub use error::ComputeError;
pub use pipeline::{compute, HealthEngine};

// Schema exports
pub use schema::{DropReport, RawRecord, RawRecordAdapter, SCHEMA_VERSION};

pub use types::{Archetype, Dataset, RegionMetrics, RegionTable};

/// Engine version embedded in every output table
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for output tables
pub const PRODUCER_NAME: &str = "ecosystem-health";
