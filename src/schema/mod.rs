//! ingest.raw_record.v1 input schema
//!
//! This module defines the record format handed over by the ingestion
//! collaborator, its validation rules and the conversion into typed
//! activity records with drop accounting.

mod adapter;
mod raw_record;

pub use adapter::*;
pub use raw_record::*;
