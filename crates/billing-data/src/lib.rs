//! Data layer for the Billing Storyteller.
//!
//! Reads CSV billing exports, normalizes rows into billing records,
//! aggregates statistics and runs the top-level analysis pipeline.

pub mod aggregator;
pub mod analysis;
pub mod ingest;
pub mod reader;

pub use billing_core as core;
