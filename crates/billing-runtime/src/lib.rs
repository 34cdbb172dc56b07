//! Runtime layer for the Billing Storyteller.
//!
//! Drives one analysis run: statistics from `billing-data`, a narrative from
//! Gemini and a background save to Supabase.

pub mod narrative;
pub mod orchestrator;
pub mod store;

pub use billing_core as core;
pub use billing_data as data;
