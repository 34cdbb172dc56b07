//! Shared data model, error type, settings and formatting helpers for the
//! Billing Storyteller crates.

pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;

pub use error::{BillingError, Result};
