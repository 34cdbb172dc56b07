//! Main analysis pipeline for the Billing Storyteller.
//!
//! Reads a CSV export, ingests its rows into billing records, rejects an
//! empty batch and aggregates the rest into a [`ProcessedStats`] report.

use std::path::Path;
use std::time::Instant;

use billing_core::error::{BillingError, Result};
use billing_core::models::{ProcessedStats, RawRow};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::aggregator::StatsAggregator;
use crate::ingest::ingest_rows_counting_coerced;
use crate::reader::read_rows_from_path;

// ── Public types ──────────────────────────────────────────────────────────────

/// Metadata produced alongside the statistics.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    /// RFC 3339 timestamp when this result was generated.
    pub generated_at: String,
    /// Where the rows came from (file path, or a caller-supplied label).
    pub source: String,
    /// Number of billing records aggregated.
    pub records_processed: usize,
    /// Rows whose amount was missing or not numeric and counted as zero.
    pub coerced_amounts: usize,
    /// Wall-clock seconds spent reading the CSV.
    pub load_time_seconds: f64,
    /// Wall-clock seconds spent ingesting and aggregating.
    pub transform_time_seconds: f64,
}

/// The complete output of one analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub stats: ProcessedStats,
    pub metadata: AnalysisMetadata,
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Run the full pipeline on a CSV file.
///
/// Fails with [`BillingError::FileRead`] / [`BillingError::Csv`] when the
/// file cannot be read, and [`BillingError::NoRecords`] when it holds no
/// data rows.
pub fn analyze_path(path: &Path) -> Result<AnalysisResult> {
    let load_start = Instant::now();
    let rows = read_rows_from_path(path)?;
    let load_time = load_start.elapsed().as_secs_f64();

    let mut result = analyze_rows(&rows, &path.display().to_string())?;
    result.metadata.load_time_seconds = load_time;
    Ok(result)
}

/// Ingest already-parsed rows and aggregate them.
///
/// `source` is recorded in the metadata only.
pub fn analyze_rows(rows: &[RawRow], source: &str) -> Result<AnalysisResult> {
    let transform_start = Instant::now();

    let (records, coerced) = ingest_rows_counting_coerced(rows);
    if records.is_empty() {
        warn!("No records found in {}", source);
        return Err(BillingError::NoRecords);
    }

    if coerced > 0 {
        debug!("{} rows had a missing or non-numeric amount; counted as 0", coerced);
    }

    let stats = StatsAggregator::calculate(&records);
    let transform_time = transform_start.elapsed().as_secs_f64();

    info!(
        "Aggregated {} records from {}: {} periods, {} payment types",
        stats.record_count,
        source,
        stats.period_trends.len(),
        stats.payment_type_dist.len()
    );

    Ok(AnalysisResult {
        metadata: AnalysisMetadata {
            generated_at: Utc::now().to_rfc3339(),
            source: source.to_string(),
            records_processed: records.len(),
            coerced_amounts: coerced,
            load_time_seconds: 0.0,
            transform_time_seconds: transform_time,
        },
        stats,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
