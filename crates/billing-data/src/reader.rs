//! CSV loading for billing exports.
//!
//! Turns a header-row CSV into [`RawRow`] maps keyed by column name. Blank
//! lines are skipped; rows shorter than the header simply lack the trailing
//! columns, and cells beyond the header are dropped.

use std::io::Read;
use std::path::Path;

use billing_core::error::{BillingError, Result};
use billing_core::models::RawRow;
use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

/// Open `path` and read every data row.
pub fn read_rows_from_path(path: &Path) -> Result<Vec<RawRow>> {
    let file = std::fs::File::open(path).map_err(|source| BillingError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let rows = read_rows(file)?;
    debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Read every data row from `reader`. The first non-blank line is the header.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<RawRow>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if is_blank(&record) {
            continue;
        }
        rows.push(to_row(&headers, &record));
    }

    Ok(rows)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn is_blank(record: &StringRecord) -> bool {
    record.len() <= 1 && record.get(0).map_or(true, str::is_empty)
}

fn to_row(headers: &[String], record: &StringRecord) -> RawRow {
    headers
        .iter()
        .zip(record.iter())
        .map(|(h, v)| (h.clone(), v.to_string()))
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
