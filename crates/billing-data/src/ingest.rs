//! Raw row → [`BillingRecord`] conversion.
//!
//! Every column is carried over verbatim except `amount`, which is coerced to
//! a finite number. Unparseable amounts become `0.0`; ingestion never fails
//! and never drops, merges or reorders rows.

use std::sync::OnceLock;

use billing_core::models::{BillingRecord, RawRow};
use regex::Regex;

/// Leading decimal literal: optional sign, digits with optional fraction (or a
/// bare fraction), optional exponent.
fn numeric_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?").expect("regex is valid")
    })
}

/// Parse the longest numeric prefix of `raw`, ignoring leading whitespace.
///
/// `"12.5"` → `12.5`, `"  7 THB"` → `7`, `"1,000"` → `1`.
/// Returns `None` when no prefix exists or the value is not finite.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let m = numeric_prefix().find(raw.trim_start())?;
    let value: f64 = m.as_str().parse().ok()?;
    value.is_finite().then_some(value)
}

/// Coerce an optional raw cell to an amount, defaulting to `0.0`.
///
/// Negative zero collapses to `0.0`.
pub fn coerce_amount(raw: Option<&str>) -> f64 {
    amount_or_zero(raw.and_then(parse_amount))
}

fn amount_or_zero(parsed: Option<f64>) -> f64 {
    match parsed {
        Some(v) if v != 0.0 => v,
        _ => 0.0,
    }
}

/// Convert one row into a [`BillingRecord`]. Absent columns become `""`.
pub fn ingest_row(row: &RawRow) -> BillingRecord {
    build_record(row, parsed_amount(row))
}

/// Convert every row into a [`BillingRecord`], preserving order and length.
pub fn ingest_rows(rows: &[RawRow]) -> Vec<BillingRecord> {
    ingest_rows_counting_coerced(rows).0
}

/// Like [`ingest_rows`], also returning how many rows had an absent or
/// non-numeric `amount` that was counted as `0.0`.
pub fn ingest_rows_counting_coerced(rows: &[RawRow]) -> (Vec<BillingRecord>, usize) {
    let mut coerced = 0;
    let records = rows
        .iter()
        .map(|row| {
            let parsed = parsed_amount(row);
            if parsed.is_none() {
                coerced += 1;
            }
            build_record(row, parsed)
        })
        .collect();
    (records, coerced)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn parsed_amount(row: &RawRow) -> Option<f64> {
    row.get("amount").and_then(|a| parse_amount(a))
}

fn build_record(row: &RawRow, amount: Option<f64>) -> BillingRecord {
    let text = |key: &str| row.get(key).cloned().unwrap_or_default();
    BillingRecord {
        bacode: text("bacode"),
        accountclass: text("accountclass"),
        customer: text("customer"),
        bill_period: text("billPeriod"),
        amount: amount_or_zero(amount),
        paymenttype: text("paymenttype"),
        doc_type: text("docType"),
        ratecat: text("ratecat"),
        trsg: text("trsg"),
        mru: text("mru"),
        duedatefirst: text("duedatefirst"),
    }
}
