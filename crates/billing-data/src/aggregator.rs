//! Billing statistics over one in-memory batch of records.
//!
//! Produces the totals, per-period trend series, payment-type distribution and
//! top-customer ranking that make up a [`ProcessedStats`] report.

use std::cmp::Ordering;
use std::collections::HashMap;

use billing_core::models::{
    BillingRecord, CustomerTotal, PaymentTypeShare, PeriodTrend, ProcessedStats,
};

/// Maximum number of customers kept in [`ProcessedStats::top_customers`].
pub const TOP_CUSTOMER_LIMIT: usize = 5;

// ── GroupedTotals ─────────────────────────────────────────────────────────────

/// Insertion-ordered accumulator keyed by string.
///
/// Keys are remembered in the order they are first seen; `into_entries`
/// yields them in that order, which the payment-type distribution exposes
/// directly and the customer ranking relies on as its tie-break.
#[derive(Debug)]
struct GroupedTotals<V> {
    index: HashMap<String, usize>,
    entries: Vec<(String, V)>,
}

impl<V: Default> GroupedTotals<V> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// Fetch the bucket for `key`, creating a default one on first sight.
    fn bucket(&mut self, key: &str) -> &mut V {
        let slot = match self.index.get(key) {
            Some(&i) => i,
            None => {
                let i = self.entries.len();
                self.index.insert(key.to_string(), i);
                self.entries.push((key.to_string(), V::default()));
                i
            }
        };
        &mut self.entries[slot].1
    }

    fn into_entries(self) -> Vec<(String, V)> {
        self.entries
    }
}

// ── PeriodBucket ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct PeriodBucket {
    amount: f64,
    count: u64,
}

// ── StatsAggregator ───────────────────────────────────────────────────────────

/// Stateless helper that reduces a batch of billing records to a report.
pub struct StatsAggregator;

impl StatsAggregator {
    /// Compute the full [`ProcessedStats`] for `records`.
    ///
    /// Pure and infallible. Callers are expected to reject an empty batch
    /// before calling, but an empty slice still yields a well-formed, all-zero
    /// report.
    pub fn calculate(records: &[BillingRecord]) -> ProcessedStats {
        let total_amount: f64 = records.iter().map(|r| r.amount).sum();
        let record_count = records.len() as u64;

        // An empty batch reports the total itself rather than dividing by zero.
        let average_amount = if record_count == 0 {
            total_amount
        } else {
            total_amount / record_count as f64
        };

        ProcessedStats {
            total_amount,
            record_count,
            average_amount,
            period_trends: Self::period_trends(records),
            payment_type_dist: Self::payment_type_distribution(records),
            top_customers: Self::top_customers(records),
        }
    }

    /// One entry per distinct billing period, ascending by plain string order.
    ///
    /// The comparison is not date-aware: `"2024-10"` sorts after `"2024-09"`
    /// only because the identifiers are zero-padded.
    pub fn period_trends(records: &[BillingRecord]) -> Vec<PeriodTrend> {
        let mut groups: GroupedTotals<PeriodBucket> = GroupedTotals::new();
        for record in records {
            let bucket = groups.bucket(&record.bill_period);
            bucket.amount += record.amount;
            bucket.count += 1;
        }

        let mut trends: Vec<PeriodTrend> = groups
            .into_entries()
            .into_iter()
            .map(|(name, b)| PeriodTrend {
                name,
                amount: b.amount,
                count: b.count,
            })
            .collect();
        trends.sort_by(|a, b| a.name.cmp(&b.name));
        trends
    }

    /// Record count per payment type in first-seen order.
    ///
    /// Empty payment types are counted under `"Unknown"`.
    pub fn payment_type_distribution(records: &[BillingRecord]) -> Vec<PaymentTypeShare> {
        let mut groups: GroupedTotals<u64> = GroupedTotals::new();
        for record in records {
            *groups.bucket(record.payment_type_label()) += 1;
        }

        groups
            .into_entries()
            .into_iter()
            .map(|(name, value)| PaymentTypeShare { name, value })
            .collect()
    }

    /// Customers ranked by summed amount, highest first, at most
    /// [`TOP_CUSTOMER_LIMIT`] entries.
    ///
    /// Equal totals keep first-seen order (`sort_by` is stable).
    pub fn top_customers(records: &[BillingRecord]) -> Vec<CustomerTotal> {
        let mut groups: GroupedTotals<f64> = GroupedTotals::new();
        for record in records {
            *groups.bucket(&record.customer) += record.amount;
        }

        let mut ranked: Vec<CustomerTotal> = groups
            .into_entries()
            .into_iter()
            .map(|(customer, amount)| CustomerTotal { customer, amount })
            .collect();
        ranked.sort_by(|a, b| b.amount.partial_cmp(&a.amount).unwrap_or(Ordering::Equal));
        ranked.truncate(TOP_CUSTOMER_LIMIT);
        ranked
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
