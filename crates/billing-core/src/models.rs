use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Label used for records whose payment type is empty or absent.
pub const UNKNOWN_PAYMENT_TYPE: &str = "Unknown";

/// One parsed CSV row: header-declared column name → raw cell text.
pub type RawRow = HashMap<String, String>;

/// One normalized row of the billing export.
///
/// Every field except `amount` is carried through from the CSV unchanged; a
/// column missing from the row becomes the empty string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillingRecord {
    /// Billing-account code.
    #[serde(default)]
    pub bacode: String,
    /// Account class.
    #[serde(default)]
    pub accountclass: String,
    /// Customer name, the grouping key for the top-customer ranking.
    #[serde(default)]
    pub customer: String,
    /// Billing period identifier, e.g. `"2024-01"`.
    #[serde(default, rename = "billPeriod")]
    pub bill_period: String,
    /// Monetary amount. Always finite after ingestion.
    #[serde(default)]
    pub amount: f64,
    /// Payment type; may be empty.
    #[serde(default)]
    pub paymenttype: String,
    /// Document type.
    #[serde(default, rename = "docType")]
    pub doc_type: String,
    /// Rate category.
    #[serde(default)]
    pub ratecat: String,
    /// Traffic segment.
    #[serde(default)]
    pub trsg: String,
    /// Managed-resource unit.
    #[serde(default)]
    pub mru: String,
    /// First due date, kept as the raw export text.
    #[serde(default)]
    pub duedatefirst: String,
}

impl BillingRecord {
    /// Payment-type label used for grouping: the raw value, or
    /// [`UNKNOWN_PAYMENT_TYPE`] when it is empty.
    pub fn payment_type_label(&self) -> &str {
        if self.paymenttype.is_empty() {
            UNKNOWN_PAYMENT_TYPE
        } else {
            &self.paymenttype
        }
    }
}

/// Revenue and record count for one billing period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodTrend {
    pub name: String,
    pub amount: f64,
    pub count: u64,
}

/// Number of records carrying one payment type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTypeShare {
    pub name: String,
    pub value: u64,
}

/// Summed amount for one customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerTotal {
    pub customer: String,
    pub amount: f64,
}

/// The aggregate report computed from one batch of [`BillingRecord`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedStats {
    /// Sum of every record's amount.
    pub total_amount: f64,
    /// Number of records in the batch.
    pub record_count: u64,
    /// `total_amount / record_count`, or `total_amount` for an empty batch.
    pub average_amount: f64,
    /// One entry per billing period, ascending by name.
    pub period_trends: Vec<PeriodTrend>,
    /// One entry per payment type, in first-seen order.
    pub payment_type_dist: Vec<PaymentTypeShare>,
    /// Up to five customers, highest summed amount first.
    pub top_customers: Vec<CustomerTotal>,
}

impl ProcessedStats {
    /// Name of the highest-ranked customer, if any.
    pub fn top_customer_name(&self) -> Option<&str> {
        self.top_customers.first().map(|c| c.customer.as_str())
    }
}

/// A finished report: statistics plus the narrative shown next to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub statistics: ProcessedStats,
    pub narrative: String,
}

/// Progress of one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadingState {
    Idle,
    Processing,
    GeneratingStory,
    Completed,
    Error,
}

/// Outcome of persisting a report in the background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum SaveStatus {
    /// No save has been requested yet.
    Idle,
    /// The report is being written.
    Saving,
    /// The store acknowledged the report.
    Saved,
    /// The store failed; carries the error message.
    Failed(String),
    /// No store is configured, or saving was disabled.
    Skipped,
}

impl SaveStatus {
    /// `true` once the status can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Saved | Self::Failed(_) | Self::Skipped)
    }
}
