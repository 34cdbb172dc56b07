//! Report persistence.
//!
//! Reports are appended as rows of the `analysis_reports` table through the
//! Supabase PostgREST API.

use async_trait::async_trait;
use billing_core::error::{BillingError, Result};
use billing_core::models::{AnalysisReport, CustomerTotal, PaymentTypeShare, PeriodTrend};
use reqwest::Client;
use serde::Serialize;

pub const REPORTS_TABLE: &str = "analysis_reports";

/// Stored when the report has no customers or the top one is unnamed.
const NO_TOP_CUSTOMER: &str = "N/A";

/// Somewhere a finished [`AnalysisReport`] can be written.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save(&self, report: &AnalysisReport) -> Result<()>;
}

// ── Row shape ─────────────────────────────────────────────────────────────────

/// One `analysis_reports` row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredReport {
    pub total_revenue: f64,
    pub transaction_count: u64,
    pub average_ticket: f64,
    pub top_customer_name: String,
    pub period_trends: Vec<PeriodTrend>,
    pub payment_distribution: Vec<PaymentTypeShare>,
    pub top_customers: Vec<CustomerTotal>,
    pub ai_narrative: String,
}

impl From<&AnalysisReport> for StoredReport {
    fn from(report: &AnalysisReport) -> Self {
        let stats = &report.statistics;
        Self {
            total_revenue: stats.total_amount,
            transaction_count: stats.record_count,
            average_ticket: stats.average_amount,
            top_customer_name: stats
                .top_customer_name()
                .filter(|name| !name.is_empty())
                .unwrap_or(NO_TOP_CUSTOMER)
                .to_string(),
            period_trends: stats.period_trends.clone(),
            payment_distribution: stats.payment_type_dist.clone(),
            top_customers: stats.top_customers.clone(),
            ai_narrative: report.narrative.clone(),
        }
    }
}

// ── SupabaseStore ─────────────────────────────────────────────────────────────

pub struct SupabaseStore {
    client: Client,
    url: String,
    key: String,
}

impl SupabaseStore {
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into().trim_end_matches('/').to_string(),
            key: key.into(),
        }
    }

    /// Build a store from `(url, key)`; `None` when credentials are absent.
    pub fn from_credentials(credentials: Option<(&str, &str)>) -> Option<Self> {
        credentials.map(|(url, key)| Self::new(url, key))
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.url, REPORTS_TABLE)
    }
}

#[async_trait]
impl ReportStore for SupabaseStore {
    async fn save(&self, report: &AnalysisReport) -> Result<()> {
        let row = StoredReport::from(report);

        let res = self
            .client
            .post(self.endpoint())
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await
            .map_err(|e| BillingError::Persistence(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let err_text = res.text().await.unwrap_or_default();
            return Err(BillingError::Persistence(format!(
                "Supabase returned status {}: {}",
                status, err_text
            )));
        }

        tracing::debug!("Report stored in {}", REPORTS_TABLE);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billing_core::models::ProcessedStats;

    fn report(customers: Vec<CustomerTotal>) -> AnalysisReport {
        AnalysisReport {
            statistics: ProcessedStats {
                total_amount: 150.0,
                record_count: 2,
                average_amount: 75.0,
                period_trends: vec![PeriodTrend {
                    name: "2024-01".to_string(),
                    amount: 150.0,
                    count: 2,
                }],
                payment_type_dist: vec![PaymentTypeShare {
                    name: "Card".to_string(),
                    value: 2,
                }],
                top_customers: customers,
            },
            narrative: "## Summary".to_string(),
        }
    }

    #[test]
    fn test_stored_report_maps_fields() {
        let row = StoredReport::from(&report(vec![CustomerTotal {
            customer: "Acme".to_string(),
            amount: 150.0,
        }]));

        assert_eq!(row.total_revenue, 150.0);
        assert_eq!(row.transaction_count, 2);
        assert_eq!(row.average_ticket, 75.0);
        assert_eq!(row.top_customer_name, "Acme");
        assert_eq!(row.ai_narrative, "## Summary");
    }

    #[test]
    fn test_stored_report_without_customers() {
        let row = StoredReport::from(&report(Vec::new()));
        assert_eq!(row.top_customer_name, "N/A");
    }

    #[test]
    fn test_stored_report_blank_top_customer() {
        let row = StoredReport::from(&report(vec![
            CustomerTotal {
                customer: String::new(),
                amount: 150.0,
            },
            CustomerTotal {
                customer: "Acme".to_string(),
                amount: 10.0,
            },
        ]));

        assert_eq!(row.top_customer_name, "N/A");
        assert_eq!(row.top_customers[0].customer, "");
    }

    #[test]
    fn test_stored_report_json_columns() {
        let row = StoredReport::from(&report(Vec::new()));
        let value = serde_json::to_value(&row).unwrap();

        assert_eq!(value["period_trends"][0]["name"], "2024-01");
        assert_eq!(value["payment_distribution"][0]["value"], 2);
        assert!(value["top_customers"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let store = SupabaseStore::new("https://example.supabase.co/", "anon");
        assert_eq!(
            store.endpoint(),
            "https://example.supabase.co/rest/v1/analysis_reports"
        );
    }

    #[test]
    fn test_from_credentials() {
        assert!(SupabaseStore::from_credentials(None).is_none());
        assert!(SupabaseStore::from_credentials(Some(("https://x.supabase.co", "k"))).is_some());
    }
}
