//! Narrative generation for billing reports.
//!
//! [`NarrativeGenerator`] is the seam the orchestrator talks to;
//! [`GeminiNarrator`] implements it against the Gemini `generateContent`
//! REST endpoint.

use async_trait::async_trait;
use billing_core::error::{BillingError, Result};
use billing_core::formatting::format_number;
use billing_core::models::ProcessedStats;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Returned when the model answers with no text at all.
pub const EMPTY_NARRATIVE: &str = "Could not generate story.";

// ── NarrativeGenerator ────────────────────────────────────────────────────────

/// Turns a statistics report into free-form commentary.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, stats: &ProcessedStats) -> Result<String>;
}

/// Placeholder narrative shown (and persisted) when generation fails.
pub fn fallback_narrative(message: &str) -> String {
    format!(
        "**Error generating story:** {}. \n\nThe statistics are still valid and displayed correctly.",
        message
    )
}

/// Build the analyst prompt for `stats`.
pub fn build_prompt(stats: &ProcessedStats, currency: &str) -> Result<String> {
    let trends = serde_json::to_string(&stats.period_trends)?;
    let payments = serde_json::to_string(&stats.payment_type_dist)?;
    let customers = serde_json::to_string(&stats.top_customers)?;

    Ok(format!(
        "You are a senior Data Analyst presenting a billing report to executives.\n\
         Analyze the following billing statistics and tell a compelling narrative story about the business performance.\n\
         \n\
         **Data Summary:**\n\
         - Total Revenue: {total} {currency}\n\
         - Total Transactions: {count}\n\
         - Average Transaction Value: {average:.2} {currency}\n\
         \n\
         **Trends:**\n\
         {trends}\n\
         \n\
         **Payment Methods:**\n\
         {payments}\n\
         \n\
         **Top Customers:**\n\
         {customers}\n\
         \n\
         **Instructions:**\n\
         1. Start with an \"Executive Summary\" highlighting the most important number (Total Revenue) and the overall sentiment.\n\
         2. Analyze the \"Monthly Trends\". Are we growing? Was there a specific month with a spike or drop? Explain why (hypothetically based on data patterns).\n\
         3. Discuss \"Customer Behavior\". Who are the top contributors? What is the preferred payment method?\n\
         4. Provide \"Strategic Recommendations\" based on these findings.\n\
         5. Use Markdown formatting (## Headers, **Bold**, bullet points) to make it readable.\n\
         6. Use professional but engaging business language.\n",
        total = format_number(stats.total_amount, 2),
        count = stats.record_count,
        average = stats.average_amount,
    ))
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateContentRequest {
    fn from_prompt(prompt: String) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: Some(prompt) }],
            }],
        }
    }
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate, if any.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.is_empty()).then_some(text)
    }
}

// ── GeminiNarrator ────────────────────────────────────────────────────────────

/// Gemini-backed [`NarrativeGenerator`].
///
/// A narrator without an API key is valid to construct; every call then fails
/// with [`BillingError::MissingApiKey`] so the caller can fall back.
#[derive(Clone)]
pub struct GeminiNarrator {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    currency: String,
}

impl GeminiNarrator {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: model.into(),
            base_url: GEMINI_BASE_URL.to_string(),
            currency: billing_core::settings::DEFAULT_CURRENCY.to_string(),
        }
    }

    /// Override the API root (for proxies and local test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Currency label used in the prompt.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    fn endpoint(&self, api_key: &str) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, api_key
        )
    }
}

#[async_trait]
impl NarrativeGenerator for GeminiNarrator {
    async fn generate(&self, stats: &ProcessedStats) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or(BillingError::MissingApiKey)?;
        let payload = GenerateContentRequest::from_prompt(build_prompt(stats, &self.currency)?);

        tracing::debug!(model = %self.model, "requesting narrative");

        let res = self
            .client
            .post(self.endpoint(api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| BillingError::Narrative(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let err_text = res.text().await.unwrap_or_default();
            return Err(BillingError::Narrative(format!(
                "Gemini API error (status {}): {}",
                status, err_text
            )));
        }

        let body: GenerateContentResponse = res
            .json()
            .await
            .map_err(|e| BillingError::Narrative(e.to_string()))?;

        Ok(body.text().unwrap_or_else(|| EMPTY_NARRATIVE.to_string()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
