//! Terminal rendering of a finished report.
//!
//! The text dashboard lines columns up by display width so Thai customer
//! names align with ASCII ones.

use billing_core::formatting::{format_amount, format_count, percentage};
use billing_core::models::{AnalysisReport, LoadingState, ProcessedStats, SaveStatus};
use billing_runtime::data::analysis::AnalysisMetadata;
use unicode_width::UnicodeWidthStr;

const BAR_WIDTH: usize = 24;

// ── Text dashboard ────────────────────────────────────────────────────────────

/// Render the statistics as a plain-text dashboard.
pub fn render_dashboard(stats: &ProcessedStats, currency: &str) -> String {
    let mut out = String::new();

    out.push_str("Billing Summary\n");
    let summary = [
        ("Total Revenue", format_amount(stats.total_amount, currency)),
        ("Transactions", format_count(stats.record_count)),
        ("Average Transaction", format_amount(stats.average_amount, currency)),
    ];
    let label_width = column_width(summary.iter().map(|(l, _)| *l));
    for (label, value) in &summary {
        out.push_str(&format!("  {}  {}\n", pad_right(label, label_width), value));
    }

    out.push_str("\nRevenue by Period\n");
    if stats.period_trends.is_empty() {
        out.push_str("  (none)\n");
    }
    let name_width = column_width(stats.period_trends.iter().map(|t| t.name.as_str()));
    let max_amount = stats
        .period_trends
        .iter()
        .map(|t| t.amount)
        .fold(0.0_f64, f64::max);
    for trend in &stats.period_trends {
        out.push_str(&format!(
            "  {}  {}  {} ({})\n",
            pad_right(&trend.name, name_width),
            build_bar(trend.amount, max_amount, BAR_WIDTH),
            format_amount(trend.amount, currency),
            format_count(trend.count),
        ));
    }

    out.push_str("\nPayment Methods\n");
    let type_width = column_width(stats.payment_type_dist.iter().map(|p| p.name.as_str()));
    for share in &stats.payment_type_dist {
        out.push_str(&format!(
            "  {}  {}  {:.1}%\n",
            pad_right(&share.name, type_width),
            format_count(share.value),
            percentage(share.value as f64, stats.record_count as f64, 1),
        ));
    }

    out.push_str("\nTop Customers\n");
    if stats.top_customers.is_empty() {
        out.push_str("  (none)\n");
    }
    let customer_width = column_width(stats.top_customers.iter().map(|c| c.customer.as_str()));
    for (rank, customer) in stats.top_customers.iter().enumerate() {
        out.push_str(&format!(
            "  {}. {}  {}\n",
            rank + 1,
            pad_right(&customer.customer, customer_width),
            format_amount(customer.amount, currency),
        ));
    }

    out
}

/// Progress line for a run state; `None` for states with nothing to show.
pub fn loading_state_label(state: LoadingState) -> Option<&'static str> {
    match state {
        LoadingState::Idle => None,
        LoadingState::Processing => Some("Processing Data..."),
        LoadingState::GeneratingStory => Some("Crafting Your Story..."),
        LoadingState::Completed => Some("Analysis complete."),
        LoadingState::Error => Some("Analysis failed."),
    }
}

/// The narrative block, flagged when it is the fallback text.
pub fn render_narrative(narrative: &str, narrative_failed: bool) -> String {
    if narrative_failed {
        format!("[Story unavailable]\n{}\n", narrative)
    } else {
        format!("{}\n", narrative)
    }
}

/// Footer describing where the numbers came from.
pub fn render_run_summary(metadata: &AnalysisMetadata) -> String {
    let mut line = format!(
        "Processed {} records from {} in {:.2}s",
        format_count(metadata.records_processed as u64),
        metadata.source,
        metadata.load_time_seconds + metadata.transform_time_seconds,
    );
    if metadata.coerced_amounts > 0 {
        line.push_str(&format!(
            " ({} non-numeric amounts counted as 0)",
            format_count(metadata.coerced_amounts as u64)
        ));
    }
    line.push_str(&format!(" at {}", metadata.generated_at));
    line
}

/// One-line description of the background save.
pub fn save_status_label(status: &SaveStatus) -> String {
    match status {
        SaveStatus::Idle => String::new(),
        SaveStatus::Saving => "Saving...".to_string(),
        SaveStatus::Saved => "Saved to DB".to_string(),
        SaveStatus::Failed(msg) => format!("Save Failed: {}", msg),
        SaveStatus::Skipped => "Save skipped".to_string(),
    }
}

// ── JSON output ───────────────────────────────────────────────────────────────

/// Render the report, run metadata and save outcome as pretty JSON.
pub fn render_json(
    report: &AnalysisReport,
    metadata: &AnalysisMetadata,
    narrative_failed: bool,
    save: &SaveStatus,
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&serde_json::json!({
        "statistics": report.statistics,
        "narrative": report.narrative,
        "narrativeFailed": narrative_failed,
        "metadata": metadata,
        "saveStatus": save,
    }))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn column_width<'a>(cells: impl Iterator<Item = &'a str>) -> usize {
    cells.map(UnicodeWidthStr::width).max().unwrap_or(0)
}

fn pad_right(text: &str, width: usize) -> String {
    let pad = width.saturating_sub(text.width());
    format!("{}{}", text, " ".repeat(pad))
}

/// Bar proportional to `value / max`; negative values and a non-positive
/// `max` render empty.
fn build_bar(value: f64, max: f64, width: usize) -> String {
    let ratio = if max > 0.0 {
        (value / max).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (ratio * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use billing_core::models::{CustomerTotal, PaymentTypeShare, PeriodTrend};

    fn stats() -> ProcessedStats {
        ProcessedStats {
            total_amount: 1500.0,
            record_count: 4,
            average_amount: 375.0,
            period_trends: vec![
                PeriodTrend {
                    name: "2024-01".to_string(),
                    amount: 1000.0,
                    count: 3,
                },
                PeriodTrend {
                    name: "2024-02".to_string(),
                    amount: 500.0,
                    count: 1,
                },
            ],
            payment_type_dist: vec![
                PaymentTypeShare {
                    name: "Card".to_string(),
                    value: 3,
                },
                PaymentTypeShare {
                    name: "Unknown".to_string(),
                    value: 1,
                },
            ],
            top_customers: vec![
                CustomerTotal {
                    customer: "บริษัท ก".to_string(),
                    amount: 1000.0,
                },
                CustomerTotal {
                    customer: "Acme".to_string(),
                    amount: 500.0,
                },
            ],
        }
    }

    #[test]
    fn test_dashboard_summary() {
        let text = render_dashboard(&stats(), "THB");

        assert!(text.contains("Total Revenue        1,500.00 THB"));
        assert!(text.contains("Transactions         4"));
        assert!(text.contains("Average Transaction  375.00 THB"));
    }

    #[test]
    fn test_dashboard_period_bars() {
        let text = render_dashboard(&stats(), "THB");
        let full = "█".repeat(BAR_WIDTH);
        let half = format!("{}{}", "█".repeat(12), "░".repeat(12));

        assert!(text.contains(&format!("2024-01  {}  1,000.00 THB (3)", full)));
        assert!(text.contains(&format!("2024-02  {}  500.00 THB (1)", half)));
    }

    #[test]
    fn test_dashboard_payment_percentages() {
        let text = render_dashboard(&stats(), "THB");
        assert!(text.contains("Card     3  75.0%"));
        assert!(text.contains("Unknown  1  25.0%"));
    }

    #[test]
    fn test_dashboard_aligns_by_display_width() {
        let text = render_dashboard(&stats(), "THB");
        let lines: Vec<&str> = text
            .lines()
            .filter(|l| l.contains(". ") && l.ends_with("THB"))
            .collect();

        assert_eq!(lines.len(), 2);
        let amount_col = |l: &str| UnicodeWidthStr::width(&l[..l.rfind("  ").unwrap()]);
        assert_eq!(amount_col(lines[0]), amount_col(lines[1]));
    }

    #[test]
    fn test_dashboard_empty_sections() {
        let text = render_dashboard(&ProcessedStats::default(), "THB");
        assert!(text.contains("Total Revenue        0.00 THB"));
        assert_eq!(text.matches("(none)").count(), 2);
    }

    #[test]
    fn test_build_bar_bounds() {
        assert_eq!(build_bar(-5.0, 10.0, 4), "░░░░");
        assert_eq!(build_bar(5.0, 0.0, 4), "░░░░");
        assert_eq!(build_bar(10.0, 10.0, 4), "████");
    }

    #[test]
    fn test_save_status_label() {
        assert_eq!(save_status_label(&SaveStatus::Saving), "Saving...");
        assert_eq!(save_status_label(&SaveStatus::Saved), "Saved to DB");
        assert_eq!(save_status_label(&SaveStatus::Skipped), "Save skipped");
        assert_eq!(
            save_status_label(&SaveStatus::Failed("timeout".into())),
            "Save Failed: timeout"
        );
    }

    fn metadata(coerced: usize) -> AnalysisMetadata {
        AnalysisMetadata {
            generated_at: "2024-03-01T00:00:00+00:00".to_string(),
            source: "export.csv".to_string(),
            records_processed: 1200,
            coerced_amounts: coerced,
            load_time_seconds: 0.25,
            transform_time_seconds: 0.5,
        }
    }

    #[test]
    fn test_render_json_shape() {
        let report = AnalysisReport {
            statistics: stats(),
            narrative: "## Story".to_string(),
        };
        let json = render_json(&report, &metadata(2), false, &SaveStatus::Saved).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["statistics"]["totalAmount"], 1500.0);
        assert_eq!(value["statistics"]["topCustomers"][1]["customer"], "Acme");
        assert_eq!(value["narrative"], "## Story");
        assert_eq!(value["narrativeFailed"], false);
        assert_eq!(value["metadata"]["recordsProcessed"], 1200);
        assert_eq!(value["metadata"]["coercedAmounts"], 2);
        assert_eq!(value["saveStatus"]["status"], "saved");
    }

    #[test]
    fn test_render_json_flags_fallback_narrative() {
        let report = AnalysisReport {
            statistics: stats(),
            narrative: "**Error generating story:** quota.".to_string(),
        };
        let json = render_json(&report, &metadata(0), true, &SaveStatus::Skipped).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["narrativeFailed"], true);
        assert_eq!(value["saveStatus"]["status"], "skipped");
    }

    #[test]
    fn test_loading_state_label() {
        assert_eq!(loading_state_label(LoadingState::Idle), None);
        assert_eq!(
            loading_state_label(LoadingState::Processing),
            Some("Processing Data...")
        );
        assert_eq!(
            loading_state_label(LoadingState::GeneratingStory),
            Some("Crafting Your Story...")
        );
        assert_eq!(
            loading_state_label(LoadingState::Error),
            Some("Analysis failed.")
        );
    }

    #[test]
    fn test_render_narrative_marks_fallback() {
        assert_eq!(render_narrative("## Story", false), "## Story\n");
        let text = render_narrative("**Error generating story:** x.", true);
        assert!(text.starts_with("[Story unavailable]\n**Error generating story:**"));
    }

    #[test]
    fn test_render_run_summary() {
        assert_eq!(
            render_run_summary(&metadata(0)),
            "Processed 1,200 records from export.csv in 0.75s at 2024-03-01T00:00:00+00:00"
        );
        assert!(render_run_summary(&metadata(3)).contains("(3 non-numeric amounts counted as 0)"));
    }
}
