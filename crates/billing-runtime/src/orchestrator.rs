//! Async analysis orchestrator.
//!
//! Runs one upload end to end: aggregate the rows, ask the
//! [`NarrativeGenerator`] for commentary, then hand the finished report to the
//! [`ReportStore`] in a background tokio task. Progress is published on a
//! `watch` channel of [`LoadingState`]; the save reports through its own
//! [`SaveHandle`] so a slow or failing store never holds up the statistics.

use std::path::Path;
use std::sync::Arc;

use billing_core::error::Result;
use billing_core::models::{AnalysisReport, LoadingState, RawRow, SaveStatus};
use billing_data::analysis::{analyze_path, analyze_rows, AnalysisResult};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::narrative::{fallback_narrative, NarrativeGenerator};
use crate::store::ReportStore;

// ── Public types ──────────────────────────────────────────────────────────────

/// Everything one run produced.
#[derive(Debug)]
pub struct AnalysisOutcome {
    /// Statistics plus run metadata.
    pub analysis: AnalysisResult,
    /// The generated narrative, or the fallback text when generation failed.
    pub narrative: String,
    /// `true` when `narrative` is the fallback text.
    pub narrative_failed: bool,
    /// Progress of the background save.
    pub save: SaveHandle,
}

impl AnalysisOutcome {
    /// The report exactly as it is handed to the store.
    pub fn report(&self) -> AnalysisReport {
        AnalysisReport {
            statistics: self.analysis.stats.clone(),
            narrative: self.narrative.clone(),
        }
    }
}

// ── AnalysisOrchestrator ──────────────────────────────────────────────────────

pub struct AnalysisOrchestrator {
    narrator: Arc<dyn NarrativeGenerator>,
    store: Option<Arc<dyn ReportStore>>,
    state: watch::Sender<LoadingState>,
}

impl AnalysisOrchestrator {
    /// Create an orchestrator. Without a `store` every save is
    /// [`SaveStatus::Skipped`].
    pub fn new(
        narrator: Arc<dyn NarrativeGenerator>,
        store: Option<Arc<dyn ReportStore>>,
    ) -> Self {
        let (state, _) = watch::channel(LoadingState::Idle);
        Self {
            narrator,
            store,
            state,
        }
    }

    /// Receive every [`LoadingState`] change from now on.
    pub fn subscribe(&self) -> watch::Receiver<LoadingState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> LoadingState {
        *self.state.borrow()
    }

    /// Analyse a CSV file.
    pub async fn run_path(&self, path: &Path) -> Result<AnalysisOutcome> {
        self.set_state(LoadingState::Processing);
        let analysis = analyze_path(path);
        self.finish(analysis).await
    }

    /// Analyse rows that were already parsed; `source` labels them in logs.
    pub async fn run_rows(&self, rows: &[RawRow], source: &str) -> Result<AnalysisOutcome> {
        self.set_state(LoadingState::Processing);
        let analysis = analyze_rows(rows, source);
        self.finish(analysis).await
    }

    // ── Private implementation ────────────────────────────────────────────

    async fn finish(&self, analysis: Result<AnalysisResult>) -> Result<AnalysisOutcome> {
        let analysis = match analysis {
            Ok(a) => a,
            Err(e) => {
                tracing::error!(error = %e, "analysis failed");
                self.set_state(LoadingState::Error);
                return Err(e);
            }
        };

        self.set_state(LoadingState::GeneratingStory);
        let (narrative, narrative_failed) = match self.narrator.generate(&analysis.stats).await {
            Ok(text) => (text, false),
            Err(e) => {
                tracing::warn!(error = %e, "narrative generation failed; using fallback text");
                (fallback_narrative(&e.to_string()), true)
            }
        };
        self.set_state(LoadingState::Completed);

        let save = self.spawn_save(AnalysisReport {
            statistics: analysis.stats.clone(),
            narrative: narrative.clone(),
        });

        Ok(AnalysisOutcome {
            analysis,
            narrative,
            narrative_failed,
            save,
        })
    }

    fn spawn_save(&self, report: AnalysisReport) -> SaveHandle {
        let Some(store) = self.store.clone() else {
            tracing::debug!("No report store configured; skipping save");
            return SaveHandle::skipped();
        };

        let (tx, rx) = watch::channel(SaveStatus::Saving);
        let task = tokio::spawn(async move {
            let status = match store.save(&report).await {
                Ok(()) => {
                    tracing::info!("Report saved");
                    SaveStatus::Saved
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to save report");
                    SaveStatus::Failed(e.to_string())
                }
            };
            tx.send_replace(status);
        });

        SaveHandle {
            status: rx,
            task: Some(task),
        }
    }

    fn set_state(&self, state: LoadingState) {
        tracing::debug!(?state, "loading state");
        self.state.send_replace(state);
    }
}

// ── SaveHandle ────────────────────────────────────────────────────────────────

/// A handle to the background save task.
#[derive(Debug)]
pub struct SaveHandle {
    status: watch::Receiver<SaveStatus>,
    task: Option<JoinHandle<()>>,
}

impl SaveHandle {
    fn skipped() -> Self {
        let (_, status) = watch::channel(SaveStatus::Skipped);
        Self { status, task: None }
    }

    /// Current status without waiting.
    pub fn status(&self) -> SaveStatus {
        self.status.borrow().clone()
    }

    /// Wait until the save reaches a terminal status.
    pub async fn wait(mut self) -> SaveStatus {
        loop {
            let current = self.status.borrow_and_update().clone();
            if current.is_terminal() {
                return current;
            }
            if self.status.changed().await.is_err() {
                let last = self.status.borrow().clone();
                if last.is_terminal() {
                    return last;
                }
                return SaveStatus::Failed("save task ended without a result".to_string());
            }
        }
    }

    /// Abort the save if it is still running.
    pub fn abort(&self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use billing_core::error::BillingError;
    use billing_core::models::ProcessedStats;

    // ── Mocks ─────────────────────────────────────────────────────────────

    struct FixedNarrator(std::result::Result<String, String>);

    #[async_trait]
    impl NarrativeGenerator for FixedNarrator {
        async fn generate(&self, _stats: &ProcessedStats) -> Result<String> {
            self.0.clone().map_err(BillingError::Narrative)
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        saved: Mutex<Vec<AnalysisReport>>,
        fail_with: Option<String>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl ReportStore for RecordingStore {
        async fn save(&self, report: &AnalysisReport) -> Result<()> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(msg) = &self.fail_with {
                return Err(BillingError::Persistence(msg.clone()));
            }
            self.saved.lock().unwrap().push(report.clone());
            Ok(())
        }
    }

    fn row(customer: &str, period: &str, amount: &str, payment: &str) -> RawRow {
        [
            ("customer", customer),
            ("billPeriod", period),
            ("amount", amount),
            ("paymenttype", payment),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn sample_rows() -> Vec<RawRow> {
        vec![
            row("Acme", "2024-01", "100", "Card"),
            row("Acme", "2024-01", "50", "Cash"),
        ]
    }

    fn orchestrator(
        narrator: FixedNarrator,
        store: Option<Arc<RecordingStore>>,
    ) -> AnalysisOrchestrator {
        AnalysisOrchestrator::new(
            Arc::new(narrator),
            store.map(|s| s as Arc<dyn ReportStore>),
        )
    }

    // ── Happy path ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_run_rows_saves_report() {
        let store = Arc::new(RecordingStore::default());
        let orch = orchestrator(FixedNarrator(Ok("## Story".into())), Some(store.clone()));

        let outcome = orch.run_rows(&sample_rows(), "inline").await.unwrap();
        assert_eq!(outcome.analysis.stats.total_amount, 150.0);
        assert_eq!(outcome.narrative, "## Story");
        assert!(!outcome.narrative_failed);
        assert_eq!(orch.state(), LoadingState::Completed);

        assert_eq!(outcome.save.wait().await, SaveStatus::Saved);
        let saved = store.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].narrative, "## Story");
        assert_eq!(saved[0].statistics.record_count, 2);
    }

    // ── Failure paths ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_narrative_failure_persists_fallback() {
        let store = Arc::new(RecordingStore::default());
        let orch = orchestrator(FixedNarrator(Err("quota exceeded".into())), Some(store.clone()));

        let outcome = orch.run_rows(&sample_rows(), "inline").await.unwrap();
        assert!(outcome.narrative_failed);
        assert!(outcome.narrative.starts_with("**Error generating story:**"));
        assert!(outcome.narrative.contains("quota exceeded"));
        assert_eq!(outcome.analysis.stats.total_amount, 150.0);
        assert_eq!(orch.state(), LoadingState::Completed);

        let narrative = outcome.narrative.clone();
        assert_eq!(outcome.save.wait().await, SaveStatus::Saved);
        assert_eq!(store.saved.lock().unwrap()[0].narrative, narrative);
    }

    #[tokio::test]
    async fn test_save_failure_leaves_stats_intact() {
        let store = Arc::new(RecordingStore {
            fail_with: Some("permission denied".into()),
            ..Default::default()
        });
        let orch = orchestrator(FixedNarrator(Ok("ok".into())), Some(store));

        let outcome = orch.run_rows(&sample_rows(), "inline").await.unwrap();
        let stats = outcome.analysis.stats.clone();

        match outcome.save.wait().await {
            SaveStatus::Failed(msg) => assert!(msg.contains("permission denied")),
            other => panic!("expected Failed, got {other:?}"),
        }
        assert_eq!(stats.record_count, 2);
        assert_eq!(stats.average_amount, 75.0);
    }

    #[tokio::test]
    async fn test_without_store_save_is_skipped() {
        let orch = orchestrator(FixedNarrator(Ok("ok".into())), None);

        let outcome = orch.run_rows(&sample_rows(), "inline").await.unwrap();
        assert_eq!(outcome.save.status(), SaveStatus::Skipped);
        assert_eq!(outcome.save.wait().await, SaveStatus::Skipped);
    }

    #[tokio::test]
    async fn test_empty_rows_set_error_state() {
        let orch = orchestrator(FixedNarrator(Ok("unused".into())), None);

        let err = orch.run_rows(&[], "inline").await.unwrap_err();
        assert!(matches!(err, BillingError::NoRecords));
        assert_eq!(orch.state(), LoadingState::Error);
    }

    #[tokio::test]
    async fn test_missing_file_sets_error_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let orch = orchestrator(FixedNarrator(Ok("unused".into())), None);

        let err = orch.run_path(&dir.path().join("nope.csv")).await.unwrap_err();
        assert!(matches!(err, BillingError::FileRead { .. }));
        assert_eq!(orch.state(), LoadingState::Error);
    }

    // ── Progress ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_subscriber_sees_final_state() {
        let orch = orchestrator(FixedNarrator(Ok("ok".into())), None);
        let mut rx = orch.subscribe();
        assert_eq!(*rx.borrow(), LoadingState::Idle);

        orch.run_rows(&sample_rows(), "inline").await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), LoadingState::Completed);
    }

    #[tokio::test]
    async fn test_save_reports_saving_while_in_flight() {
        let store = Arc::new(RecordingStore {
            delay: Some(Duration::from_millis(200)),
            ..Default::default()
        });
        let orch = orchestrator(FixedNarrator(Ok("ok".into())), Some(store));

        let outcome = orch.run_rows(&sample_rows(), "inline").await.unwrap();
        assert_eq!(outcome.save.status(), SaveStatus::Saving);
        assert_eq!(outcome.save.wait().await, SaveStatus::Saved);
    }

    #[tokio::test]
    async fn test_aborted_save_reports_failure() {
        let store = Arc::new(RecordingStore {
            delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let orch = orchestrator(FixedNarrator(Ok("ok".into())), Some(store));

        let outcome = orch.run_rows(&sample_rows(), "inline").await.unwrap();
        outcome.save.abort();
        assert!(matches!(outcome.save.wait().await, SaveStatus::Failed(_)));
    }
}
