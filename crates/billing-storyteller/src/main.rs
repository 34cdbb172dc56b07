mod bootstrap;
mod render;

use std::sync::Arc;

use anyhow::{Context, Result};
use billing_core::settings::Settings;
use billing_runtime::narrative::GeminiNarrator;
use billing_runtime::orchestrator::AnalysisOrchestrator;
use billing_runtime::store::{ReportStore, SupabaseStore};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("Billing Storyteller v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Input: {}, Model: {}, Currency: {}",
        settings.input.display(),
        settings.model,
        settings.currency
    );

    let narrator = GeminiNarrator::new(settings.api_key().map(str::to_string), &settings.model)
        .with_currency(&settings.currency);

    let store: Option<Arc<dyn ReportStore>> = if settings.no_save {
        tracing::info!("Saving disabled with --no-save");
        None
    } else {
        let store = SupabaseStore::from_credentials(settings.supabase_credentials());
        if store.is_none() {
            tracing::warn!("Supabase is not configured; reports will not be saved");
        }
        store.map(|s| Arc::new(s) as Arc<dyn ReportStore>)
    };

    let orchestrator = AnalysisOrchestrator::new(Arc::new(narrator), store);

    // Progress goes to stderr so stdout carries only the report.
    let mut progress = orchestrator.subscribe();
    let progress_task = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let state = *progress.borrow_and_update();
            if let Some(label) = render::loading_state_label(state) {
                eprintln!("{}", label);
            }
        }
    });

    let result = orchestrator.run_path(&settings.input).await;
    drop(orchestrator);
    let _ = progress_task.await;
    let outcome =
        result.with_context(|| format!("could not analyse {}", settings.input.display()))?;

    let report = outcome.report();
    let metadata = &outcome.analysis.metadata;

    if settings.output == "json" {
        let status = outcome.save.wait().await;
        println!(
            "{}",
            render::render_json(&report, metadata, outcome.narrative_failed, &status)?
        );
        return Ok(());
    }

    print!("{}", render::render_dashboard(&report.statistics, &settings.currency));
    println!();
    println!("{}", render::render_narrative(&report.narrative, outcome.narrative_failed));
    println!("{}", render::render_run_summary(metadata));

    let pending = outcome.save.status();
    if !pending.is_terminal() {
        println!("{}", render::save_status_label(&pending));
    }
    let status = outcome.save.wait().await;
    println!("{}", render::save_status_label(&status));

    Ok(())
}
