use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the Billing Storyteller.
#[derive(Error, Debug)]
pub enum BillingError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV export could not be parsed.
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    /// A JSON document could not be parsed or produced.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Ingestion produced zero records; the run cannot continue.
    #[error("No records found in CSV.")]
    NoRecords,

    /// No API key was supplied for the narrative service.
    #[error("API key is missing. Set GEMINI_API_KEY or pass --gemini-api-key.")]
    MissingApiKey,

    /// The narrative service failed or returned an unusable response.
    #[error("Narrative generation failed: {0}")]
    Narrative(String),

    /// The report store rejected or failed to receive a report.
    #[error("Failed to save report: {0}")]
    Persistence(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the billing crates.
pub type Result<T> = std::result::Result<T, BillingError>;
