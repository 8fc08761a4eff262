//! Error types for the spectra workspace.

use thiserror::Error;

/// Spectra error type.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Conflicting or missing source declaration for a registry key.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Execution attempted on a disabled or never-configured loader.
    #[error("loader not configured: {0}")]
    NotConfigured(String),

    /// Registration or execution attempted after the loader already ran.
    #[error("loader already executed: {0}")]
    AlreadyExecuted(String),

    /// A container could not be opened or parsed. Recovered per container
    /// by the loader (skip + diagnostic count); fatal only if surfaced.
    #[error("source read error: {0}")]
    SourceRead(String),

    /// A cut/var/weight/shift produced an unusable value during the scan.
    /// Fatal: indicates an analysis-definition bug, not data variance.
    #[error("evaluation error: {0}")]
    Evaluation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
