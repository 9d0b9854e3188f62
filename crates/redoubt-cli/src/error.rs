//! Error types for the Redoubt CLI

use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Catalog failed to load or validate
    #[error("catalog error: {0}")]
    Catalog(#[from] redoubt::CatalogError),

    /// Execution context missing or invalid
    #[error("context error: {0}")]
    Context(#[from] redoubt::ContextError),

    /// Control id not present in the catalog
    #[error("control not found in catalog: {id}")]
    ControlNotFound { id: String },

    /// Severity filter did not parse
    #[error("unrecognized severity '{value}' (use low/medium/high or CAT I/II/III)")]
    InvalidSeverity { value: String },

    /// The run found policy violations or evaluation errors
    #[error("run found {fail} failed control(s) and {error} error(s)")]
    NonCompliant { fail: usize, error: usize },

    /// Strict mode: controls awaiting manual review
    #[error("{count} control(s) need manual review (strict mode)")]
    ManualReviewOutstanding { count: usize },

    /// Report serialization failed
    #[error("report serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// File IO failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
