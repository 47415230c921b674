// Error taxonomy - only conditions that abort a run are errors
//
// Everything else (no-op writes, data quality findings, missing borrowers)
// is a recorded outcome carried in the run report, never an Err.

use thiserror::Error;

/// Fatal error type for the reconciliation core
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Required configuration missing or invalid - the run must not start
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Connectivity or query failure - aborts the current run; the next
    /// scheduled run retries from scratch (the selector is idempotent)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<rusqlite::Error> for ReconcileError {
    fn from(err: rusqlite::Error) -> Self {
        ReconcileError::StoreUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for ReconcileError {
    fn from(err: serde_json::Error) -> Self {
        ReconcileError::StoreUnavailable(format!("stored document malformed: {err}"))
    }
}

/// Result type alias for the reconciliation core
pub type ReconcileResult<T> = Result<T, ReconcileError>;
