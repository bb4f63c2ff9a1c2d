//! Error types shared across the scan and evaluation pipelines

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Fatal errors for a scan or evaluation invocation.
///
/// Per-symbol failures never surface here; they are logged and the symbol is
/// excluded. Anything that reaches this type aborts the current invocation.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Exchange listing could not be retrieved
    #[error("Instrument listing failed: {0}")]
    Listing(#[source] anyhow::Error),

    /// Every symbol in the universe failed or returned no bars
    #[error("No market data fetched for any of {attempted} symbols")]
    EmptyUniverse { attempted: usize },

    /// No symbol has a bar at the closed-bar boundary
    #[error("No data for last closed bar {0}")]
    MissingClosedBar(DateTime<Utc>),

    /// No row at the boundary carries a usable model score
    #[error("No scorable rows at {0}")]
    NoScorableRows(DateTime<Utc>),

    /// Scorer returned a different number of scores than rows sent
    #[error("Inference response count mismatch: sent {sent} rows, received {received} scores")]
    InferenceCountMismatch { sent: usize, received: usize },

    /// Scorer answered with a non-success HTTP status
    #[error("Inference endpoint returned {status}: {body}")]
    InferenceStatus { status: u16, body: String },

    /// Transport-level inference failure
    #[error("Inference request failed: {0}")]
    Inference(#[from] reqwest::Error),

    /// Evaluation rows for this (run, horizon) were inserted by someone else
    #[error("Evaluation for run {run_id} at {horizon_hours}h already exists")]
    DuplicateEvaluation { run_id: String, horizon_hours: i64 },

    /// Store read/write failure
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Schema migration failure
    #[error("Store migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Stored row could not be mapped back into a domain type
    #[error("Corrupt stored row: {0}")]
    CorruptRow(String),
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_mismatch_message() {
        let err = ScanError::InferenceCountMismatch {
            sent: 12,
            received: 11,
        };
        assert_eq!(
            err.to_string(),
            "Inference response count mismatch: sent 12 rows, received 11 scores"
        );
    }

    #[test]
    fn test_empty_universe_message() {
        let err = ScanError::EmptyUniverse { attempted: 250 };
        assert!(err.to_string().contains("250"));
    }
}
