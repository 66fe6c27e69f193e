use std::time::Duration;

use tedtalks_core::models::FailureKind;
use thiserror::Error;

/// Failure of a single mood scorer call.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("scorer timed out after {0:?}")]
    Timeout(Duration),

    #[error("scorer unavailable: {0}")]
    Unavailable(String),

    #[error("invalid scorer response: {0}")]
    InvalidResponse(String),

    /// The backend refused the request itself (bad input, access, unknown
    /// model). Resending the same request will not help.
    #[error("scorer rejected the request: {0}")]
    Rejected(String),
}

impl ScoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ScoreError::Timeout(_) | ScoreError::Unavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("utterance {index} is malformed: {reason}")]
    Malformed { index: usize, reason: String },

    #[error("mood scoring failed: {0}")]
    Scoring(#[from] ScoreError),

    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("invalid safety rule '{rule}': {reason}")]
    InvalidRule { rule: String, reason: String },
}

impl AnalysisError {
    /// Worth retrying in-process with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, AnalysisError::Scoring(e) if e.is_transient())
    }

    /// How a conversation that hit this error is recorded as failed.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            AnalysisError::Malformed { .. } => FailureKind::Malformed,
            AnalysisError::Scoring(ScoreError::Rejected(_)) => FailureKind::Rejected,
            AnalysisError::Scoring(_) => FailureKind::Transient,
            AnalysisError::Invariant(_) | AnalysisError::InvalidRule { .. } => {
                FailureKind::Invariant
            }
        }
    }
}
