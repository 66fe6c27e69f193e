use tedtalks_analysis::ScoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BedrockError {
    /// Throttling, timeouts, and server-side faults. Worth retrying.
    #[error("model invocation failed: {0}")]
    Invocation(String),

    #[error("model rejected the request: {0}")]
    Rejected(String),

    #[error("response parsing failed: {0}")]
    ResponseParse(String),

    #[error("response did not conform to expected schema: {0}")]
    SchemaViolation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<BedrockError> for ScoreError {
    fn from(err: BedrockError) -> Self {
        match err {
            BedrockError::Invocation(msg) => ScoreError::Unavailable(msg),
            BedrockError::Rejected(msg) => ScoreError::Rejected(msg),
            other => ScoreError::InvalidResponse(other.to_string()),
        }
    }
}
