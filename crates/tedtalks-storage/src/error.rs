use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("precondition failed for key: {key}")]
    PreconditionFailed { key: String },

    #[error("malformed document {key}: {reason}")]
    Malformed { key: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("S3 GetObject error: {0}")]
    GetObject(String),

    #[error("S3 PutObject error: {0}")]
    PutObject(String),

    #[error("S3 ListObjects error: {0}")]
    ListObjects(String),
}

impl StorageError {
    /// Errors worth retrying: the store may answer differently next time.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::Unavailable(_)
                | StorageError::GetObject(_)
                | StorageError::PutObject(_)
                | StorageError::ListObjects(_)
        )
    }
}
