//! Conversation documents in S3, one JSON object per conversation.
//!
//! Conditional updates are read-modify-write cycles guarded by `If-Match`
//! on the ETag that was read: if anyone else wrote the object in between,
//! S3 rejects the PUT and the update reports `false`.

use aws_sdk_s3::Client;
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};
use uuid::Uuid;

use tedtalks_core::BoxFuture;
use tedtalks_core::models::{
    AnalysisResult, AnalysisStatus, ClaimTicket, ConversationRecord, FailureInfo, FailureKind,
    StatusUpdate,
};
use tedtalks_core::s3_keys;

use crate::error::StorageError;
use crate::objects::{self, WriteCondition};
use crate::state;
use crate::store::{ConversationStore, OldestFirst};

/// Documents fetched concurrently while scanning for a status.
const SCAN_CONCURRENCY: usize = 8;

#[derive(Debug, Clone)]
pub struct S3ConversationStore {
    client: Client,
    bucket: String,
}

impl S3ConversationStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Create a conversation document. Fails with `PreconditionFailed` if
    /// one already exists under the same id.
    pub async fn insert(&self, record: &ConversationRecord) -> Result<(), StorageError> {
        let key = s3_keys::conversation(record.id);
        state::save_document(&self.client, &self.bucket, &key, record, WriteCondition::IfAbsent)
            .await?;
        Ok(())
    }

    /// Scan every conversation document, keeping the `limit` oldest with
    /// `status` that `keep` accepts. Documents are decoded and dropped as
    /// they arrive, so memory stays proportional to `limit`. Every document
    /// is still fetched once per call.
    // TODO: keep a per-status marker prefix, written by ingestion and by
    // every status transition, so this becomes a listing of one prefix.
    async fn scan(
        &self,
        status: AnalysisStatus,
        limit: usize,
        keep: impl Fn(&ConversationRecord) -> bool,
    ) -> Result<Vec<ConversationRecord>, StorageError> {
        let keys: Vec<String> =
            objects::list_keys(&self.client, &self.bucket, s3_keys::CONVERSATIONS_PREFIX)
                .await?
                .into_iter()
                .filter(|key| s3_keys::conversation_id_from_key(key).is_some())
                .collect();

        let mut loads = stream::iter(keys)
            .map(|key| async move {
                let loaded = state::load_document::<serde_json::Value>(
                    &self.client,
                    &self.bucket,
                    &key,
                )
                .await;
                (key, loaded)
            })
            .buffer_unordered(SCAN_CONCURRENCY);

        let mut oldest = OldestFirst::new(limit);
        while let Some((key, loaded)) = loads.next().await {
            let (value, etag) = match loaded {
                Ok(doc) => doc,
                // Deleted between list and get.
                Err(StorageError::NotFound { .. }) => continue,
                Err(StorageError::Malformed { key, reason }) => {
                    warn!(key = %key, reason = %reason, "skipping document that is not valid JSON");
                    continue;
                }
                Err(e) => return Err(e),
            };

            // Cheap pre-check on the raw status before decoding the whole record.
            let stored_status = value.get("analysis_status").and_then(|s| s.as_str());
            if stored_status != Some(status.as_str()) {
                continue;
            }

            match serde_json::from_value::<ConversationRecord>(value.clone()) {
                Ok(record) if keep(&record) => oldest.offer(record),
                Ok(_) => {}
                Err(e) => {
                    let reason = format!("document does not decode as a conversation: {e}");
                    if status == AnalysisStatus::Pending {
                        self.quarantine(&key, value, &etag, &reason).await;
                    } else {
                        debug!(key = %key, reason = %reason, "skipping undecodable document");
                    }
                }
            }
        }

        Ok(oldest.into_vec())
    }

    /// Mark an undecodable pending document as permanently failed by patching
    /// its raw JSON, so it stops showing up as work and the reason is visible.
    async fn quarantine(&self, key: &str, mut value: serde_json::Value, etag: &str, reason: &str) {
        let now = jiff::Timestamp::now();
        let failure = FailureInfo {
            kind: FailureKind::Malformed,
            reason: reason.to_string(),
            at: now,
        };
        let Some(obj) = value.as_object_mut() else {
            warn!(key, "cannot quarantine a non-object document");
            return;
        };
        obj.insert(
            "analysis_status".to_string(),
            serde_json::Value::String(AnalysisStatus::Failed.as_str().to_string()),
        );
        obj.insert(
            "status_changed_at".to_string(),
            serde_json::Value::String(now.to_string()),
        );
        match serde_json::to_value(&failure) {
            Ok(failure) => {
                obj.insert("failure".to_string(), failure);
            }
            Err(e) => {
                warn!(key, error = %e, "failed to encode quarantine reason");
                return;
            }
        }

        match state::save_document(
            &self.client,
            &self.bucket,
            key,
            &value,
            WriteCondition::IfMatch(etag),
        )
        .await
        {
            Ok(_) => warn!(key, reason, "quarantined malformed conversation as failed"),
            Err(e) => warn!(key, error = %e, "failed to quarantine malformed conversation"),
        }
    }

    async fn get_inner(&self, id: Uuid) -> Result<Option<ConversationRecord>, StorageError> {
        let key = s3_keys::conversation(id);
        match state::load_document::<ConversationRecord>(&self.client, &self.bucket, &key).await {
            Ok((record, _etag)) => Ok(Some(record)),
            Err(StorageError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Read, apply `change`, and write back conditioned on the ETag read.
    /// `false` if the record is missing, `change` declines, or a concurrent
    /// writer got there first.
    async fn update_if_match(
        &self,
        id: Uuid,
        change: impl FnOnce(&mut ConversationRecord) -> bool,
    ) -> Result<bool, StorageError> {
        let key = s3_keys::conversation(id);
        let (mut record, etag) =
            match state::load_document::<ConversationRecord>(&self.client, &self.bucket, &key)
                .await
            {
                Ok(doc) => doc,
                Err(StorageError::NotFound { .. }) => return Ok(false),
                Err(e) => return Err(e),
            };

        if !change(&mut record) {
            return Ok(false);
        }

        match state::save_document(
            &self.client,
            &self.bucket,
            &key,
            &record,
            WriteCondition::IfMatch(&etag),
        )
        .await
        {
            Ok(_) => Ok(true),
            Err(StorageError::PreconditionFailed { .. }) => {
                debug!(conversation_id = %id, "conditional write lost to a concurrent writer");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

impl ConversationStore for S3ConversationStore {
    fn find(
        &self,
        status: AnalysisStatus,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<ConversationRecord>, StorageError>> {
        Box::pin(self.scan(status, limit, |_| true))
    }

    fn find_retryable(
        &self,
        max_retries: u32,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<ConversationRecord>, StorageError>> {
        Box::pin(self.scan(AnalysisStatus::Failed, limit, move |record| {
            record.is_retryable(max_retries)
        }))
    }

    fn get(&self, id: Uuid) -> BoxFuture<'_, Result<Option<ConversationRecord>, StorageError>> {
        Box::pin(self.get_inner(id))
    }

    fn compare_and_set_status(
        &self,
        id: Uuid,
        version: u64,
        update: StatusUpdate,
    ) -> BoxFuture<'_, Result<bool, StorageError>> {
        Box::pin(async move {
            self.update_if_match(id, |record| record.apply_status_update(version, &update))
                .await
        })
    }

    fn commit_analysis(
        &self,
        id: Uuid,
        version: u64,
        claim: ClaimTicket,
        result: AnalysisResult,
        new_status: AnalysisStatus,
    ) -> BoxFuture<'_, Result<bool, StorageError>> {
        Box::pin(async move {
            self.update_if_match(id, |record| {
                record.apply_commit(version, &claim, result, new_status)
            })
            .await
        })
    }
}
