//! In-process conversation store.
//!
//! Used by tests and local runs. A single mutex around the map makes every
//! conditional update trivially atomic.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use tedtalks_core::BoxFuture;
use tedtalks_core::models::{
    AnalysisResult, AnalysisStatus, ClaimTicket, ConversationRecord, StatusUpdate, Utterance,
};

use crate::error::StorageError;
use crate::store::{ConversationStore, OldestFirst};

#[derive(Debug, Default)]
pub struct MemoryConversationStore {
    records: Mutex<HashMap<Uuid, ConversationRecord>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = ConversationRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Insert or replace a record, as ingestion would.
    pub fn insert(&self, record: ConversationRecord) {
        self.lock().insert(record.id, record);
    }

    /// Append an utterance through the ingestion contract (version bump and
    /// reset to pending). Returns `false` if the record does not exist.
    pub fn append_utterance(&self, id: Uuid, utterance: Utterance, now: jiff::Timestamp) -> bool {
        match self.lock().get_mut(&id) {
            Some(record) => {
                record.append_utterance(utterance, now);
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self, id: Uuid) -> Option<ConversationRecord> {
        self.lock().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn oldest_matching(
        &self,
        limit: usize,
        keep: impl Fn(&ConversationRecord) -> bool,
    ) -> Vec<ConversationRecord> {
        let mut oldest = OldestFirst::new(limit);
        for record in self.lock().values().filter(|r| keep(r)) {
            oldest.offer(record.clone());
        }
        oldest.into_vec()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, ConversationRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConversationStore for MemoryConversationStore {
    fn find(
        &self,
        status: AnalysisStatus,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<ConversationRecord>, StorageError>> {
        let records = self.oldest_matching(limit, |r| r.analysis_status == status);
        Box::pin(async move { Ok(records) })
    }

    fn find_retryable(
        &self,
        max_retries: u32,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<ConversationRecord>, StorageError>> {
        let records = self.oldest_matching(limit, |r| r.is_retryable(max_retries));
        Box::pin(async move { Ok(records) })
    }

    fn get(&self, id: Uuid) -> BoxFuture<'_, Result<Option<ConversationRecord>, StorageError>> {
        let record = self.snapshot(id);
        Box::pin(async move { Ok(record) })
    }

    fn compare_and_set_status(
        &self,
        id: Uuid,
        version: u64,
        update: StatusUpdate,
    ) -> BoxFuture<'_, Result<bool, StorageError>> {
        let applied = self
            .lock()
            .get_mut(&id)
            .is_some_and(|record| record.apply_status_update(version, &update));
        Box::pin(async move { Ok(applied) })
    }

    fn commit_analysis(
        &self,
        id: Uuid,
        version: u64,
        claim: ClaimTicket,
        result: AnalysisResult,
        new_status: AnalysisStatus,
    ) -> BoxFuture<'_, Result<bool, StorageError>> {
        let applied = self
            .lock()
            .get_mut(&id)
            .is_some_and(|record| record.apply_commit(version, &claim, result, new_status));
        Box::pin(async move { Ok(applied) })
    }
}
