use std::cmp::Ordering;
use std::collections::BinaryHeap;

use uuid::Uuid;

use tedtalks_core::BoxFuture;
use tedtalks_core::models::{
    AnalysisResult, AnalysisStatus, ClaimTicket, ConversationRecord, StatusUpdate,
};

use crate::error::StorageError;

/// Durable home of conversation documents, as seen by the analysis worker.
///
/// Every mutation is conditional and atomic: implementations either apply the
/// whole change or report `false` without touching the stored document.
pub trait ConversationStore: Send + Sync {
    /// Records with the given status, oldest `status_changed_at` first
    /// (ties by id), at most `limit` of them.
    fn find(
        &self,
        status: AnalysisStatus,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<ConversationRecord>, StorageError>>;

    /// `failed` records the requeue sweep may move back to pending
    /// (`ConversationRecord::is_retryable`), oldest first, at most `limit`.
    /// Permanent failures are filtered out before the limit applies.
    fn find_retryable(
        &self,
        max_retries: u32,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<ConversationRecord>, StorageError>>;

    fn get(&self, id: Uuid) -> BoxFuture<'_, Result<Option<ConversationRecord>, StorageError>>;

    /// Apply `update` if the stored record is still at `version` and matches
    /// the update's expected status. Returns whether it was applied.
    fn compare_and_set_status(
        &self,
        id: Uuid,
        version: u64,
        update: StatusUpdate,
    ) -> BoxFuture<'_, Result<bool, StorageError>>;

    /// Store `result` and move the record to `new_status`, only if the stored
    /// `analysis_version` is still `version` and `claim` still holds it.
    fn commit_analysis(
        &self,
        id: Uuid,
        version: u64,
        claim: ClaimTicket,
        result: AnalysisResult,
        new_status: AnalysisStatus,
    ) -> BoxFuture<'_, Result<bool, StorageError>>;
}

/// Collects the `limit` oldest records offered, by `status_changed_at`
/// then id, holding at most `limit` of them at a time.
pub struct OldestFirst {
    limit: usize,
    heap: BinaryHeap<ByAge>,
}

impl OldestFirst {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            heap: BinaryHeap::with_capacity(limit.saturating_add(1).min(1024)),
        }
    }

    pub fn offer(&mut self, record: ConversationRecord) {
        if self.limit == 0 {
            return;
        }
        self.heap.push(ByAge(record));
        if self.heap.len() > self.limit {
            // Max-heap: the newest record is on top.
            self.heap.pop();
        }
    }

    pub fn into_vec(self) -> Vec<ConversationRecord> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|ByAge(record)| record)
            .collect()
    }
}

struct ByAge(ConversationRecord);

impl ByAge {
    fn key(&self) -> (jiff::Timestamp, Uuid) {
        (self.0.status_changed_at, self.0.id)
    }
}

impl PartialEq for ByAge {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ByAge {}

impl PartialOrd for ByAge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ByAge {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}
