use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use super::analysis::AnalysisResult;
use crate::error::CoreError;

/// A captured voice-chat conversation and its analysis bookkeeping.
///
/// Stored as one JSON document per conversation. Ingestion creates it in
/// `pending`; the analysis worker moves it through the status machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConversationRecord {
    pub id: Uuid,
    pub user_id: String,
    pub utterances: Vec<Utterance>,
    pub analysis_status: AnalysisStatus,
    /// Bumped every time `utterances` changes.
    pub analysis_version: u64,
    #[serde(default)]
    pub analysis: Option<AnalysisResult>,
    /// The `analysis_version` that `analysis` was computed from.
    #[serde(default)]
    pub last_analyzed_version: Option<u64>,
    /// Last time `analysis_status` changed. Drives batch order and stale reclaim.
    pub status_changed_at: jiff::Timestamp,
    /// Worker holding the current claim, while `in_progress`.
    #[serde(default)]
    pub claimed_by: Option<String>,
    /// Failed attempts at the current version.
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub failure: Option<FailureInfo>,
    pub created_at: jiff::Timestamp,
}

/// One turn of speech within a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Utterance {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: jiff::Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Speaker {
    Child,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum AnalysisStatus {
    Pending,
    InProgress,
    Done,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::InProgress => "in_progress",
            AnalysisStatus::Done => "done",
            AnalysisStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the last analysis attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FailureInfo {
    pub kind: FailureKind,
    pub reason: String,
    pub at: jiff::Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum FailureKind {
    /// Store or scorer unavailable after in-process retries.
    Transient,
    /// The conversation content cannot be analyzed as stored.
    Malformed,
    /// The pipeline produced a result that breaks a data-model invariant.
    Invariant,
    /// The scorer backend refused the request (access, validation, unknown
    /// model). Needs an operator, not another attempt.
    Rejected,
}

impl FailureKind {
    /// Whether the automatic requeue sweep may move this failure back to
    /// pending. Invariant breaks are deterministic for a given version, so
    /// only transient failures qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::Transient)
    }
}

/// Identifies one claim on a record: the worker that won it and the
/// `status_changed_at` the claim wrote. A reclaim by another worker rewrites
/// both, so a ticket from before the reclaim no longer matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimTicket {
    pub worker_id: String,
    pub claimed_at: jiff::Timestamp,
}

impl ClaimTicket {
    pub fn new(worker_id: impl Into<String>, claimed_at: jiff::Timestamp) -> Self {
        Self {
            worker_id: worker_id.into(),
            claimed_at,
        }
    }

    /// Whether `record` is still held under this claim.
    pub fn holds(&self, record: &ConversationRecord) -> bool {
        record.analysis_status == AnalysisStatus::InProgress
            && record.claimed_by.as_deref() == Some(self.worker_id.as_str())
            && record.status_changed_at == self.claimed_at
    }
}

/// A conditional status transition, applied atomically by a store.
///
/// The transition applies only when the stored record is still at the
/// expected version and status (and, when `expected_since` is set, has not
/// changed status since that instant). When `expected_claimant` is set the
/// record must also still be claimed by that worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub expected: AnalysisStatus,
    pub expected_since: Option<jiff::Timestamp>,
    pub expected_claimant: Option<String>,
    pub new: AnalysisStatus,
    pub at: jiff::Timestamp,
    pub claimed_by: Option<String>,
    pub failure: Option<FailureInfo>,
}

impl StatusUpdate {
    /// `pending → in_progress`.
    pub fn claim(worker_id: impl Into<String>, at: jiff::Timestamp) -> Self {
        Self {
            expected: AnalysisStatus::Pending,
            expected_since: None,
            expected_claimant: None,
            new: AnalysisStatus::InProgress,
            at,
            claimed_by: Some(worker_id.into()),
            failure: None,
        }
    }

    /// Take over an abandoned claim. Only succeeds if nobody touched the
    /// record since `observed_since`.
    pub fn reclaim(
        worker_id: impl Into<String>,
        observed_since: jiff::Timestamp,
        at: jiff::Timestamp,
    ) -> Self {
        Self {
            expected: AnalysisStatus::InProgress,
            expected_since: Some(observed_since),
            expected_claimant: None,
            new: AnalysisStatus::InProgress,
            at,
            claimed_by: Some(worker_id.into()),
            failure: None,
        }
    }

    /// `in_progress → failed`, only while `claim` still holds.
    pub fn fail(claim: &ClaimTicket, failure: FailureInfo) -> Self {
        Self {
            expected: AnalysisStatus::InProgress,
            expected_since: Some(claim.claimed_at),
            expected_claimant: Some(claim.worker_id.clone()),
            new: AnalysisStatus::Failed,
            at: failure.at,
            claimed_by: None,
            failure: Some(failure),
        }
    }

    /// `failed → pending`.
    pub fn requeue(observed_since: jiff::Timestamp, at: jiff::Timestamp) -> Self {
        Self {
            expected: AnalysisStatus::Failed,
            expected_since: Some(observed_since),
            expected_claimant: None,
            new: AnalysisStatus::Pending,
            at,
            claimed_by: None,
            failure: None,
        }
    }
}

/// What a downstream reader should show for a conversation's analysis.
///
/// The raw utterances are always readable regardless of this view.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisView<'a> {
    Available(&'a AnalysisResult),
    /// Not analyzed yet at the current version, or a retry is still due.
    Pending,
    Unavailable { reason: String },
}

impl ConversationRecord {
    /// A freshly ingested conversation at version 1.
    pub fn new(
        user_id: impl Into<String>,
        utterances: Vec<Utterance>,
        now: jiff::Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            utterances,
            analysis_status: AnalysisStatus::Pending,
            analysis_version: 1,
            analysis: None,
            last_analyzed_version: None,
            status_changed_at: now,
            claimed_by: None,
            attempts: 0,
            failure: None,
            created_at: now,
        }
    }

    /// Append a new utterance. This is the ingestion-side contract: the
    /// version is bumped and the record goes back to `pending`, so any
    /// in-flight analysis of the previous version loses its commit.
    pub fn append_utterance(&mut self, utterance: Utterance, now: jiff::Timestamp) {
        self.utterances.push(utterance);
        self.analysis_version += 1;
        self.analysis_status = AnalysisStatus::Pending;
        self.status_changed_at = now;
        self.claimed_by = None;
        self.attempts = 0;
        self.failure = None;
    }

    /// Apply a conditional status transition. Returns `false` and leaves the
    /// record untouched when any precondition does not hold.
    pub fn apply_status_update(&mut self, version: u64, update: &StatusUpdate) -> bool {
        if self.analysis_version != version || self.analysis_status != update.expected {
            return false;
        }
        if let Some(since) = update.expected_since
            && self.status_changed_at != since
        {
            return false;
        }
        if let Some(claimant) = &update.expected_claimant
            && self.claimed_by.as_ref() != Some(claimant)
        {
            return false;
        }

        self.analysis_status = update.new;
        self.status_changed_at = update.at;
        self.claimed_by = update.claimed_by.clone();
        if let Some(failure) = &update.failure {
            if failure.kind.is_retryable() {
                self.attempts += 1;
            }
            self.failure = Some(failure.clone());
        }
        true
    }

    /// Store a finished analysis. Fails without touching the record if the
    /// utterances changed since the claim (`version` is stale) or `claim` no
    /// longer holds the record.
    pub fn apply_commit(
        &mut self,
        version: u64,
        claim: &ClaimTicket,
        result: AnalysisResult,
        new_status: AnalysisStatus,
    ) -> bool {
        if self.analysis_version != version || !claim.holds(self) {
            return false;
        }

        self.status_changed_at = result.completed_at;
        self.analysis = Some(result);
        self.last_analyzed_version = Some(version);
        self.analysis_status = new_status;
        self.claimed_by = None;
        self.attempts = 0;
        self.failure = None;
        true
    }

    /// Whether an `in_progress` claim is older than `stale_before`.
    pub fn is_stale_claim(&self, stale_before: jiff::Timestamp) -> bool {
        self.analysis_status == AnalysisStatus::InProgress && self.status_changed_at < stale_before
    }

    /// Whether the requeue sweep may move this `failed` record back to pending.
    pub fn is_retryable(&self, max_retries: u32) -> bool {
        self.analysis_status == AnalysisStatus::Failed
            && self.attempts < max_retries
            && self.failure.as_ref().is_some_and(|f| f.kind.is_retryable())
    }

    pub fn analysis_view(&self, max_retries: u32) -> AnalysisView<'_> {
        match (self.analysis_status, &self.analysis) {
            (AnalysisStatus::Done, Some(result))
                if self.last_analyzed_version == Some(self.analysis_version) =>
            {
                AnalysisView::Available(result)
            }
            (AnalysisStatus::Failed, _) if !self.is_retryable(max_retries) => {
                AnalysisView::Unavailable {
                    reason: self
                        .failure
                        .as_ref()
                        .map(|f| f.reason.clone())
                        .unwrap_or_else(|| "analysis failed".to_string()),
                }
            }
            _ => AnalysisView::Pending,
        }
    }

    /// Check the data-model invariants that must hold for any stored record.
    pub fn check_invariants(&self) -> Result<(), CoreError> {
        if self.analysis_status == AnalysisStatus::Done {
            let Some(result) = &self.analysis else {
                return Err(CoreError::Invariant(format!(
                    "conversation {} is done without an analysis",
                    self.id
                )));
            };
            if self.last_analyzed_version != Some(self.analysis_version) {
                return Err(CoreError::Invariant(format!(
                    "conversation {} is done but analysis is for version {:?}, current is {}",
                    self.id, self.last_analyzed_version, self.analysis_version
                )));
            }
            check_result_shape(result, self.utterances.len())?;
        }
        Ok(())
    }
}

/// Check that a result lines up with the utterances it was computed from.
pub fn check_result_shape(result: &AnalysisResult, utterance_count: usize) -> Result<(), CoreError> {
    if result.mood_by_utterance.len() != utterance_count {
        return Err(CoreError::Invariant(format!(
            "mood_by_utterance has {} entries for {utterance_count} utterances",
            result.mood_by_utterance.len()
        )));
    }
    if let Some(flag) = result
        .flags
        .iter()
        .find(|f| f.utterance_index >= utterance_count)
    {
        return Err(CoreError::Invariant(format!(
            "flag '{}' references utterance {} of {utterance_count}",
            flag.rule, flag.utterance_index
        )));
    }
    Ok(())
}
