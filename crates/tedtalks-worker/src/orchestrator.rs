//! Polls the store for work and drives each conversation through
//! `pending → in_progress → done | failed`.
//!
//! A cycle runs three passes in order: reclaim abandoned `in_progress`
//! claims, requeue retryable `failed` conversations whose backoff has
//! elapsed, then claim a batch of `pending` conversations. Claimed
//! conversations are analyzed concurrently, bounded by `concurrency`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use tedtalks_analysis::{AnalysisError, AnalysisPipeline};
use tedtalks_core::models::{
    AnalysisStatus, ClaimTicket, ConversationRecord, FailureInfo, FailureKind, StatusUpdate,
};
use tedtalks_storage::ConversationStore;
use tedtalks_storage::error::StorageError;

use crate::audit::AnalysisEvent;
use crate::clock::{self, Clock};
use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::retry::{RetryPolicy, backoff};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub worker_id: String,
    pub batch_size: usize,
    pub concurrency: usize,
    pub poll_interval: Duration,
    pub stale_after: Duration,
    pub max_retries: u32,
    pub requeue_base_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_id: "worker-local".to_string(),
            batch_size: 200,
            concurrency: 8,
            poll_interval: Duration::from_secs(2),
            stale_after: Duration::from_secs(300),
            max_retries: 3,
            requeue_base_delay: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&WorkerConfig> for OrchestratorConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            worker_id: config.worker_id.clone(),
            batch_size: config.batch_size,
            concurrency: config.concurrency,
            poll_interval: config.poll_interval(),
            stale_after: config.stale_after(),
            max_retries: config.max_retries,
            requeue_base_delay: config.requeue_base_delay(),
            retry: config.retry,
        }
    }
}

/// Counts from one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Claims won, fresh or reclaimed.
    pub claimed: usize,
    /// Abandoned claims taken over.
    pub reclaimed: usize,
    /// Failed conversations moved back to pending.
    pub requeued: usize,
    pub completed: usize,
    pub failed: usize,
    /// Commits rejected because the conversation changed or was reclaimed
    /// during analysis.
    pub raced: usize,
    /// Claims another worker won first.
    pub lost_claims: usize,
    /// Claimed but left `in_progress` because the store kept failing; the
    /// stale sweep picks these up later.
    pub abandoned: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Completed => self.completed += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Raced => self.raced += 1,
            Outcome::LostClaim => self.lost_claims += 1,
            Outcome::Abandoned => self.abandoned += 1,
            Outcome::Skipped => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    Fresh,
    /// Take over a claim last touched at `observed_since`.
    Reclaim {
        observed_since: jiff::Timestamp,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Failed,
    Raced,
    LostClaim,
    Abandoned,
    /// The claim itself could not be attempted.
    Skipped,
}

#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn ConversationStore>,
    pipeline: Arc<AnalysisPipeline>,
    clock: Arc<dyn Clock>,
    config: Arc<OrchestratorConfig>,
    permits: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        pipeline: Arc<AnalysisPipeline>,
        clock: Arc<dyn Clock>,
        config: OrchestratorConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.concurrency.max(1)));
        Self {
            store,
            pipeline,
            clock,
            config: Arc::new(config),
            permits,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.config.worker_id
    }

    /// Poll until `shutdown` turns true. A cycle that claimed work is
    /// followed immediately by another; an idle or failed one waits
    /// `poll_interval`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), WorkerError> {
        info!(worker_id = %self.config.worker_id, "analysis worker started");
        while !*shutdown.borrow() {
            let busy = match self.run_cycle().await {
                Ok(report) => {
                    if report.claimed > 0 || report.requeued > 0 {
                        info!(worker_id = %self.config.worker_id, ?report, "cycle complete");
                    }
                    report.claimed > 0
                }
                Err(e) => {
                    warn!(worker_id = %self.config.worker_id, error = %e, "cycle failed");
                    false
                }
            };
            if busy {
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = shutdown.changed() => {}
            }
        }
        info!(worker_id = %self.config.worker_id, "analysis worker stopped");
        Ok(())
    }

    /// One pass: stale reclaim, requeue sweep, pending batch.
    pub async fn run_cycle(&self) -> Result<CycleReport, WorkerError> {
        let mut report = CycleReport::default();
        let now = self.clock.now();

        let mut work: Vec<(ConversationRecord, Claim)> = Vec::new();

        let stale_before = clock::before(now, self.config.stale_after);
        for record in self.find(AnalysisStatus::InProgress).await? {
            if record.is_stale_claim(stale_before) {
                debug!(
                    conversation_id = %record.id,
                    claimed_by = record.claimed_by.as_deref().unwrap_or(""),
                    "stale claim found"
                );
                let observed_since = record.status_changed_at;
                work.push((record, Claim::Reclaim { observed_since }));
            }
        }

        report.requeued = self.requeue_due(now).await?;

        for record in self.find(AnalysisStatus::Pending).await? {
            work.push((record, Claim::Fresh));
        }

        let mut tasks = JoinSet::new();
        for (record, claim) in work {
            let this = self.clone();
            tasks.spawn(async move {
                let Ok(_permit) = this.permits.clone().acquire_owned().await else {
                    return (claim, Outcome::Skipped, false);
                };
                let (outcome, claimed) = this.process(record, claim).await;
                (claim, outcome, claimed)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((claim, outcome, claimed)) => {
                    if claimed {
                        report.claimed += 1;
                        if matches!(claim, Claim::Reclaim { .. }) {
                            report.reclaimed += 1;
                        }
                    }
                    report.record(outcome);
                }
                Err(e) => {
                    error!(worker_id = %self.config.worker_id, error = %e, "analysis task panicked");
                    report.abandoned += 1;
                }
            }
        }

        Ok(report)
    }

    async fn find(&self, status: AnalysisStatus) -> Result<Vec<ConversationRecord>, StorageError> {
        self.config
            .retry
            .run("find", StorageError::is_transient, || {
                self.store.find(status, self.config.batch_size)
            })
            .await
    }

    /// Move retryable failures back to pending once their backoff elapsed.
    async fn requeue_due(&self, now: jiff::Timestamp) -> Result<usize, StorageError> {
        let retryable = self
            .config
            .retry
            .run("find_retryable", StorageError::is_transient, || {
                self.store
                    .find_retryable(self.config.max_retries, self.config.batch_size)
            })
            .await?;

        let mut requeued = 0;
        for record in retryable {
            let delay = backoff(self.config.requeue_base_delay, record.attempts);
            if record.status_changed_at > clock::before(now, delay) {
                continue;
            }

            let update = StatusUpdate::requeue(record.status_changed_at, now);
            let applied = self
                .config
                .retry
                .run("requeue", StorageError::is_transient, || {
                    self.store
                        .compare_and_set_status(record.id, record.analysis_version, update.clone())
                })
                .await;
            match applied {
                Ok(true) => {
                    requeued += 1;
                    AnalysisEvent::new(
                        "requeued",
                        record.id,
                        record.analysis_version,
                        &self.config.worker_id,
                    )
                    .with_details(json!({ "attempts": record.attempts }))
                    .emit();
                }
                Ok(false) => {
                    debug!(conversation_id = %record.id, "requeue lost to a concurrent update")
                }
                Err(e) => {
                    warn!(conversation_id = %record.id, error = %e, "requeue failed, will retry next cycle")
                }
            }
        }
        Ok(requeued)
    }

    /// Claim, analyze and commit one conversation. Returns the outcome and
    /// whether the claim was won.
    async fn process(&self, record: ConversationRecord, claim: Claim) -> (Outcome, bool) {
        let worker_id = self.config.worker_id.as_str();
        let id = record.id;
        let version = record.analysis_version;
        let claimed_at = self.clock.now();

        let update = match claim {
            Claim::Fresh => StatusUpdate::claim(worker_id, claimed_at),
            Claim::Reclaim { observed_since } => {
                StatusUpdate::reclaim(worker_id, observed_since, claimed_at)
            }
        };
        let won = self
            .config
            .retry
            .run("claim", StorageError::is_transient, || {
                self.store.compare_and_set_status(id, version, update.clone())
            })
            .await;
        match won {
            Ok(true) => {}
            Ok(false) => {
                debug!(conversation_id = %id, version, worker_id, "claim lost");
                return (Outcome::LostClaim, false);
            }
            Err(e) => {
                warn!(conversation_id = %id, version, worker_id, error = %e, "claim failed");
                return (Outcome::Skipped, false);
            }
        }

        let action = match claim {
            Claim::Fresh => "claimed",
            Claim::Reclaim { .. } => "reclaimed",
        };
        let mut event = AnalysisEvent::new(action, id, version, worker_id);
        if let (Claim::Reclaim { .. }, Some(previous)) = (claim, &record.claimed_by) {
            event = event.with_details(json!({ "previous_worker": previous }));
        }
        event.emit();
        let ticket = ClaimTicket::new(worker_id, claimed_at);

        let analyzed = self
            .config
            .retry
            .run("analyze", AnalysisError::is_transient, || {
                self.pipeline.analyze(&record.utterances, self.clock.now())
            })
            .await;

        let outcome = match analyzed {
            Ok(result) => {
                let flags = result.flags.len();
                let max_severity = result.max_severity();
                let committed = self
                    .config
                    .retry
                    .run("commit", StorageError::is_transient, || {
                        self.store.commit_analysis(
                            id,
                            version,
                            ticket.clone(),
                            result.clone(),
                            AnalysisStatus::Done,
                        )
                    })
                    .await;
                match committed {
                    Ok(true) => {
                        AnalysisEvent::new("completed", id, version, worker_id)
                            .with_details(json!({
                                "flags": flags,
                                "max_severity": max_severity,
                                "mood": result.mood_overall.label,
                            }))
                            .emit();
                        Outcome::Completed
                    }
                    Ok(false) => {
                        self.commit_race(id, version);
                        Outcome::Raced
                    }
                    Err(e) => {
                        let failure = FailureInfo {
                            kind: FailureKind::Transient,
                            reason: format!("commit failed: {e}"),
                            at: self.clock.now(),
                        };
                        self.mark_failed(id, version, &ticket, failure).await
                    }
                }
            }
            Err(e) => {
                let failure = FailureInfo {
                    kind: e.failure_kind(),
                    reason: e.to_string(),
                    at: self.clock.now(),
                };
                if failure.kind == FailureKind::Invariant {
                    error!(
                        conversation_id = %id,
                        version,
                        worker_id,
                        utterances = record.utterances.len(),
                        error = %e,
                        "analysis broke an invariant"
                    );
                }
                self.mark_failed(id, version, &ticket, failure).await
            }
        };
        (outcome, true)
    }

    async fn mark_failed(
        &self,
        id: uuid::Uuid,
        version: u64,
        ticket: &ClaimTicket,
        failure: FailureInfo,
    ) -> Outcome {
        let worker_id = self.config.worker_id.as_str();
        let kind = failure.kind;
        let reason = failure.reason.clone();
        let update = StatusUpdate::fail(ticket, failure);

        let applied = self
            .config
            .retry
            .run("mark_failed", StorageError::is_transient, || {
                self.store.compare_and_set_status(id, version, update.clone())
            })
            .await;
        match applied {
            Ok(true) => {
                AnalysisEvent::new("failed", id, version, worker_id)
                    .with_details(json!({ "kind": kind, "reason": reason }))
                    .emit();
                Outcome::Failed
            }
            Ok(false) => {
                self.commit_race(id, version);
                Outcome::Raced
            }
            Err(e) => {
                error!(
                    conversation_id = %id,
                    version,
                    worker_id,
                    error = %e,
                    reason = %reason,
                    "could not record failure, leaving claim for stale reclaim"
                );
                Outcome::Abandoned
            }
        }
    }

    fn commit_race(&self, id: uuid::Uuid, version: u64) {
        AnalysisEvent::new("superseded", id, version, &self.config.worker_id).emit();
        debug!(
            conversation_id = %id,
            version,
            "conversation changed or was reclaimed during analysis"
        );
    }
}
