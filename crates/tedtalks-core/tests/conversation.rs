use tedtalks_core::models::{
    AnalysisResult, AnalysisStatus, AnalysisView, ClaimTicket, ConversationRecord, FailureInfo,
    FailureKind, Flag, FlagKind, MoodOverall, Severity, Speaker, StatusUpdate, TopicLabel,
    Utterance, UtteranceMood,
};

fn ts(second: i64) -> jiff::Timestamp {
    jiff::Timestamp::from_second(1_760_000_000 + second).unwrap()
}

fn child(text: &str, second: i64) -> Utterance {
    Utterance {
        speaker: Speaker::Child,
        text: text.to_string(),
        timestamp: ts(second),
    }
}

fn result_for(utterances: usize, completed_at: jiff::Timestamp) -> AnalysisResult {
    AnalysisResult {
        keywords: vec![],
        mood_overall: MoodOverall::neutral(),
        mood_by_utterance: vec![UtteranceMood::neutral(); utterances],
        flags: vec![],
        topic: TopicLabel::General,
        summary: String::new(),
        scorer: "lexicon".to_string(),
        completed_at,
    }
}

#[test]
fn new_record_is_pending_at_version_one() {
    let record = ConversationRecord::new("kid-1", vec![child("hi", 0)], ts(0));
    assert_eq!(record.analysis_status, AnalysisStatus::Pending);
    assert_eq!(record.analysis_version, 1);
    assert!(record.analysis.is_none());
    assert_eq!(record.analysis_view(3), AnalysisView::Pending);
}

#[test]
fn claim_requires_matching_version_and_status() {
    let mut record = ConversationRecord::new("kid-1", vec![child("hi", 0)], ts(0));

    assert!(!record.apply_status_update(2, &StatusUpdate::claim("w1", ts(1))));
    assert!(record.apply_status_update(1, &StatusUpdate::claim("w1", ts(1))));
    assert_eq!(record.analysis_status, AnalysisStatus::InProgress);
    assert_eq!(record.claimed_by.as_deref(), Some("w1"));
    assert_eq!(record.status_changed_at, ts(1));

    // Second claim sees in_progress and loses.
    assert!(!record.apply_status_update(1, &StatusUpdate::claim("w2", ts(2))));
    assert_eq!(record.claimed_by.as_deref(), Some("w1"));
}

#[test]
fn reclaim_only_succeeds_against_the_observed_claim() {
    let mut record = ConversationRecord::new("kid-1", vec![child("hi", 0)], ts(0));
    assert!(record.apply_status_update(1, &StatusUpdate::claim("w1", ts(1))));

    assert!(!record.apply_status_update(1, &StatusUpdate::reclaim("w2", ts(0), ts(100))));
    assert!(record.apply_status_update(1, &StatusUpdate::reclaim("w2", ts(1), ts(100))));
    assert_eq!(record.claimed_by.as_deref(), Some("w2"));

    // The first reclaimer already moved status_changed_at.
    assert!(!record.apply_status_update(1, &StatusUpdate::reclaim("w3", ts(1), ts(101))));
}

#[test]
fn commit_is_rejected_for_a_stale_version() {
    let mut record = ConversationRecord::new("kid-1", vec![child("hi", 0)], ts(0));
    assert!(record.apply_status_update(1, &StatusUpdate::claim("w1", ts(1))));

    record.append_utterance(child("one more thing", 2), ts(2));
    assert_eq!(record.analysis_version, 2);
    assert_eq!(record.analysis_status, AnalysisStatus::Pending);

    let first = ClaimTicket::new("w1", ts(1));
    assert!(!record.apply_commit(1, &first, result_for(1, ts(3)), AnalysisStatus::Done));
    assert!(record.analysis.is_none());

    assert!(record.apply_status_update(2, &StatusUpdate::claim("w1", ts(4))));
    let second = ClaimTicket::new("w1", ts(4));
    assert!(record.apply_commit(2, &second, result_for(2, ts(5)), AnalysisStatus::Done));
    assert_eq!(record.last_analyzed_version, Some(2));
    assert_eq!(record.analysis_status, AnalysisStatus::Done);
    record.check_invariants().unwrap();
}

#[test]
fn commit_requires_an_active_claim() {
    let mut record = ConversationRecord::new("kid-1", vec![], ts(0));
    let never_claimed = ClaimTicket::new("w1", ts(0));
    assert!(!record.apply_commit(1, &never_claimed, result_for(0, ts(1)), AnalysisStatus::Done));
    assert_eq!(record.analysis_status, AnalysisStatus::Pending);
}

#[test]
fn superseded_claim_can_neither_fail_nor_commit() {
    let mut record = ConversationRecord::new("kid-1", vec![child("hi", 0)], ts(0));
    assert!(record.apply_status_update(1, &StatusUpdate::claim("w-a", ts(1))));
    let slow = ClaimTicket::new("w-a", ts(1));

    // w-a stalls past the stale window and w-b takes over.
    assert!(record.apply_status_update(1, &StatusUpdate::reclaim("w-b", ts(1), ts(400))));
    let fresh = ClaimTicket::new("w-b", ts(400));
    assert!(!slow.holds(&record));
    assert!(fresh.holds(&record));

    let failure = FailureInfo {
        kind: FailureKind::Transient,
        reason: "scorer timed out".to_string(),
        at: ts(401),
    };
    assert!(!record.apply_status_update(1, &StatusUpdate::fail(&slow, failure)));
    assert_eq!(record.analysis_status, AnalysisStatus::InProgress);
    assert_eq!(record.claimed_by.as_deref(), Some("w-b"));
    assert_eq!(record.attempts, 0);

    assert!(!record.apply_commit(1, &slow, result_for(1, ts(402)), AnalysisStatus::Done));
    assert!(record.analysis.is_none());

    assert!(record.apply_commit(1, &fresh, result_for(1, ts(403)), AnalysisStatus::Done));
    assert_eq!(record.analysis_status, AnalysisStatus::Done);
    record.check_invariants().unwrap();
}

#[test]
fn same_worker_reclaim_invalidates_its_older_ticket() {
    let mut record = ConversationRecord::new("kid-1", vec![child("hi", 0)], ts(0));
    assert!(record.apply_status_update(1, &StatusUpdate::claim("w1", ts(1))));
    assert!(record.apply_status_update(1, &StatusUpdate::reclaim("w1", ts(1), ts(400))));

    let older = ClaimTicket::new("w1", ts(1));
    assert!(!record.apply_commit(1, &older, result_for(1, ts(401)), AnalysisStatus::Done));
    assert!(record.apply_commit(
        1,
        &ClaimTicket::new("w1", ts(400)),
        result_for(1, ts(402)),
        AnalysisStatus::Done
    ));
}

#[test]
fn transient_failures_count_attempts_and_become_unavailable_when_exhausted() {
    let mut record = ConversationRecord::new("kid-1", vec![child("hi", 0)], ts(0));
    let max_retries = 2;

    for attempt in 1..=2 {
        let at = ts(attempt * 10);
        assert!(record.apply_status_update(1, &StatusUpdate::claim("w1", at)));
        let failure = FailureInfo {
            kind: FailureKind::Transient,
            reason: "scorer timed out".to_string(),
            at,
        };
        let claim = ClaimTicket::new("w1", at);
        assert!(record.apply_status_update(1, &StatusUpdate::fail(&claim, failure)));
        assert_eq!(record.attempts, attempt as u32);

        if record.is_retryable(max_retries) {
            assert_eq!(record.analysis_view(max_retries), AnalysisView::Pending);
            let since = record.status_changed_at;
            assert!(record.apply_status_update(1, &StatusUpdate::requeue(since, ts(attempt * 10 + 5))));
        }
    }

    assert_eq!(record.analysis_status, AnalysisStatus::Failed);
    assert!(!record.is_retryable(max_retries));
    assert_eq!(
        record.analysis_view(max_retries),
        AnalysisView::Unavailable {
            reason: "scorer timed out".to_string()
        }
    );
}

#[test]
fn malformed_failures_are_permanent() {
    let mut record = ConversationRecord::new("kid-1", vec![child("hi", 0)], ts(0));
    assert!(record.apply_status_update(1, &StatusUpdate::claim("w1", ts(1))));
    let failure = FailureInfo {
        kind: FailureKind::Malformed,
        reason: "utterance 0 contains a control character".to_string(),
        at: ts(2),
    };
    let claim = ClaimTicket::new("w1", ts(1));
    assert!(record.apply_status_update(1, &StatusUpdate::fail(&claim, failure)));

    assert_eq!(record.attempts, 0);
    assert!(!record.is_retryable(5));
    assert!(matches!(
        record.analysis_view(5),
        AnalysisView::Unavailable { .. }
    ));
}

#[test]
fn invariant_failures_are_permanent() {
    assert!(FailureKind::Transient.is_retryable());
    assert!(!FailureKind::Invariant.is_retryable());

    let mut record = ConversationRecord::new("kid-1", vec![child("hi", 0)], ts(0));
    assert!(record.apply_status_update(1, &StatusUpdate::claim("w1", ts(1))));
    let failure = FailureInfo {
        kind: FailureKind::Invariant,
        reason: "mood_by_utterance has 0 entries for 1 utterances".to_string(),
        at: ts(2),
    };
    let claim = ClaimTicket::new("w1", ts(1));
    assert!(record.apply_status_update(1, &StatusUpdate::fail(&claim, failure)));

    assert_eq!(record.attempts, 0);
    assert!(!record.is_retryable(5));
    assert_eq!(
        record.analysis_view(5),
        AnalysisView::Unavailable {
            reason: "mood_by_utterance has 0 entries for 1 utterances".to_string()
        }
    );
}

#[test]
fn invariants_catch_out_of_range_flags() {
    let mut record = ConversationRecord::new("kid-1", vec![child("hi", 0)], ts(0));
    assert!(record.apply_status_update(1, &StatusUpdate::claim("w1", ts(1))));

    let mut result = result_for(1, ts(2));
    result.flags.push(Flag {
        kind: FlagKind::Safety,
        rule: "self_harm".to_string(),
        reason: "test".to_string(),
        excerpt: "hi".to_string(),
        utterance_index: 1,
        severity: Severity::Critical,
    });
    assert!(record.apply_commit(1, &ClaimTicket::new("w1", ts(1)), result, AnalysisStatus::Done));

    assert!(record.check_invariants().is_err());
}

#[test]
fn record_json_uses_snake_case_status() {
    let record = ConversationRecord::new("kid-1", vec![child("hi", 0)], ts(0));
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["analysis_status"], "pending");
    assert_eq!(json["utterances"][0]["speaker"], "child");

    let back: ConversationRecord = serde_json::from_value(json).unwrap();
    assert_eq!(back, record);
}
