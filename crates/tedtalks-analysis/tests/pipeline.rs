use std::sync::Arc;

use tedtalks_analysis::{
    AnalysisError, AnalysisPipeline, LexiconScorer, PipelineConfig, ScoreError,
};
use tedtalks_core::models::{
    FailureKind, FlagKind, MoodLabel, Severity, Speaker, TopicLabel, Utterance,
};

fn ts(second: i64) -> jiff::Timestamp {
    jiff::Timestamp::from_second(1_760_000_000 + second).unwrap()
}

fn child(text: &str) -> Utterance {
    Utterance {
        speaker: Speaker::Child,
        text: text.to_string(),
        timestamp: ts(0),
    }
}

fn assistant(text: &str) -> Utterance {
    Utterance {
        speaker: Speaker::Assistant,
        text: text.to_string(),
        timestamp: ts(0),
    }
}

fn pipeline() -> AnalysisPipeline {
    AnalysisPipeline::new(
        Arc::new(LexiconScorer::new()),
        LexiconScorer::NAME,
        &PipelineConfig::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn happy_day_with_friends() {
    let utterances = vec![child("I had a great day!"), child("played with friends")];
    let result = pipeline().analyze(&utterances, ts(10)).await.unwrap();

    let terms: Vec<&str> = result.keywords.iter().map(|k| k.term.as_str()).collect();
    assert!(terms.contains(&"great day") || terms.contains(&"friends"));
    assert_eq!(result.mood_overall.label, MoodLabel::Happy);
    assert!(result.mood_overall.score(MoodLabel::Happy) > 0.7);
    assert_eq!(result.mood_overall.emoji, "😄");
    assert!(result.flags.is_empty());
    assert_eq!(result.topic, TopicLabel::Friends);
    assert_eq!(result.summary, "I had a great day! played with friends");
    assert_eq!(result.scorer, "lexicon");
    assert_eq!(result.completed_at, ts(10));
}

#[tokio::test]
async fn self_harm_statement_is_flagged_critical() {
    let result = pipeline()
        .analyze(&[child("I want to kill myself")], ts(10))
        .await
        .unwrap();

    assert_eq!(result.flags.len(), 1);
    assert_eq!(result.flags[0].kind, FlagKind::Safety);
    assert_eq!(result.flags[0].severity, Severity::Critical);
    assert_eq!(result.flags[0].utterance_index, 0);
    assert_eq!(result.max_severity(), Some(Severity::Critical));
}

#[tokio::test]
async fn empty_conversation_is_neutral_and_unflagged() {
    let result = pipeline().analyze(&[], ts(10)).await.unwrap();

    assert!(result.keywords.is_empty());
    assert!(result.mood_by_utterance.is_empty());
    assert_eq!(result.mood_overall.label, MoodLabel::Neutral);
    assert_eq!(result.mood_overall.score(MoodLabel::Neutral), 1.0);
    assert!(result.flags.is_empty());
    assert_eq!(result.topic, TopicLabel::General);
    assert_eq!(result.summary, "");
}

#[tokio::test]
async fn moods_line_up_with_utterances() {
    let utterances = vec![
        assistant("How was school today?"),
        child(""),
        child("my teacher gave me a sticker"),
        assistant("That's wonderful!"),
    ];
    let result = pipeline().analyze(&utterances, ts(10)).await.unwrap();

    assert_eq!(result.mood_by_utterance.len(), utterances.len());
    assert_eq!(result.mood_by_utterance[1].label, MoodLabel::Neutral);
    assert_eq!(result.mood_by_utterance[1].score, 0.0);
    assert_eq!(result.topic, TopicLabel::School);
    assert!(result.flags.iter().all(|f| f.utterance_index < utterances.len()));
}

#[tokio::test]
async fn reanalysis_is_identical() {
    let utterances = vec![
        child("I'm scared of the dark"),
        assistant("Lots of people are. What helps?"),
        child("my teddy bear and a story"),
    ];
    let pipeline = pipeline();
    let first = pipeline.analyze(&utterances, ts(10)).await.unwrap();
    let second = pipeline.analyze(&utterances, ts(10)).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn malformed_utterance_fails_the_conversation() {
    let err = pipeline()
        .analyze(&[child("ok"), child("bro\u{0000}ken")], ts(10))
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Malformed { index: 1, .. }));
    assert!(!err.is_transient());
}

#[test]
fn failure_kinds_separate_retryable_from_permanent() {
    let unavailable = AnalysisError::from(ScoreError::Unavailable("throttled".to_string()));
    assert_eq!(unavailable.failure_kind(), FailureKind::Transient);
    assert!(unavailable.failure_kind().is_retryable());

    let rejected = AnalysisError::from(ScoreError::Rejected("access denied".to_string()));
    assert!(!rejected.is_transient());
    assert_eq!(rejected.failure_kind(), FailureKind::Rejected);
    assert!(!rejected.failure_kind().is_retryable());

    let broken = AnalysisError::Invariant("2 moods for 3 utterances".to_string());
    assert_eq!(broken.failure_kind(), FailureKind::Invariant);
    assert!(!broken.failure_kind().is_retryable());
}
