use aws_sdk_bedrockruntime::operation::converse::ConverseError;
use aws_sdk_bedrockruntime::types::error::{
    AccessDeniedException, ThrottlingException, ValidationException,
};
use tedtalks_analysis::ScoreError;
use tedtalks_bedrock::converse::classify_service_error;
use tedtalks_bedrock::error::BedrockError;
use tedtalks_bedrock::mood::parse_mood_response;
use tedtalks_core::models::MoodLabel;

#[test]
fn parses_plain_json() {
    let mood = parse_mood_response(r#"{"label": "sad", "score": 0.82}"#).unwrap();
    assert_eq!(mood.label, MoodLabel::Sad);
    assert!((mood.score - 0.82).abs() < 1e-9);
}

#[test]
fn tolerates_code_fences_and_case() {
    let reply = "```json\n{\"label\": \"Excited\", \"score\": 0.9}\n```";
    let mood = parse_mood_response(reply).unwrap();
    assert_eq!(mood.label, MoodLabel::Excited);
}

#[test]
fn unknown_label_falls_back_to_neutral_and_score_is_clamped() {
    let mood = parse_mood_response(r#"{"label": "bored", "score": 1.7}"#).unwrap();
    assert_eq!(mood.label, MoodLabel::Neutral);
    assert_eq!(mood.score, 1.0);
}

#[test]
fn non_json_reply_is_an_invalid_response() {
    let err = parse_mood_response("I think the child is happy.").unwrap_err();
    assert!(matches!(err, BedrockError::ResponseParse(_)));
    assert!(matches!(
        ScoreError::from(err),
        ScoreError::InvalidResponse(_)
    ));
}

#[test]
fn missing_fields_are_a_schema_violation() {
    let err = parse_mood_response(r#"{"mood": "happy"}"#).unwrap_err();
    assert!(matches!(err, BedrockError::SchemaViolation(_)));
}

#[test]
fn invocation_failures_are_transient() {
    let err = ScoreError::from(BedrockError::Invocation("throttled".to_string()));
    assert!(err.is_transient());
}

#[test]
fn throttling_is_transient() {
    let err = classify_service_error(ConverseError::ThrottlingException(
        ThrottlingException::builder().message("slow down").build(),
    ));
    assert!(matches!(err, BedrockError::Invocation(_)));
    assert!(ScoreError::from(err).is_transient());
}

#[test]
fn rejected_requests_are_not_retried() {
    for err in [
        ConverseError::ValidationException(
            ValidationException::builder()
                .message("model identifier is invalid")
                .build(),
        ),
        ConverseError::AccessDeniedException(
            AccessDeniedException::builder()
                .message("no access to model")
                .build(),
        ),
    ] {
        let err = classify_service_error(err);
        assert!(matches!(err, BedrockError::Rejected(_)), "{err}");
        let score = ScoreError::from(err);
        assert!(matches!(score, ScoreError::Rejected(_)));
        assert!(!score.is_transient());
    }
}
