use std::collections::HashMap;
use std::time::Duration;

use tedtalks_core::models::MoodLabel;
use tedtalks_worker::config::{ScorerBackend, WorkerConfig};
use tedtalks_worker::error::ConfigError;
use tedtalks_worker::orchestrator::OrchestratorConfig;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

#[test]
fn defaults_are_valid_and_get_a_worker_id() {
    let config = WorkerConfig::default().finish().unwrap();
    assert!(config.worker_id.starts_with("worker-"));
    assert_eq!(config.batch_size, 200);
    assert_eq!(config.scorer.backend, ScorerBackend::Lexicon);
    assert_eq!(config.poll_interval(), Duration::from_secs(2));
    assert_eq!(config.stale_after(), Duration::from_secs(300));
}

#[test]
fn generated_worker_ids_differ() {
    let a = WorkerConfig::default().finish().unwrap();
    let b = WorkerConfig::default().finish().unwrap();
    assert_ne!(a.worker_id, b.worker_id);
}

#[test]
fn environment_overrides_apply() {
    let mut config = WorkerConfig::default();
    config
        .apply_env(env(&[
            ("TEDTALKS_BUCKET", "kids-prod"),
            ("AWS_REGION", "eu-west-1"),
            ("TEDTALKS_WORKER_ID", "w-7"),
            ("BATCH_LIMIT", " 25 "),
            ("POLL_INTERVAL_MS", "200"),
            ("STALE_AFTER_SECS", "90"),
            ("MAX_RETRIES", "5"),
            ("SCORING_TIMEOUT_MS", "750"),
        ]))
        .unwrap();
    let config = config.finish().unwrap();

    assert_eq!(config.bucket, "kids-prod");
    assert_eq!(config.region, "eu-west-1");
    assert_eq!(config.worker_id, "w-7");
    assert_eq!(config.batch_size, 25);
    assert_eq!(config.poll_interval(), Duration::from_millis(200));
    assert_eq!(config.stale_after_secs, 90);
    assert_eq!(config.max_retries, 5);
    assert_eq!(config.classifier.scoring_timeout_ms, 750);
}

#[test]
fn bedrock_model_id_switches_the_scorer() {
    let mut config = WorkerConfig::default();
    config
        .apply_env(env(&[("BEDROCK_MODEL_ID", "anthropic.claude-haiku")]))
        .unwrap();
    assert_eq!(config.scorer.backend, ScorerBackend::Bedrock);
    assert_eq!(config.scorer.model_id, "anthropic.claude-haiku");
    config.finish().unwrap();
}

#[test]
fn blank_bedrock_model_id_is_ignored() {
    let mut config = WorkerConfig::default();
    config.apply_env(env(&[("BEDROCK_MODEL_ID", "  ")])).unwrap();
    assert_eq!(config.scorer.backend, ScorerBackend::Lexicon);
}

#[test]
fn unparsable_environment_value_is_rejected() {
    let mut config = WorkerConfig::default();
    let err = config
        .apply_env(env(&[("BATCH_LIMIT", "lots")]))
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidEnv { name: "BATCH_LIMIT", ref value } if value == "lots"
    ));
}

#[test]
fn bedrock_backend_requires_a_model() {
    let json = r#"{ "scorer": { "backend": "bedrock" } }"#;
    let err = WorkerConfig::from_json(json).unwrap().finish().unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("model_id")));
}

#[test]
fn zero_sized_settings_are_rejected() {
    for json in [
        r#"{ "batch_size": 0 }"#,
        r#"{ "concurrency": 0 }"#,
        r#"{ "max_retries": 0 }"#,
        r#"{ "safety": { "window": 0 } }"#,
        r#"{ "classifier": { "recency_decay": 0.0 } }"#,
        r#"{ "safety": { "thresholds": { "sad": 1.5 } } }"#,
    ] {
        let err = WorkerConfig::from_json(json).unwrap().finish().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{json} should be invalid");
    }
}

#[test]
fn newer_config_version_is_rejected() {
    let err = WorkerConfig::from_json(r#"{ "config_version": 2, "bucket": "x" }"#).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedVersion(2)));
}

#[test]
fn partial_file_keeps_defaults_for_missing_fields() {
    let json = r#"{
        "bucket": "kids-staging",
        "classifier": { "scoring_timeout_ms": 1500 },
        "safety": { "thresholds": { "sad": 0.5 } }
    }"#;
    let config = WorkerConfig::from_json(json).unwrap();

    assert_eq!(config.bucket, "kids-staging");
    assert_eq!(config.config_version, 1);
    assert_eq!(config.classifier.scoring_timeout_ms, 1500);
    assert_eq!(config.classifier.max_in_flight, 4);
    assert_eq!(config.safety.window, 3);
    // A thresholds map replaces the default one wholesale.
    assert_eq!(config.safety.thresholds.len(), 1);
    assert_eq!(config.safety.thresholds[&MoodLabel::Sad], 0.5);
    assert_eq!(config.keywords.max_keywords, 10);
}

#[test]
fn malformed_json_is_a_parse_error() {
    let err = WorkerConfig::from_json("{ bucket: ").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn missing_file_is_a_read_error() {
    let err = WorkerConfig::from_file(std::path::Path::new("/nonexistent/tedtalks.json"))
        .unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn orchestrator_settings_follow_the_worker_config() {
    let mut config = WorkerConfig::default();
    config.worker_id = "w-9".to_string();
    config.requeue_base_delay_secs = 45;
    let orchestrator = OrchestratorConfig::from(&config);

    assert_eq!(orchestrator.worker_id, "w-9");
    assert_eq!(orchestrator.requeue_base_delay, Duration::from_secs(45));
    assert_eq!(orchestrator.batch_size, config.batch_size);
    assert_eq!(orchestrator.retry, config.retry);
}
