use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tedtalks_analysis::PipelineConfig;
use tedtalks_analysis::keywords::KeywordConfig;
use tedtalks_analysis::mood::ClassifierConfig;
use tedtalks_analysis::safety::SafetyConfig;
use tracing::info;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

/// Current config version. Bump this when the shape changes incompatibly.
const CURRENT_VERSION: u32 = 1;

/// Path of an optional JSON config file.
pub const CONFIG_PATH_ENV: &str = "TEDTALKS_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub config_version: u32,
    pub bucket: String,
    pub region: String,
    /// Identifies this process in claims. Generated when empty.
    pub worker_id: String,
    /// Pending conversations pulled per cycle.
    pub batch_size: usize,
    /// Conversations analyzed at once by this worker.
    pub concurrency: usize,
    pub poll_interval_ms: u64,
    /// An `in_progress` claim older than this is considered abandoned.
    pub stale_after_secs: u64,
    /// Conversation-level attempts before a transient failure is final.
    pub max_retries: u32,
    /// Base of the exponential delay before a failed conversation is requeued.
    pub requeue_base_delay_secs: u64,
    pub retry: RetryPolicy,
    pub keywords: KeywordConfig,
    pub classifier: ClassifierConfig,
    pub safety: SafetyConfig,
    pub scorer: ScorerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    pub backend: ScorerBackend,
    /// Bedrock model or inference profile id, for the `bedrock` backend.
    pub model_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerBackend {
    #[default]
    Lexicon,
    Bedrock,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            backend: ScorerBackend::Lexicon,
            model_id: String::new(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            config_version: CURRENT_VERSION,
            bucket: "tedtalks".to_string(),
            region: "us-east-1".to_string(),
            worker_id: String::new(),
            batch_size: 200,
            concurrency: 8,
            poll_interval_ms: 2_000,
            stale_after_secs: 300,
            max_retries: 3,
            requeue_base_delay_secs: 30,
            retry: RetryPolicy::default(),
            keywords: KeywordConfig::default(),
            classifier: ClassifierConfig::default(),
            safety: SafetyConfig::default(),
            scorer: ScorerConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Defaults, then the file named by `TEDTALKS_CONFIG` if set, then
    /// environment overrides. The result is validated.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.finish()
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&contents)?;
        info!(path = %path.display(), "loaded worker config");
        Ok(config)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        // Check the version before the shape, so a newer file gets a clear error.
        let json: serde_json::Value = serde_json::from_str(contents)?;
        let version = json
            .get("config_version")
            .and_then(|v| v.as_u64())
            .unwrap_or(u64::from(CURRENT_VERSION));
        if version > u64::from(CURRENT_VERSION) {
            return Err(ConfigError::UnsupportedVersion(
                u32::try_from(version).unwrap_or(u32::MAX),
            ));
        }
        Ok(serde_json::from_value(json)?)
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// Setting `BEDROCK_MODEL_ID` also switches the scorer to Bedrock.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(bucket) = lookup("TEDTALKS_BUCKET") {
            self.bucket = bucket;
        }
        if let Some(region) = lookup("AWS_REGION") {
            self.region = region;
        }
        if let Some(worker_id) = lookup("TEDTALKS_WORKER_ID") {
            self.worker_id = worker_id;
        }
        if let Some(v) = lookup("BATCH_LIMIT") {
            self.batch_size = parse_env("BATCH_LIMIT", v)?;
        }
        if let Some(v) = lookup("POLL_INTERVAL_MS") {
            self.poll_interval_ms = parse_env("POLL_INTERVAL_MS", v)?;
        }
        if let Some(v) = lookup("STALE_AFTER_SECS") {
            self.stale_after_secs = parse_env("STALE_AFTER_SECS", v)?;
        }
        if let Some(v) = lookup("MAX_RETRIES") {
            self.max_retries = parse_env("MAX_RETRIES", v)?;
        }
        if let Some(v) = lookup("SCORING_TIMEOUT_MS") {
            self.classifier.scoring_timeout_ms = parse_env("SCORING_TIMEOUT_MS", v)?;
        }
        if let Some(model_id) = lookup("BEDROCK_MODEL_ID")
            && !model_id.trim().is_empty()
        {
            self.scorer.backend = ScorerBackend::Bedrock;
            self.scorer.model_id = model_id;
        }
        Ok(())
    }

    /// Fill generated fields and validate.
    pub fn finish(mut self) -> Result<Self, ConfigError> {
        if self.worker_id.trim().is_empty() {
            self.worker_id = format!("worker-{}", uuid::Uuid::new_v4());
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.bucket.trim().is_empty() {
            return invalid("bucket must not be empty");
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be at least 1");
        }
        if self.concurrency == 0 {
            return invalid("concurrency must be at least 1");
        }
        if self.stale_after_secs == 0 {
            return invalid("stale_after_secs must be at least 1");
        }
        if self.max_retries == 0 {
            return invalid("max_retries must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1");
        }
        if self.keywords.max_phrase_words == 0 {
            return invalid("keywords.max_phrase_words must be at least 1");
        }
        if self.classifier.max_in_flight == 0 {
            return invalid("classifier.max_in_flight must be at least 1");
        }
        if self.classifier.scoring_timeout_ms == 0 {
            return invalid("classifier.scoring_timeout_ms must be at least 1");
        }
        if !(self.classifier.recency_decay > 0.0 && self.classifier.recency_decay <= 1.0) {
            return invalid("classifier.recency_decay must be in (0, 1]");
        }
        if self.safety.window == 0 {
            return invalid("safety.window must be at least 1");
        }
        if let Some((label, _)) = self
            .safety
            .thresholds
            .iter()
            .find(|(_, t)| !(0.0..=1.0).contains(*t))
        {
            return Err(ConfigError::Invalid(format!(
                "safety threshold for {label} must be in [0, 1]"
            )));
        }
        if self.scorer.backend == ScorerBackend::Bedrock && self.scorer.model_id.trim().is_empty() {
            return invalid("scorer.model_id is required for the bedrock backend");
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            keywords: self.keywords,
            classifier: self.classifier,
            safety: self.safety.clone(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn requeue_base_delay(&self) -> Duration {
        Duration::from_secs(self.requeue_base_delay_secs)
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}
