use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tedtalks_core::models::{AnalysisResult, Utterance, check_result_shape};
use tracing::debug;

use crate::error::AnalysisError;
use crate::keywords::{KeywordConfig, KeywordExtractor};
use crate::mood::{ClassifierConfig, MoodClassifier, MoodScorer};
use crate::normalize::Normalizer;
use crate::safety::{SafetyConfig, SafetyEngine};
use crate::topic;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub keywords: KeywordConfig,
    pub classifier: ClassifierConfig,
    pub safety: SafetyConfig,
}

/// All analysis stages for one conversation version.
///
/// `analyze` is a pure function of the utterances, `completed_at` and the
/// scorer's answers, so re-running it on unchanged input gives an identical
/// result.
pub struct AnalysisPipeline {
    normalizer: Normalizer,
    keywords: KeywordExtractor,
    classifier: MoodClassifier,
    safety: SafetyEngine,
}

impl AnalysisPipeline {
    pub fn new(
        scorer: Arc<dyn MoodScorer>,
        scorer_name: impl Into<String>,
        config: &PipelineConfig,
    ) -> Result<Self, AnalysisError> {
        Ok(Self {
            normalizer: Normalizer::new(),
            keywords: KeywordExtractor::new(config.keywords),
            classifier: MoodClassifier::new(scorer, scorer_name, config.classifier),
            safety: SafetyEngine::with_builtin_rules(&config.safety)?,
        })
    }

    /// Replace the safety engine, e.g. with a custom rule set.
    pub fn with_safety_engine(mut self, safety: SafetyEngine) -> Self {
        self.safety = safety;
        self
    }

    pub fn scorer_name(&self) -> &str {
        self.classifier.scorer_name()
    }

    pub async fn analyze(
        &self,
        utterances: &[Utterance],
        completed_at: jiff::Timestamp,
    ) -> Result<AnalysisResult, AnalysisError> {
        let normalized = self.normalizer.normalize_all(utterances)?;

        let (keywords, mood) = tokio::join!(
            async { self.keywords.extract(&normalized) },
            self.classifier.classify(&normalized),
        );
        let mood = mood?;
        debug!(
            keywords = keywords.len(),
            mood = %mood.overall.label,
            "keywords and mood ready"
        );

        let flags = self.safety.evaluate(&normalized, &mood.by_utterance)?;

        let result = AnalysisResult {
            keywords,
            mood_overall: mood.overall,
            mood_by_utterance: mood.by_utterance,
            flags,
            topic: topic::infer_topic(&normalized),
            summary: topic::summarize(&normalized),
            scorer: self.classifier.scorer_name().to_string(),
            completed_at,
        };

        check_result_shape(&result, utterances.len())
            .map_err(|e| AnalysisError::Invariant(e.to_string()))?;
        Ok(result)
    }
}
