//! Mood scoring with a Claude model on Bedrock.

use aws_sdk_bedrockruntime::Client;
use aws_sdk_bedrockruntime::types::InferenceConfiguration;
use serde::Deserialize;
use tracing::debug;

use tedtalks_analysis::normalize::NormalizedUtterance;
use tedtalks_analysis::{MoodScorer, ScoreError};
use tedtalks_core::BoxFuture;
use tedtalks_core::models::{MoodLabel, UtteranceMood};

use crate::converse::invoke_converse;
use crate::error::BedrockError;

const MOOD_SYSTEM_PROMPT: &str = "\
You label the mood of one thing a child said to a voice assistant. \
Answer with a single JSON object and nothing else: \
{\"label\": <one of happy, excited, calm, neutral, sad, anxious, angry, frustrated, tired>, \
\"score\": <confidence between 0 and 1>}.";

#[derive(Debug, Clone)]
pub struct BedrockMoodScorer {
    client: Client,
    model_id: String,
}

impl BedrockMoodScorer {
    pub const NAME: &'static str = "bedrock";

    pub fn new(client: Client, model_id: impl Into<String>) -> Self {
        Self {
            client,
            model_id: model_id.into(),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn score_text(&self, text: &str) -> Result<UtteranceMood, BedrockError> {
        // Temperature 0 keeps re-analysis of unchanged text stable.
        let inference = InferenceConfiguration::builder()
            .temperature(0.0)
            .max_tokens(64)
            .build();

        let reply = invoke_converse(
            &self.client,
            &self.model_id,
            MOOD_SYSTEM_PROMPT,
            text,
            inference,
        )
        .await?;
        let mood = parse_mood_response(&reply)?;
        debug!(model_id = %self.model_id, label = %mood.label, score = mood.score, "scored utterance");
        Ok(mood)
    }
}

impl MoodScorer for BedrockMoodScorer {
    fn score<'a>(
        &'a self,
        utterance: &'a NormalizedUtterance,
    ) -> BoxFuture<'a, Result<UtteranceMood, ScoreError>> {
        Box::pin(async move { self.score_text(&utterance.text).await.map_err(ScoreError::from) })
    }
}

#[derive(Deserialize)]
struct RawMood {
    label: String,
    score: f64,
}

/// Parse the model's reply into a mood.
///
/// Tolerates code fences and chatter around the JSON object. Unknown labels
/// fall back to neutral; the score is clamped to `[0, 1]`.
pub fn parse_mood_response(text: &str) -> Result<UtteranceMood, BedrockError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => {
            return Err(BedrockError::ResponseParse(format!(
                "no JSON object in response: {text}"
            )));
        }
    };

    let raw: RawMood = serde_json::from_str(json).map_err(|e| {
        BedrockError::SchemaViolation(format!("failed to parse mood: {e}. Response: {text}"))
    })?;
    if !raw.score.is_finite() {
        return Err(BedrockError::SchemaViolation(format!(
            "score is not a number: {}",
            raw.score
        )));
    }

    Ok(UtteranceMood {
        label: MoodLabel::parse(&raw.label).unwrap_or(MoodLabel::Neutral),
        score: raw.score.clamp(0.0, 1.0),
    })
}
