//! Mood classification.
//!
//! Each utterance is scored independently by a [`MoodScorer`]; the
//! conversation-level mood is a recency-weighted aggregate over the child's
//! utterances.
//!
//! Aggregation: the k-th of m contributing utterances weighs
//! `recency_decay^(m-1-k)`, so the latest weighs 1. An utterance labelled `L`
//! with confidence `s` adds `w·s` to `L` and `w·(1-s)` to neutral. Totals are
//! divided by the weight sum, so the distribution sums to 1.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tedtalks_core::BoxFuture;
use tedtalks_core::models::{MoodLabel, MoodOverall, UtteranceMood};

use crate::error::{AnalysisError, ScoreError};
use crate::normalize::NormalizedUtterance;

/// Scores the mood of a single utterance.
///
/// Implementations must be deterministic for identical input (remote
/// scorers run at temperature 0).
pub trait MoodScorer: Send + Sync {
    fn score<'a>(
        &'a self,
        utterance: &'a NormalizedUtterance,
    ) -> BoxFuture<'a, Result<UtteranceMood, ScoreError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Per-call timeout for the scorer.
    pub scoring_timeout_ms: u64,
    /// Concurrent scorer calls per conversation.
    pub max_in_flight: usize,
    pub recency_decay: f64,
}

impl ClassifierConfig {
    pub fn scoring_timeout(&self) -> Duration {
        Duration::from_millis(self.scoring_timeout_ms)
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            scoring_timeout_ms: 5_000,
            max_in_flight: 4,
            recency_decay: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoodOutput {
    pub overall: MoodOverall,
    pub by_utterance: Vec<UtteranceMood>,
}

pub struct MoodClassifier {
    scorer: Arc<dyn MoodScorer>,
    scorer_name: String,
    config: ClassifierConfig,
}

impl MoodClassifier {
    pub fn new(
        scorer: Arc<dyn MoodScorer>,
        scorer_name: impl Into<String>,
        config: ClassifierConfig,
    ) -> Self {
        Self {
            scorer,
            scorer_name: scorer_name.into(),
            config,
        }
    }

    pub fn scorer_name(&self) -> &str {
        &self.scorer_name
    }

    /// Score every utterance (in order) and aggregate. The first scorer
    /// failure fails the whole conversation.
    pub async fn classify(
        &self,
        utterances: &[NormalizedUtterance],
    ) -> Result<MoodOutput, AnalysisError> {
        // Collected first so the classify future stays `Send` when spawned.
        let calls: Vec<_> = utterances.iter().map(|u| self.score_one(u)).collect();
        let by_utterance: Vec<UtteranceMood> = stream::iter(calls)
            .buffered(self.config.max_in_flight.max(1))
            .try_collect()
            .await?;

        let overall = aggregate(utterances, &by_utterance, self.config.recency_decay);
        Ok(MoodOutput {
            overall,
            by_utterance,
        })
    }

    async fn score_one(&self, utterance: &NormalizedUtterance) -> Result<UtteranceMood, ScoreError> {
        if utterance.tokens.is_empty() {
            return Ok(UtteranceMood::neutral());
        }

        let timeout = self.config.scoring_timeout();
        let mood = tokio::time::timeout(timeout, self.scorer.score(utterance))
            .await
            .map_err(|_| ScoreError::Timeout(timeout))??;

        if !(0.0..=1.0).contains(&mood.score) {
            return Err(ScoreError::InvalidResponse(format!(
                "score {} for utterance {} is outside [0, 1]",
                mood.score, utterance.index
            )));
        }
        Ok(mood)
    }
}

/// Recency-weighted aggregate over child utterances that carry a mood.
///
/// Utterances scored `neutral` (no cue, or nothing to score) add no
/// evidence and are left out.
pub fn aggregate(
    utterances: &[NormalizedUtterance],
    moods: &[UtteranceMood],
    recency_decay: f64,
) -> MoodOverall {
    let contributing: Vec<&UtteranceMood> = utterances
        .iter()
        .zip(moods)
        .filter(|(u, m)| u.is_child() && !u.tokens.is_empty() && m.label != MoodLabel::Neutral)
        .map(|(_, m)| m)
        .collect();
    if contributing.is_empty() {
        return MoodOverall::neutral();
    }

    let m = contributing.len();
    let mut mass: BTreeMap<MoodLabel, f64> = BTreeMap::new();
    let mut total_weight = 0.0;
    for (k, mood) in contributing.into_iter().enumerate() {
        let weight = recency_decay.powi((m - 1 - k) as i32);
        total_weight += weight;
        *mass.entry(mood.label).or_default() += weight * mood.score;
        *mass.entry(MoodLabel::Neutral).or_default() += weight * (1.0 - mood.score);
    }

    let scores: BTreeMap<MoodLabel, f64> = mass
        .into_iter()
        .filter(|(_, v)| *v > 0.0)
        .map(|(label, v)| (label, v / total_weight))
        .collect();
    if scores.is_empty() {
        return MoodOverall::neutral();
    }

    // Strict comparison keeps the earlier label on ties.
    let mut label = MoodLabel::Neutral;
    let mut best = f64::MIN;
    for candidate in MoodLabel::ALL {
        let score = scores.get(&candidate).copied().unwrap_or(0.0);
        if score > best {
            best = score;
            label = candidate;
        }
    }

    MoodOverall {
        label,
        emoji: label.emoji().to_string(),
        scores,
    }
}

/// Cue words per label, checked against token windows.
const CUES: &[(MoodLabel, &[&str])] = &[
    (
        MoodLabel::Happy,
        &[
            "happy", "great", "awesome", "fun", "yay", "love", "loved", "good", "best", "glad",
            "nice", "cool", "laughed", "sticker", "so cool",
        ],
    ),
    (
        MoodLabel::Excited,
        &["excited", "amazing", "wow", "incredible", "can't wait", "birthday", "party"],
    ),
    (
        MoodLabel::Calm,
        &["calm", "relaxed", "okay", "peaceful", "fine", "chill", "cozy"],
    ),
    (
        MoodLabel::Sad,
        &["sad", "cry", "cried", "crying", "lonely", "upset", "unhappy", "alone", "miss"],
    ),
    (
        MoodLabel::Anxious,
        &["worried", "worry", "scared", "anxious", "nervous", "afraid", "frightened", "what if"],
    ),
    (MoodLabel::Angry, &["angry", "mad", "hate", "furious"]),
    (
        MoodLabel::Frustrated,
        &["frustrated", "annoyed", "ugh", "unfair", "stuck"],
    ),
    (MoodLabel::Tired, &["tired", "sleepy", "exhausted", "yawn"]),
];

const NEGATORS: &[&str] = &["not", "never", "no", "don't", "didn't", "isn't", "wasn't", "ain't"];

/// Built-in cue-lexicon scorer.
///
/// A negated positive cue ("not happy") counts toward sad; a negated
/// negative cue ("not scared") is dropped. The winning label's confidence
/// grows with its hit count and shrinks with competing hits.
#[derive(Debug, Clone, Default)]
pub struct LexiconScorer;

impl LexiconScorer {
    pub const NAME: &'static str = "lexicon";

    pub fn new() -> Self {
        Self
    }

    pub fn score_tokens(&self, tokens: &[String]) -> UtteranceMood {
        let mut hits: BTreeMap<MoodLabel, u32> = BTreeMap::new();

        for (label, cues) in CUES {
            for cue in *cues {
                let words: Vec<&str> = cue.split(' ').collect();
                for start in 0..tokens.len() {
                    let end = start + words.len();
                    if end > tokens.len()
                        || !tokens[start..end].iter().zip(&words).all(|(t, w)| t == w)
                    {
                        continue;
                    }
                    let negated = start > 0 && NEGATORS.contains(&tokens[start - 1].as_str());
                    match (negated, is_positive(*label)) {
                        (false, _) => *hits.entry(*label).or_default() += 1,
                        (true, true) => *hits.entry(MoodLabel::Sad).or_default() += 1,
                        (true, false) => {}
                    }
                }
            }
        }

        let total: u32 = hits.values().sum();
        let Some((label, top)) = hits
            .iter()
            .fold(None, |best: Option<(MoodLabel, u32)>, (label, count)| match best {
                Some((_, n)) if n >= *count => best,
                _ => Some((*label, *count)),
            })
        else {
            return UtteranceMood {
                label: MoodLabel::Neutral,
                score: 0.5,
            };
        };

        let confidence = (0.75 + 0.15 * f64::from(top - 1)).min(0.95);
        UtteranceMood {
            label,
            score: confidence * f64::from(top) / f64::from(total),
        }
    }
}

fn is_positive(label: MoodLabel) -> bool {
    matches!(label, MoodLabel::Happy | MoodLabel::Excited | MoodLabel::Calm)
}

impl MoodScorer for LexiconScorer {
    fn score<'a>(
        &'a self,
        utterance: &'a NormalizedUtterance,
    ) -> BoxFuture<'a, Result<UtteranceMood, ScoreError>> {
        let mood = self.score_tokens(&utterance.tokens);
        Box::pin(async move { Ok(mood) })
    }
}
