use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// The enrichment produced for one version of a conversation.
///
/// Replaced wholesale on every successful analysis, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AnalysisResult {
    pub keywords: Vec<Keyword>,
    pub mood_overall: MoodOverall,
    /// One entry per utterance, same order and length as the utterances.
    pub mood_by_utterance: Vec<UtteranceMood>,
    pub flags: Vec<Flag>,
    pub topic: TopicLabel,
    pub summary: String,
    /// Name of the mood scorer backend, e.g. `lexicon` or `bedrock`.
    pub scorer: String,
    pub completed_at: jiff::Timestamp,
}

impl AnalysisResult {
    /// Highest severity across all flags, if any were raised.
    pub fn max_severity(&self) -> Option<Severity> {
        self.flags.iter().map(|f| f.severity).max()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Keyword {
    pub term: String,
    /// Relative score in `[0, 1]`; the top keyword scores 1.0.
    pub score: f64,
}

/// Fixed mood label set.
///
/// Declaration order doubles as the tie-break priority when two labels
/// score the same.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum MoodLabel {
    Happy,
    Excited,
    Calm,
    Neutral,
    Sad,
    Anxious,
    Angry,
    Frustrated,
    Tired,
}

impl MoodLabel {
    pub const ALL: [MoodLabel; 9] = [
        MoodLabel::Happy,
        MoodLabel::Excited,
        MoodLabel::Calm,
        MoodLabel::Neutral,
        MoodLabel::Sad,
        MoodLabel::Anxious,
        MoodLabel::Angry,
        MoodLabel::Frustrated,
        MoodLabel::Tired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MoodLabel::Happy => "happy",
            MoodLabel::Excited => "excited",
            MoodLabel::Calm => "calm",
            MoodLabel::Neutral => "neutral",
            MoodLabel::Sad => "sad",
            MoodLabel::Anxious => "anxious",
            MoodLabel::Angry => "angry",
            MoodLabel::Frustrated => "frustrated",
            MoodLabel::Tired => "tired",
        }
    }

    /// Parse a label name case-insensitively. Unknown names return `None`.
    pub fn parse(name: &str) -> Option<MoodLabel> {
        let name = name.trim();
        MoodLabel::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(name))
    }

    /// Emoji shown next to the mood on the parent dashboard.
    pub fn emoji(&self) -> &'static str {
        match self {
            MoodLabel::Happy => "😄",
            MoodLabel::Excited => "🤩",
            MoodLabel::Calm => "😊",
            MoodLabel::Neutral => "😐",
            MoodLabel::Sad => "😢",
            MoodLabel::Anxious => "😟",
            MoodLabel::Angry => "😠",
            MoodLabel::Frustrated => "😣",
            MoodLabel::Tired => "🥱",
        }
    }
}

impl std::fmt::Display for MoodLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversation-level mood: the dominant label plus the full distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MoodOverall {
    pub label: MoodLabel,
    pub emoji: String,
    /// Label → share of the weighted mood mass. Sums to 1 within float tolerance.
    pub scores: BTreeMap<MoodLabel, f64>,
}

impl MoodOverall {
    /// The result for a conversation with nothing to score.
    pub fn neutral() -> Self {
        Self {
            label: MoodLabel::Neutral,
            emoji: MoodLabel::Neutral.emoji().to_string(),
            scores: BTreeMap::from([(MoodLabel::Neutral, 1.0)]),
        }
    }

    pub fn score(&self, label: MoodLabel) -> f64 {
        self.scores.get(&label).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UtteranceMood {
    pub label: MoodLabel,
    /// Confidence in `[0, 1]`.
    pub score: f64,
}

impl UtteranceMood {
    pub fn neutral() -> Self {
        Self {
            label: MoodLabel::Neutral,
            score: 0.0,
        }
    }
}

/// A marker asking a parent to review part of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Flag {
    pub kind: FlagKind,
    /// Identifier of the rule that fired, e.g. `self_harm`.
    pub rule: String,
    pub reason: String,
    pub excerpt: String,
    pub utterance_index: usize,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum FlagKind {
    Safety,
    Behavioral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Coarse topic of the child's side of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TopicLabel {
    School,
    Friends,
    Family,
    Sleep,
    Health,
    Games,
    Story,
    General,
}
