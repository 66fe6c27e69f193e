//! Safety rule engine.
//!
//! Two rule families run in a fixed order: phrase patterns over each
//! utterance, then sustained-mood thresholds across consecutive child
//! utterances. Flags come out pattern flags first, each family ordered by
//! utterance then rule.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tedtalks_core::models::{Flag, FlagKind, MoodLabel, Severity, Speaker, UtteranceMood};

use crate::error::AnalysisError;
use crate::normalize::{NormalizedUtterance, truncate_with_ellipsis};

pub const EXCERPT_MAX_CHARS: usize = 160;

/// Whose utterances a pattern rule looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerScope {
    Child,
    Assistant,
    Any,
}

impl SpeakerScope {
    fn includes(&self, speaker: Speaker) -> bool {
        match self {
            SpeakerScope::Child => speaker == Speaker::Child,
            SpeakerScope::Assistant => speaker == Speaker::Assistant,
            SpeakerScope::Any => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    pub id: String,
    pub kind: FlagKind,
    pub severity: Severity,
    pub scope: SpeakerScope,
    pub reason: String,
    /// Plain phrases, matched case-insensitively on word boundaries. Words
    /// within a phrase may be separated by spaces or hyphens.
    pub phrases: Vec<String>,
}

impl PatternRule {
    fn new(
        id: &str,
        kind: FlagKind,
        severity: Severity,
        reason: &str,
        phrases: &[&str],
    ) -> Self {
        Self {
            id: id.to_string(),
            kind,
            severity,
            scope: SpeakerScope::Child,
            reason: reason.to_string(),
            phrases: phrases.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// The built-in rule set.
    pub fn builtin() -> Vec<PatternRule> {
        vec![
            PatternRule::new(
                "self_harm",
                FlagKind::Safety,
                Severity::Critical,
                "mentions hurting or killing themselves",
                &[
                    "kill myself",
                    "killing myself",
                    "hurt myself",
                    "hurting myself",
                    "suicide",
                    "self harm",
                    "selfharm",
                    "want to die",
                    "wish i was dead",
                    "cut myself",
                ],
            ),
            PatternRule::new(
                "abuse",
                FlagKind::Safety,
                Severity::Critical,
                "mentions abuse",
                &["abuse", "abused", "abusing", "molest", "molested", "rape", "raped"],
            ),
            PatternRule::new(
                "sexual_content",
                FlagKind::Safety,
                Severity::High,
                "sexual content",
                &["sexual", "sex", "naked", "nude", "nudes", "touched me"],
            ),
            PatternRule::new(
                "injury",
                FlagKind::Safety,
                Severity::Medium,
                "mentions pain, injury or sickness",
                &[
                    "pain",
                    "it hurts",
                    "got hurt",
                    "injured",
                    "bleed",
                    "bleeding",
                    "blood",
                    "sick",
                    "throw up",
                    "threw up",
                    "vomit",
                ],
            ),
            PatternRule::new(
                "bullying",
                FlagKind::Behavioral,
                Severity::Medium,
                "mentions bullying or exclusion",
                &[
                    "bully",
                    "bullied",
                    "bullies",
                    "bullying",
                    "picked on",
                    "made fun of",
                    "laughed at me",
                    "nobody likes me",
                    "no one likes me",
                ],
            ),
            PatternRule::new(
                "fear",
                FlagKind::Behavioral,
                Severity::Low,
                "expresses fear",
                &["scared", "afraid", "terrified", "nightmare", "nightmares", "bad dream"],
            ),
        ]
    }

    fn compile(&self) -> Result<Regex, AnalysisError> {
        let alternatives: Vec<String> = self
            .phrases
            .iter()
            .map(|phrase| {
                phrase
                    .split_whitespace()
                    .map(|word| regex::escape(&word.to_lowercase()))
                    .collect::<Vec<_>>()
                    .join(r"[\s\-]+")
            })
            .filter(|alt| !alt.is_empty())
            .collect();
        if alternatives.is_empty() {
            return Err(AnalysisError::InvalidRule {
                rule: self.id.clone(),
                reason: "no phrases".to_string(),
            });
        }

        Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|"))).map_err(|e| {
            AnalysisError::InvalidRule {
                rule: self.id.clone(),
                reason: e.to_string(),
            }
        })
    }
}

/// Flags a run of `window` consecutive child utterances labelled `label`
/// with confidence at or above `threshold`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoodThresholdRule {
    pub label: MoodLabel,
    pub threshold: f64,
    pub window: usize,
}

impl MoodThresholdRule {
    pub fn id(&self) -> String {
        format!("sustained_{}", self.label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Mood label → minimum confidence that counts toward a run.
    pub thresholds: BTreeMap<MoodLabel, f64>,
    pub window: usize,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            thresholds: BTreeMap::from([
                (MoodLabel::Sad, 0.6),
                (MoodLabel::Anxious, 0.6),
                (MoodLabel::Angry, 0.7),
            ]),
            window: 3,
        }
    }
}

struct CompiledRule {
    rule: PatternRule,
    regex: Regex,
}

pub struct SafetyEngine {
    patterns: Vec<CompiledRule>,
    thresholds: Vec<MoodThresholdRule>,
}

impl SafetyEngine {
    pub fn new(rules: Vec<PatternRule>, config: &SafetyConfig) -> Result<Self, AnalysisError> {
        let patterns = rules
            .into_iter()
            .map(|rule| {
                let regex = rule.compile()?;
                Ok(CompiledRule { rule, regex })
            })
            .collect::<Result<Vec<_>, AnalysisError>>()?;

        let thresholds = config
            .thresholds
            .iter()
            .map(|(label, threshold)| MoodThresholdRule {
                label: *label,
                threshold: *threshold,
                window: config.window.max(1),
            })
            .collect();

        Ok(Self {
            patterns,
            thresholds,
        })
    }

    pub fn with_builtin_rules(config: &SafetyConfig) -> Result<Self, AnalysisError> {
        Self::new(PatternRule::builtin(), config)
    }

    /// Evaluate all rules. `moods` must be parallel to `utterances`.
    pub fn evaluate(
        &self,
        utterances: &[NormalizedUtterance],
        moods: &[UtteranceMood],
    ) -> Result<Vec<Flag>, AnalysisError> {
        if moods.len() != utterances.len() {
            return Err(AnalysisError::Invariant(format!(
                "{} mood entries for {} utterances",
                moods.len(),
                utterances.len()
            )));
        }

        let mut flags = Vec::new();

        for utterance in utterances {
            for compiled in &self.patterns {
                let rule = &compiled.rule;
                if rule.scope.includes(utterance.speaker) && compiled.regex.is_match(&utterance.text)
                {
                    flags.push(Flag {
                        kind: rule.kind,
                        rule: rule.id.clone(),
                        reason: rule.reason.clone(),
                        excerpt: truncate_with_ellipsis(&utterance.raw, EXCERPT_MAX_CHARS),
                        utterance_index: utterance.index,
                        severity: rule.severity,
                    });
                }
            }
        }

        for rule in &self.thresholds {
            let mut run = 0;
            for (utterance, mood) in utterances.iter().zip(moods) {
                if !utterance.is_child() {
                    continue;
                }
                if mood.label != rule.label || mood.score < rule.threshold {
                    run = 0;
                    continue;
                }
                run += 1;
                if run == rule.window {
                    flags.push(Flag {
                        kind: FlagKind::Behavioral,
                        rule: rule.id(),
                        reason: format!(
                            "{} consecutive child utterances scored {} at or above {:.2}",
                            rule.window, rule.label, rule.threshold
                        ),
                        excerpt: truncate_with_ellipsis(&utterance.raw, EXCERPT_MAX_CHARS),
                        utterance_index: utterance.index,
                        severity: Severity::Medium,
                    });
                }
            }
        }

        if let Some(flag) = flags.iter().find(|f| f.utterance_index >= utterances.len()) {
            return Err(AnalysisError::Invariant(format!(
                "rule '{}' flagged utterance {} of {}",
                flag.rule,
                flag.utterance_index,
                utterances.len()
            )));
        }
        Ok(flags)
    }
}
