//! Keyphrase extraction.
//!
//! RAKE-style scoring: candidate phrases are runs of content words inside a
//! single utterance, each word is scored by degree over frequency, and a
//! phrase scores the sum of its words. Scores are scaled so the best phrase
//! is 1.0.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tedtalks_core::models::Keyword;

use crate::normalize::NormalizedUtterance;

const STOPWORDS: &[&str] = &[
    "a", "about", "after", "again", "all", "also", "am", "an", "and", "any", "are", "as", "at",
    "be", "because", "been", "before", "being", "but", "by", "can", "can't", "could", "did",
    "didn't", "do", "does", "doesn't", "don't", "for", "from", "get", "got", "had", "has", "have",
    "he", "her", "here", "him", "his", "how", "i", "i'm", "if", "in", "into", "is", "isn't", "it",
    "it's", "its", "just", "like", "me", "my", "no", "not", "now", "of", "oh", "ok", "okay", "on",
    "or", "our", "out", "really", "she", "so", "some", "that", "the", "their", "them", "then",
    "there", "these", "they", "this", "those", "to", "too", "uh", "um", "up", "us", "very",
    "was", "wasn't", "we", "were", "what", "when", "where", "which", "who", "why", "will", "with",
    "would", "yeah", "yes", "you", "your",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub max_keywords: usize,
    pub max_phrase_words: usize,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            max_keywords: 10,
            max_phrase_words: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    config: KeywordConfig,
    stopwords: HashSet<&'static str>,
}

impl KeywordExtractor {
    pub fn new(config: KeywordConfig) -> Self {
        Self {
            config,
            stopwords: STOPWORDS.iter().copied().collect(),
        }
    }

    pub fn extract(&self, utterances: &[NormalizedUtterance]) -> Vec<Keyword> {
        let phrases = self.candidate_phrases(utterances);
        if phrases.is_empty() || self.config.max_keywords == 0 {
            return Vec::new();
        }

        let mut frequency: HashMap<&str, f64> = HashMap::new();
        let mut degree: HashMap<&str, f64> = HashMap::new();
        for phrase in &phrases {
            for &word in phrase {
                *frequency.entry(word).or_default() += 1.0;
                *degree.entry(word).or_default() += phrase.len() as f64;
            }
        }

        let mut seen = HashSet::new();
        let mut scored: Vec<Keyword> = Vec::new();
        for phrase in &phrases {
            let term = phrase.join(" ");
            if !seen.insert(term.clone()) {
                continue;
            }
            let score: f64 = phrase
                .iter()
                .map(|w| degree[*w] / frequency[*w])
                .sum();
            scored.push(Keyword { term, score });
        }

        // Stable: equal scores keep first-occurrence order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(self.config.max_keywords);

        let top = scored.first().map(|k| k.score).unwrap_or(1.0);
        for keyword in &mut scored {
            keyword.score /= top;
        }
        scored
    }

    /// Content-word runs in occurrence order, chunked to `max_phrase_words`.
    fn candidate_phrases<'u>(&self, utterances: &'u [NormalizedUtterance]) -> Vec<Vec<&'u str>> {
        let max_words = self.config.max_phrase_words.max(1);
        let mut phrases = Vec::new();

        for utterance in utterances {
            let mut run: Vec<&str> = Vec::new();
            for token in &utterance.tokens {
                if self.breaks_phrase(token) {
                    if !run.is_empty() {
                        phrases.push(std::mem::take(&mut run));
                    }
                    continue;
                }
                run.push(token.as_str());
                if run.len() == max_words {
                    phrases.push(std::mem::take(&mut run));
                }
            }
            if !run.is_empty() {
                phrases.push(run);
            }
        }
        phrases
    }

    fn breaks_phrase(&self, token: &str) -> bool {
        self.stopwords.contains(token)
            || token.chars().count() == 1
            || !token.chars().any(char::is_alphabetic)
    }
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(KeywordConfig::default())
    }
}
