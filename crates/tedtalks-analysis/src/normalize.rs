use std::sync::LazyLock;

use regex::Regex;
use tedtalks_core::models::{Speaker, Utterance};

use crate::error::AnalysisError;

/// Letters and digits, keeping inner apostrophes and hyphens (`don't`, `self-harm`).
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{L}\p{N}]+(?:['-][\p{L}\p{N}]+)*").expect("token regex must compile")
});

/// An utterance after cleaning, aligned 1:1 with the stored utterances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedUtterance {
    pub index: usize,
    pub speaker: Speaker,
    /// Original text, untouched.
    pub raw: String,
    /// Folded, lowercased, whitespace-collapsed text.
    pub text: String,
    pub tokens: Vec<String>,
}

impl NormalizedUtterance {
    pub fn is_child(&self) -> bool {
        self.speaker == Speaker::Child
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize every utterance of a conversation, preserving count and order.
    pub fn normalize_all(
        &self,
        utterances: &[Utterance],
    ) -> Result<Vec<NormalizedUtterance>, AnalysisError> {
        utterances
            .iter()
            .enumerate()
            .map(|(index, u)| self.normalize(index, u))
            .collect()
    }

    pub fn normalize(
        &self,
        index: usize,
        utterance: &Utterance,
    ) -> Result<NormalizedUtterance, AnalysisError> {
        if let Some(c) = utterance
            .text
            .chars()
            .find(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r'))
        {
            return Err(AnalysisError::Malformed {
                index,
                reason: format!("contains control character U+{:04X}", c as u32),
            });
        }

        let text = collapse_whitespace(&fold_typography(&utterance.text).to_lowercase());
        let tokens = TOKEN_RE
            .find_iter(&text)
            .map(|m| m.as_str().to_string())
            .collect();

        Ok(NormalizedUtterance {
            index,
            speaker: utterance.speaker,
            raw: utterance.text.clone(),
            text,
            tokens,
        })
    }
}

fn fold_typography(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2018}' | '\u{2019}' | '\u{201B}' | '\u{2032}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => out.push('"'),
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2212}' => {
                out.push('-')
            }
            '\u{2026}' => out.push_str("..."),
            '\u{00A0}' | '\u{2007}' | '\u{202F}' => out.push(' '),
            c => out.push(c),
        }
    }
    out
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse whitespace and cut to at most `max_chars` characters, marking the
/// cut with an ellipsis.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    let collapsed = collapse_whitespace(text);
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let cut: String = collapsed.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}
