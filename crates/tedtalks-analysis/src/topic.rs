use tedtalks_core::models::TopicLabel;

use crate::normalize::{NormalizedUtterance, truncate_with_ellipsis};

pub const SUMMARY_MAX_CHARS: usize = 160;

/// Hint words per topic. Table order breaks ties.
const TOPIC_HINTS: &[(TopicLabel, &[&str])] = &[
    (
        TopicLabel::School,
        &["teacher", "homework", "class", "school", "sticker", "test", "grade", "math", "science"],
    ),
    (
        TopicLabel::Friends,
        &["friend", "friends", "bully", "playdate", "party", "bestie", "mean", "argue"],
    ),
    (
        TopicLabel::Family,
        &[
            "mom", "dad", "mother", "father", "sister", "brother", "grandma", "grandpa", "aunt",
            "uncle",
        ],
    ),
    (
        TopicLabel::Sleep,
        &["sleep", "tired", "sleepy", "nightmare", "bed", "wake", "dream"],
    ),
    (
        TopicLabel::Health,
        &["hurt", "sick", "doctor", "pain", "stomach", "headache", "medicine"],
    ),
    (
        TopicLabel::Games,
        &["game", "roblox", "minecraft", "fortnite", "playstation", "switch", "xbox"],
    ),
    (
        TopicLabel::Story,
        &["story", "teddy", "bear", "zoo", "adventure", "dragon", "princess"],
    ),
];

/// Topic of the child's side of the conversation: the topic whose hint words
/// occur most often among child tokens, `general` when none occur.
pub fn infer_topic(utterances: &[NormalizedUtterance]) -> TopicLabel {
    let child_tokens: Vec<&str> = utterances
        .iter()
        .filter(|u| u.is_child())
        .flat_map(|u| u.tokens.iter().map(String::as_str))
        .collect();

    let mut best = (TopicLabel::General, 0);
    for (topic, hints) in TOPIC_HINTS {
        let hits = child_tokens.iter().filter(|t| hints.contains(*t)).count();
        if hits > best.1 {
            best = (*topic, hits);
        }
    }
    best.0
}

/// The child's words, joined and cut to [`SUMMARY_MAX_CHARS`].
pub fn summarize(utterances: &[NormalizedUtterance]) -> String {
    let child_text = utterances
        .iter()
        .filter(|u| u.is_child())
        .map(|u| u.raw.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    truncate_with_ellipsis(&child_text, SUMMARY_MAX_CHARS)
}
