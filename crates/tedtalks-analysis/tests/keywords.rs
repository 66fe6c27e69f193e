use tedtalks_analysis::keywords::{KeywordConfig, KeywordExtractor};
use tedtalks_analysis::normalize::{NormalizedUtterance, Normalizer};
use tedtalks_core::models::{Speaker, Utterance};

fn normalized(texts: &[&str]) -> Vec<NormalizedUtterance> {
    let utterances: Vec<Utterance> = texts
        .iter()
        .map(|t| Utterance {
            speaker: Speaker::Child,
            text: t.to_string(),
            timestamp: jiff::Timestamp::from_second(1_760_000_000).unwrap(),
        })
        .collect();
    Normalizer::new().normalize_all(&utterances).unwrap()
}

#[test]
fn empty_input_has_no_keywords() {
    assert!(KeywordExtractor::default().extract(&[]).is_empty());
    assert!(KeywordExtractor::default().extract(&normalized(&["", "the and a"])).is_empty());
}

#[test]
fn multi_word_phrases_outrank_single_words() {
    let keywords = KeywordExtractor::default().extract(&normalized(&[
        "I had a great day!",
        "played with friends",
    ]));

    assert_eq!(keywords[0].term, "great day");
    assert_eq!(keywords[0].score, 1.0);
    let terms: Vec<&str> = keywords.iter().map(|k| k.term.as_str()).collect();
    assert_eq!(terms, vec!["great day", "played", "friends"]);
    assert!(keywords.iter().all(|k| (0.0..=1.0).contains(&k.score)));
}

#[test]
fn phrases_do_not_cross_utterances() {
    let keywords = KeywordExtractor::default().extract(&normalized(&["pizza", "party"]));
    assert!(keywords.iter().all(|k| k.term != "pizza party"));
    assert_eq!(keywords.len(), 2);
}

#[test]
fn repeated_phrases_are_deduplicated() {
    let keywords = KeywordExtractor::default().extract(&normalized(&[
        "dragon story",
        "tell me the dragon story again",
    ]));
    let count = keywords.iter().filter(|k| k.term == "dragon story").count();
    assert_eq!(count, 1);
}

#[test]
fn numbers_and_single_letters_break_phrases() {
    let keywords = KeywordExtractor::default().extract(&normalized(&["math test 3 x homework"]));
    let terms: Vec<&str> = keywords.iter().map(|k| k.term.as_str()).collect();
    assert_eq!(terms, vec!["math test", "homework"]);
}

#[test]
fn long_runs_are_chunked_and_capped() {
    let config = KeywordConfig {
        max_keywords: 2,
        max_phrase_words: 2,
    };
    let keywords =
        KeywordExtractor::new(config).extract(&normalized(&["red green blue yellow purple"]));
    assert_eq!(keywords.len(), 2);
    assert_eq!(keywords[0].term, "red green");
    assert_eq!(keywords[1].term, "blue yellow");
}

#[test]
fn extraction_is_deterministic() {
    let input = normalized(&["we built a big sand castle", "the sand castle fell down"]);
    let extractor = KeywordExtractor::default();
    assert_eq!(extractor.extract(&input), extractor.extract(&input));
}
