//! Integration test for the Bedrock mood scorer.
//!
//! Calls the real Converse API and requires valid AWS credentials with
//! Bedrock access in the environment. `BEDROCK_MODEL_ID` overrides the model.
//!
//! Run with: `cargo test -p tedtalks-bedrock --test bedrock_scorer -- --ignored`

use tedtalks_analysis::MoodScorer;
use tedtalks_analysis::normalize::Normalizer;
use tedtalks_bedrock::BedrockMoodScorer;
use tedtalks_core::models::{MoodLabel, Speaker, Utterance};

#[tokio::test]
#[ignore]
async fn scores_an_obviously_happy_utterance() {
    let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new("us-east-1"))
        .load()
        .await;
    let model_id = std::env::var("BEDROCK_MODEL_ID")
        .unwrap_or_else(|_| "us.anthropic.claude-haiku-4-5-20251001-v1:0".to_string());
    let scorer = BedrockMoodScorer::new(aws_sdk_bedrockruntime::Client::new(&config), model_id);

    let utterance = Utterance {
        speaker: Speaker::Child,
        text: "Yay! We won the game and I got a trophy!".to_string(),
        timestamp: jiff::Timestamp::now(),
    };
    let normalized = Normalizer::new().normalize(0, &utterance).unwrap();

    let mood = scorer.score(&normalized).await.unwrap();
    println!("{mood:?}");
    assert!(matches!(mood.label, MoodLabel::Happy | MoodLabel::Excited));
}
