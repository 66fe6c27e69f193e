//! tedtalks-bedrock
//!
//! Bedrock Converse invocation and the model-backed mood scorer.

pub mod client;
pub mod converse;
pub mod error;
pub mod mood;

pub use mood::BedrockMoodScorer;
