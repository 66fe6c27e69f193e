//! tedtalks-analysis
//!
//! The analysis stages run on one conversation version: normalization,
//! keyword extraction, mood classification, topic and summary, and the
//! safety rule engine, composed by [`pipeline::AnalysisPipeline`].
//!
//! Everything here is deterministic for identical input apart from the mood
//! scorer, which is a pluggable trait so remote models can stand in for the
//! built-in lexicon.

pub mod error;
pub mod keywords;
pub mod mood;
pub mod normalize;
pub mod pipeline;
pub mod safety;
pub mod topic;

pub use error::{AnalysisError, ScoreError};
pub use mood::{LexiconScorer, MoodScorer};
pub use pipeline::{AnalysisPipeline, PipelineConfig};
