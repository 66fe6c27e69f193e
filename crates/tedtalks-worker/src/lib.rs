//! tedtalks-worker
//!
//! The background analysis worker: configuration, AWS bootstrap, and the
//! orchestrator that claims pending conversations, runs the analysis
//! pipeline and commits results.

pub mod audit;
pub mod aws;
pub mod clock;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod retry;
