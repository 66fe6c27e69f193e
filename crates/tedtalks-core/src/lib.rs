//! tedtalks-core
//!
//! Pure domain types and S3 key conventions.
//! No AWS SDK dependency. This is the shared vocabulary of the TedTalks
//! analysis pipeline.

use std::future::Future;
use std::pin::Pin;

pub mod error;
pub mod models;
pub mod s3_keys;

/// Boxed future returned by the object-safe async traits at crate seams
/// (conversation stores, mood scorers).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
