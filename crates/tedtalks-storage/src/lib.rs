//! tedtalks-storage
//!
//! The conversation store seam used by the analysis worker, with an S3
//! document store for production and an in-memory store for tests.

pub mod client;
pub mod error;
pub mod memory;
pub mod objects;
pub mod s3_store;
pub mod state;
pub mod store;

pub use memory::MemoryConversationStore;
pub use s3_store::S3ConversationStore;
pub use store::{ConversationStore, OldestFirst};
