//! S3 key/path conventions.
//!
//! Pure string functions with no AWS SDK dependency. These define the canonical
//! layout of objects in the TedTalks S3 bucket.

use uuid::Uuid;

pub const CONVERSATIONS_PREFIX: &str = "conversations/";

pub fn conversation(id: Uuid) -> String {
    format!("conversations/{id}.json")
}

/// Recover the conversation id from an object key, if it follows the layout.
pub fn conversation_id_from_key(key: &str) -> Option<Uuid> {
    key.strip_prefix(CONVERSATIONS_PREFIX)?
        .strip_suffix(".json")
        .and_then(|id| Uuid::parse_str(id).ok())
}
