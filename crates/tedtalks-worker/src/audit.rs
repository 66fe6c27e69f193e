use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// A structured record of a conversation's analysis lifecycle.
///
/// Logged via `tracing` so status transitions can be followed per
/// conversation in the JSON log stream.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisEvent {
    pub action: &'static str,
    pub conversation_id: Uuid,
    pub version: u64,
    pub worker_id: String,
    pub details: Option<serde_json::Value>,
}

impl AnalysisEvent {
    pub fn new(
        action: &'static str,
        conversation_id: Uuid,
        version: u64,
        worker_id: impl Into<String>,
    ) -> Self {
        Self {
            action,
            conversation_id,
            version,
            worker_id: worker_id.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn emit(&self) {
        let details = self
            .details
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_default();
        info!(
            event.action = self.action,
            conversation_id = %self.conversation_id,
            version = self.version,
            worker_id = %self.worker_id,
            event.details = %details,
            "analysis event"
        );
    }
}
