use crate::transcript::TranscriptEntry;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

/// Partial update of a history record. `None` fields are left unchanged by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryUpdate {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Vec<TranscriptEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl HistoryUpdate {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    /// True when the update carries nothing but a completion time.
    pub fn is_completion_only(&self) -> bool {
        self.completed_at.is_some()
            && self.transcript.is_none()
            && self.transcript_text.is_none()
            && self.assessment_text.is_none()
    }
}

/// Durable storage for conversation history records.
///
/// One record is created per conversation and then updated as the transcript
/// grows. Implementations talk to whatever backend owns the records.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HistoryStore: Send + Sync + 'static {
    /// Creates a record for a training module and returns its id.
    async fn create_history_entry(&self, module_id: &str) -> Result<String>;

    async fn update_history_entry(&self, update: HistoryUpdate) -> Result<()>;

    async fn delete_history_entry(&self, id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn completion_only_update_omits_transcript_fields() {
        let update = HistoryUpdate {
            completed_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()),
            ..HistoryUpdate::new("h1")
        };

        assert!(update.is_completion_only());
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({"id": "h1", "completedAt": "2024-05-01T10:00:00Z"})
        );
    }
}
