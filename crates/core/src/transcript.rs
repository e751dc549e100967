use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    InProgress,
    Done,
}

/// One speech turn, in the shape it is persisted with the history record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    /// Provider-issued turn id, unique within a session.
    pub id: String,
    pub participant_name: String,
    pub role: Role,
    pub text: String,
    /// Human readable creation time (`HH:MM:SS`, UTC).
    pub timestamp: String,
    pub created_at_ms: i64,
    pub status: EntryStatus,
    pub is_hidden: bool,
}

/// Ordered, append-only collection of speech turns.
///
/// Entries keep arrival order. Lookups by id go through an index so streaming
/// deltas do not rescan the whole buffer.
#[derive(Debug, Clone, Default)]
pub struct TranscriptBuffer {
    entries: Vec<TranscriptEntry>,
    index: HashMap<String, usize>,
}

impl TranscriptBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new `InProgress` entry. Returns `false` (and leaves the buffer
    /// untouched) when `entry_id` is already present.
    pub fn add_transcript_message(
        &mut self,
        entry_id: &str,
        participant_name: &str,
        role: Role,
        text: &str,
        hidden: bool,
        now: DateTime<Utc>,
    ) -> bool {
        if self.index.contains_key(entry_id) {
            tracing::warn!(entry_id, "ignoring duplicate transcript entry");
            return false;
        }
        self.index.insert(entry_id.to_string(), self.entries.len());
        self.entries.push(TranscriptEntry {
            id: entry_id.to_string(),
            participant_name: participant_name.to_string(),
            role,
            text: text.to_string(),
            timestamp: now.format("%H:%M:%S").to_string(),
            created_at_ms: now.timestamp_millis(),
            status: EntryStatus::InProgress,
            is_hidden: hidden,
        });
        true
    }

    /// Appends `new_text` when `is_delta`, otherwise replaces the entry's text.
    pub fn update_transcript_message(&mut self, entry_id: &str, new_text: &str, is_delta: bool) -> bool {
        let Some(entry) = self.entry_mut(entry_id) else {
            tracing::error!(entry_id, "transcript update for unknown entry");
            return false;
        };
        if is_delta {
            entry.text.push_str(new_text);
        } else {
            entry.text = new_text.to_string();
        }
        true
    }

    pub fn update_transcript_entry_status(&mut self, entry_id: &str, status: EntryStatus) -> bool {
        let Some(entry) = self.entry_mut(entry_id) else {
            tracing::error!(entry_id, ?status, "status update for unknown entry");
            return false;
        };
        entry.status = status;
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub fn contains(&self, entry_id: &str) -> bool {
        self.index.contains_key(entry_id)
    }

    pub fn get(&self, entry_id: &str) -> Option<&TranscriptEntry> {
        self.index.get(entry_id).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn visible_entries(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries.iter().filter(|entry| !entry.is_hidden)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Plain-text rendering stored alongside the structured transcript.
    pub fn format_text(&self) -> String {
        format_transcript(&self.entries)
    }

    /// Serialized form used to detect changes between saves.
    pub fn snapshot(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.entries)
    }

    fn entry_mut(&mut self, entry_id: &str) -> Option<&mut TranscriptEntry> {
        let i = *self.index.get(entry_id)?;
        self.entries.get_mut(i)
    }
}

/// Renders entries as `"{participant}: {text}"` lines, in order.
pub fn format_transcript(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .map(|entry| format!("{}: {}", entry.participant_name, entry.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 14, 5, 9).unwrap()
    }

    #[test]
    fn duplicate_insert_keeps_first_entry() {
        let mut buffer = TranscriptBuffer::new();

        assert!(buffer.add_transcript_message("item_1", "Alice", Role::User, "first", false, now()));
        assert!(!buffer.add_transcript_message("item_1", "Alice", Role::User, "second", false, now()));

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.entries()[0].text, "first");
    }

    #[test]
    fn deltas_accumulate_in_place() {
        let mut buffer = TranscriptBuffer::new();
        buffer.add_transcript_message("item_1", "Coach", Role::Agent, "", false, now());

        buffer.update_transcript_message("item_1", "Hel", true);
        buffer.update_transcript_message("item_1", "lo", true);
        buffer.update_transcript_message("item_1", " world", true);

        assert_eq!(buffer.get("item_1").unwrap().text, "Hello world");
    }

    #[test]
    fn non_delta_update_replaces_text() {
        let mut buffer = TranscriptBuffer::new();
        buffer.add_transcript_message("item_1", "Coach", Role::Agent, "", false, now());

        buffer.update_transcript_message("item_1", "Hi", true);
        buffer.update_transcript_message("item_1", "Bye", false);

        assert_eq!(buffer.get("item_1").unwrap().text, "Bye");
    }

    #[test]
    fn updates_to_unknown_ids_are_rejected_without_mutation() {
        let mut buffer = TranscriptBuffer::new();
        buffer.add_transcript_message("item_1", "Alice", Role::User, "hi", false, now());

        assert!(!buffer.update_transcript_message("missing", "x", true));
        assert!(!buffer.update_transcript_entry_status("missing", EntryStatus::Done));
        assert_eq!(buffer.entries()[0].text, "hi");
        assert_eq!(buffer.entries()[0].status, EntryStatus::InProgress);
    }

    #[test]
    fn status_transitions_are_not_validated() {
        let mut buffer = TranscriptBuffer::new();
        buffer.add_transcript_message("item_1", "Alice", Role::User, "hi", false, now());

        assert!(buffer.update_transcript_entry_status("item_1", EntryStatus::Done));
        assert!(buffer.update_transcript_entry_status("item_1", EntryStatus::InProgress));
        assert_eq!(buffer.entries()[0].status, EntryStatus::InProgress);
    }

    #[test]
    fn formats_participant_lines_in_order() {
        let mut buffer = TranscriptBuffer::new();
        buffer.add_transcript_message("a", "Alice", Role::User, "Hi", false, now());
        buffer.add_transcript_message("b", "Bob", Role::Agent, "Hello", false, now());

        assert_eq!(buffer.format_text(), "Alice: Hi\nBob: Hello");
    }

    #[test]
    fn clear_allows_reusing_ids() {
        let mut buffer = TranscriptBuffer::new();
        buffer.add_transcript_message("a", "Alice", Role::User, "Hi", false, now());
        buffer.clear();

        assert!(buffer.is_empty());
        assert!(buffer.add_transcript_message("a", "Alice", Role::User, "again", false, now()));
        assert_eq!(buffer.get("a").unwrap().text, "again");
    }

    #[test]
    fn hidden_entries_are_kept_but_not_visible() {
        let mut buffer = TranscriptBuffer::new();
        buffer.add_transcript_message("sys", "Coach", Role::Agent, "setup", true, now());
        buffer.add_transcript_message("a", "Alice", Role::User, "Hi", false, now());

        assert_eq!(buffer.len(), 2);
        let visible: Vec<_> = buffer.visible_entries().map(|e| e.id.as_str()).collect();
        assert_eq!(visible, vec!["a"]);
    }

    #[test]
    fn entries_serialize_in_persisted_shape() {
        let mut buffer = TranscriptBuffer::new();
        buffer.add_transcript_message("a", "Alice", Role::User, "Hi", false, now());

        let value = serde_json::to_value(&buffer.entries()[0]).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "id": "a",
                "participantName": "Alice",
                "role": "user",
                "text": "Hi",
                "timestamp": "14:05:09",
                "createdAtMs": now().timestamp_millis(),
                "status": "IN_PROGRESS",
                "isHidden": false
            })
        );
    }
}
