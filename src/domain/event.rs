//! # Events
//!
//! The raw event shape delivered by the platform's event source.
//! Covers new messages, edits and deletions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    #[default]
    NewMessage,
    Edited,
    Deleted,
}

/// A single event from the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub kind: EventKind,
    pub chat_id: i64,
    #[serde(default)]
    pub message_id: i64,
    #[serde(default)]
    pub sender_id: Option<i64>,
    #[serde(default)]
    pub text: String,
    /// Sent by the account the agent runs as.
    #[serde(default)]
    pub outgoing: bool,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Album identifier shared by every item of a multi-media post.
    #[serde(default)]
    pub grouped_id: Option<i64>,
    #[serde(default)]
    pub has_media: bool,
    #[serde(default)]
    pub deleted_ids: Vec<i64>,
}

impl Event {
    pub fn message(chat_id: i64, message_id: i64, sender_id: i64, text: &str) -> Self {
        Self {
            kind: EventKind::NewMessage,
            chat_id,
            message_id,
            sender_id: Some(sender_id),
            text: text.to_string(),
            outgoing: false,
            timestamp: Utc::now(),
            grouped_id: None,
            has_media: false,
            deleted_ids: Vec::new(),
        }
    }

    pub fn edited(chat_id: i64, message_id: i64, sender_id: i64, text: &str) -> Self {
        Self {
            kind: EventKind::Edited,
            ..Self::message(chat_id, message_id, sender_id, text)
        }
    }

    /// Deletions carry no sender; the platform only reports the ids.
    pub fn deleted(chat_id: i64, deleted_ids: Vec<i64>) -> Self {
        Self {
            kind: EventKind::Deleted,
            sender_id: None,
            deleted_ids,
            ..Self::message(chat_id, 0, 0, "")
        }
    }

    pub fn outgoing(mut self) -> Self {
        self.outgoing = true;
        self
    }

    pub fn with_media(mut self, grouped_id: Option<i64>) -> Self {
        self.has_media = true;
        self.grouped_id = grouped_id;
        self
    }

    pub fn without_sender(mut self) -> Self {
        self.sender_id = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_event() {
        let ev: Event = serde_json::from_str(r#"{"chat_id": -100, "text": ".ping"}"#).unwrap();
        assert_eq!(ev.kind, EventKind::NewMessage);
        assert_eq!(ev.chat_id, -100);
        assert_eq!(ev.sender_id, None);
        assert!(!ev.outgoing);
        assert!(ev.deleted_ids.is_empty());
    }

    #[test]
    fn test_deleted_event_has_no_sender() {
        let ev = Event::deleted(5, vec![1, 2]);
        assert_eq!(ev.kind, EventKind::Deleted);
        assert_eq!(ev.sender_id, None);
        assert_eq!(ev.deleted_ids, vec![1, 2]);
    }
}
