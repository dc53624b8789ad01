//! # Domain Traits
//!
//! Abstract interfaces for the external collaborators of the core (event source,
//! outgoing actions, cache). Allows for pluggable implementations in the Infrastructure layer.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::domain::event::Event;

/// Abstract interface for the platform's outgoing actions.
#[async_trait]
pub trait ActionSink: Send + Sync {
    /// Send a message to a chat, returning the new message id
    async fn send_message(&self, chat_id: i64, content: &str) -> Result<i64, String>;

    /// Edit an existing message
    async fn edit_message(&self, chat_id: i64, message_id: i64, content: &str) -> Result<(), String>;

    /// Delete a message
    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), String>;

    /// Send a file with an optional caption
    async fn send_file(
        &self,
        chat_id: i64,
        file_name: &str,
        data: Bytes,
        caption: Option<&str>,
    ) -> Result<(), String>;

    /// Forward messages between chats, keeping their order
    async fn forward_messages(
        &self,
        to_chat: i64,
        from_chat: i64,
        message_ids: &[i64],
    ) -> Result<(), String>;
}

/// Abstract interface for the platform's incoming event stream.
#[async_trait]
pub trait EventSource: Send {
    /// Next event, or `None` once the stream has ended
    async fn next_event(&mut self) -> Option<Event>;
}

/// Key-value store with per-entry expiration.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, String>;

    /// Store `value`; `ttl = None` applies the backend's default expiry.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), String>;

    async fn delete(&self, key: &str) -> Result<bool, String>;
}
