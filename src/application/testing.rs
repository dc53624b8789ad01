//! Test doubles shared by the application tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::application::handler::{HandlerContext, Services};
use crate::application::pattern::MatchCaptures;
use crate::domain::config::AppConfig;
use crate::domain::event::Event;
use crate::domain::traits::{ActionSink, EventSource};
use crate::infrastructure::cache::memory::MemoryCache;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Send { chat: i64, text: String },
    Edit { chat: i64, message: i64, text: String },
    Delete { chat: i64, message: i64 },
    File { chat: i64, name: String, caption: Option<String> },
    Forward { to: i64, from: i64, ids: Vec<i64> },
}

/// Records every outgoing action in order.
#[derive(Default)]
pub struct RecordingSink {
    actions: Mutex<Vec<Action>>,
    next_id: AtomicI64,
}

impl RecordingSink {
    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|action| match action {
                Action::Send { text, .. } | Action::Edit { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn push(&self, action: Action) {
        self.actions.lock().unwrap().push(action);
    }
}

#[async_trait]
impl ActionSink for RecordingSink {
    async fn send_message(&self, chat_id: i64, content: &str) -> Result<i64, String> {
        self.push(Action::Send {
            chat: chat_id,
            text: content.to_string(),
        });
        Ok(1000 + self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    async fn edit_message(&self, chat_id: i64, message_id: i64, content: &str) -> Result<(), String> {
        self.push(Action::Edit {
            chat: chat_id,
            message: message_id,
            text: content.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), String> {
        self.push(Action::Delete {
            chat: chat_id,
            message: message_id,
        });
        Ok(())
    }

    async fn send_file(
        &self,
        chat_id: i64,
        file_name: &str,
        _data: Bytes,
        caption: Option<&str>,
    ) -> Result<(), String> {
        self.push(Action::File {
            chat: chat_id,
            name: file_name.to_string(),
            caption: caption.map(str::to_string),
        });
        Ok(())
    }

    async fn forward_messages(
        &self,
        to_chat: i64,
        from_chat: i64,
        message_ids: &[i64],
    ) -> Result<(), String> {
        self.push(Action::Forward {
            to: to_chat,
            from: from_chat,
            ids: message_ids.to_vec(),
        });
        Ok(())
    }
}

pub fn services_with(config: AppConfig) -> (Services, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let services = Services {
        sink: sink.clone(),
        cache: Arc::new(MemoryCache::new(Some(Duration::from_secs(300)), 1024)),
        config: Arc::new(config),
    };
    (services, sink)
}

pub fn services() -> (Services, Arc<RecordingSink>) {
    services_with(AppConfig::default())
}

pub fn context(services: &Services, event: Event, args: &str) -> HandlerContext {
    HandlerContext {
        event: Arc::new(event),
        captures: MatchCaptures {
            args: args.to_string(),
            groups: vec![Some(args.to_string())],
        },
        services: services.clone(),
    }
}

/// Replays a fixed list of events, then ends.
pub struct VecSource(VecDeque<Event>);

impl VecSource {
    pub fn new(events: impl IntoIterator<Item = Event>) -> Self {
        Self(events.into_iter().collect())
    }
}

#[async_trait]
impl EventSource for VecSource {
    async fn next_event(&mut self) -> Option<Event> {
        self.0.pop_front()
    }
}
