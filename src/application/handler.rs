//! # Handler Contract
//!
//! Callback types and the per-invocation context the dispatcher hands to handlers.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use crate::application::aggregator::WindowPolicy;
use crate::application::pattern::MatchCaptures;
use crate::domain::config::AppConfig;
use crate::domain::event::Event;
use crate::domain::traits::{ActionSink, Cache};

pub type HandlerFuture = BoxFuture<'static, anyhow::Result<()>>;
pub type Handler = Arc<dyn Fn(HandlerContext) -> HandlerFuture + Send + Sync>;
pub type BatchHandler = Arc<dyn Fn(BatchContext) -> HandlerFuture + Send + Sync>;
pub type GroupKeyFn = Arc<dyn Fn(&Event) -> Option<String> + Send + Sync>;

/// Wraps an async fn or closure into a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |ctx| -> HandlerFuture { Box::pin(f(ctx)) })
}

/// Wraps an async fn or closure into a [`BatchHandler`].
pub fn batch_handler<F, Fut>(f: F) -> BatchHandler
where
    F: Fn(BatchContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |batch| -> HandlerFuture { Box::pin(f(batch)) })
}

/// Shared collaborators available to every handler.
#[derive(Clone)]
pub struct Services {
    pub sink: Arc<dyn ActionSink>,
    pub cache: Arc<dyn Cache>,
    pub config: Arc<AppConfig>,
}

/// Everything a handler needs for one matched event.
#[derive(Clone)]
pub struct HandlerContext {
    pub event: Arc<Event>,
    pub captures: MatchCaptures,
    pub services: Services,
}

impl HandlerContext {
    /// Captured trailing argument text.
    pub fn args(&self) -> &str {
        &self.captures.args
    }

    pub fn sink(&self) -> &Arc<dyn ActionSink> {
        &self.services.sink
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.services.cache
    }

    pub fn config(&self) -> &AppConfig {
        &self.services.config
    }

    /// Edits the triggering message in place.
    pub async fn edit(&self, content: &str) -> anyhow::Result<()> {
        self.services
            .sink
            .edit_message(self.event.chat_id, self.event.message_id, content)
            .await
            .map_err(|e| anyhow::anyhow!(e))
    }
}

/// A flushed aggregation group.
pub struct BatchContext {
    pub group: String,
    /// Items in arrival order
    pub items: Vec<HandlerContext>,
}

/// Debounce settings for handlers that consume grouped events.
#[derive(Clone)]
pub struct Aggregation {
    /// Grouping key; `None` means the event is delivered alone, immediately.
    pub key: GroupKeyFn,
    pub quiet: Duration,
    pub policy: WindowPolicy,
}

impl Aggregation {
    pub fn sliding<F>(quiet: Duration, key: F) -> Self
    where
        F: Fn(&Event) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            key: Arc::new(key),
            quiet,
            policy: WindowPolicy::Sliding,
        }
    }

    pub fn fixed<F>(window: Duration, key: F) -> Self
    where
        F: Fn(&Event) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            key: Arc::new(key),
            quiet: window,
            policy: WindowPolicy::Fixed,
        }
    }
}

#[derive(Clone)]
pub enum Callback {
    Single(Handler),
    Batched {
        handler: BatchHandler,
        aggregation: Aggregation,
    },
}

/// Single-flight window for a handler. Handlers sharing `scope` share one limit.
#[derive(Debug, Clone)]
pub struct RateLimit {
    pub window: Duration,
    pub scope: Option<String>,
}

impl RateLimit {
    pub fn per(window: Duration) -> Self {
        Self {
            window,
            scope: None,
        }
    }

    pub fn named(window: Duration, scope: &str) -> Self {
        Self {
            window,
            scope: Some(scope.to_string()),
        }
    }
}

/// Awaits `fut`, turning both errors and panics into a message.
pub async fn run_guarded<F>(fut: F) -> Result<(), String>
where
    F: Future<Output = anyhow::Result<()>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(format!("{e:#}")),
        Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
