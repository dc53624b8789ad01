//! Remembers incoming message text so deletions can be reported later.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::handler::{Callback, HandlerContext, handler};
use crate::application::pattern::CommandSpec;
use crate::application::registry::{HandlerRegistry, RegistrationId};
use crate::domain::error::{CoreError, CoreResult};
use crate::domain::event::EventKind;
use crate::domain::traits::Cache;

pub const RETENTION: Duration = Duration::from_secs(3 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedMessage {
    pub text: String,
    pub sender: Option<i64>,
}

pub fn cache_key(chat_id: i64, message_id: i64) -> String {
    format!("message:{chat_id}:{message_id}")
}

pub fn register(registry: &mut HandlerRegistry) -> CoreResult<RegistrationId> {
    registry.register(
        "admin/log_text:cache",
        CommandSpec::listen(&[EventKind::NewMessage, EventKind::Edited], |event| {
            !event.outgoing && !event.text.is_empty()
        })
        .category("admin")
        .description("Keeps incoming messages for three days so deletions can be reported."),
        Callback::Single(handler(remember)),
    )
}

/// Edits overwrite the earlier text.
pub async fn remember(ctx: HandlerContext) -> Result<()> {
    let entry = CachedMessage {
        text: ctx.event.text.clone(),
        sender: ctx.event.sender_id,
    };
    ctx.cache()
        .set(
            &cache_key(ctx.event.chat_id, ctx.event.message_id),
            serde_json::to_string(&entry)?,
            Some(RETENTION),
        )
        .await
        .map_err(CoreError::Cache)?;
    Ok(())
}

pub async fn lookup(cache: &dyn Cache, chat_id: i64, message_id: i64) -> Option<CachedMessage> {
    match cache.get(&cache_key(chat_id, message_id)).await {
        Ok(Some(raw)) => serde_json::from_str(&raw)
            .inspect_err(|e| tracing::warn!(message = message_id, "Unreadable cached message: {e}"))
            .ok(),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("{}", CoreError::Cache(e));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatcher::Dispatcher;
    use crate::application::testing;
    use crate::domain::event::Event;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_incoming_text_is_cached_and_edits_overwrite() {
        let mut registry = HandlerRegistry::new(".");
        register(&mut registry).unwrap();
        let (services, _) = testing::services();
        let cache = services.cache.clone();
        let dispatcher = Dispatcher::new(Arc::new(registry), services);

        dispatcher.dispatch(Event::message(3, 30, 8, "hello")).await;
        dispatcher.dispatch(Event::message(3, 31, 1, "mine").outgoing()).await;
        assert_eq!(
            lookup(cache.as_ref(), 3, 30).await,
            Some(CachedMessage {
                text: "hello".to_string(),
                sender: Some(8)
            })
        );
        assert_eq!(lookup(cache.as_ref(), 3, 31).await, None);

        dispatcher.dispatch(Event::edited(3, 30, 8, "hello again")).await;
        assert_eq!(
            lookup(cache.as_ref(), 3, 30).await.map(|entry| entry.text),
            Some("hello again".to_string())
        );
    }
}
