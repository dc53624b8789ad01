//! # Album Logger
//!
//! Forwards incoming media to the log chat. Album parts arrive as separate
//! events sharing a `grouped_id`; they are collected with a sliding window and
//! forwarded together, followed by one caption.

use anyhow::Result;

use crate::application::handler::{Aggregation, BatchContext, Callback, batch_handler};
use crate::application::pattern::CommandSpec;
use crate::application::registry::{HandlerRegistry, RegistrationId};
use crate::domain::config::AppConfig;
use crate::domain::error::CoreResult;
use crate::domain::event::{Event, EventKind};
use crate::strings::{logs, messages};

pub fn register(registry: &mut HandlerRegistry, config: &AppConfig) -> CoreResult<RegistrationId> {
    let log_chat = config.log_chat_id;
    registry.register(
        "admin/media_logger:albums",
        CommandSpec::listen(&[EventKind::NewMessage], move |event| {
            event.has_media
                && !event.outgoing
                && event.sender_id.is_some()
                && log_chat.is_some_and(|chat| chat != event.chat_id)
        })
        .category("admin")
        .description("Forwards incoming media to the log chat, one report per album."),
        Callback::Batched {
            handler: batch_handler(forward_album),
            aggregation: Aggregation::sliding(config.aggregation.album_quiet(), album_key),
        },
    )
}

/// Album parts group per chat; single media items are not grouped.
pub fn album_key(event: &Event) -> Option<String> {
    event
        .grouped_id
        .map(|grouped_id| format!("{}:{grouped_id}", event.chat_id))
}

pub async fn forward_album(batch: BatchContext) -> Result<()> {
    let Some(first) = batch.items.first() else {
        return Ok(());
    };
    let Some(log_chat) = first.config().log_chat_id else {
        tracing::debug!("{}", logs::NO_LOG_CHAT);
        return Ok(());
    };

    let ids: Vec<i64> = batch.items.iter().map(|ctx| ctx.event.message_id).collect();
    first
        .sink()
        .forward_messages(log_chat, first.event.chat_id, &ids)
        .await
        .map_err(anyhow::Error::msg)?;

    let text = batch
        .items
        .iter()
        .map(|ctx| ctx.event.text.as_str())
        .find(|text| !text.is_empty());
    let caption = messages::album_caption(first.event.sender_id, first.event.chat_id, ids.len(), text);
    first
        .sink()
        .send_message(log_chat, &caption)
        .await
        .map_err(anyhow::Error::msg)?;

    tracing::info!(group = %batch.group, items = ids.len(), "Logged media");
    Ok(())
}
