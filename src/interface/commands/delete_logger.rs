//! # Delete Logger
//!
//! Deletions arrive in bursts of ids, often several events for one action.
//! Ids are collected per chat in a fixed window, merged so repeated reports of
//! the same message count once, and reported in a single log message. Only
//! messages still in the message cache are reported.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::application::aggregator::{AggregationScheduler, WindowPolicy, flush_fn};
use crate::application::handler::{Callback, HandlerContext, Services, handler};
use crate::application::pattern::CommandSpec;
use crate::application::registry::{HandlerRegistry, RegistrationId};
use crate::domain::config::AppConfig;
use crate::domain::error::CoreResult;
use crate::domain::event::EventKind;
use crate::interface::commands::message_cache;
use crate::strings::{logs, messages};

pub struct DeleteLogger {
    batches: AggregationScheduler<i64, i64>,
    window: Duration,
}

impl DeleteLogger {
    pub fn new(window: Duration) -> Self {
        Self {
            batches: AggregationScheduler::new(),
            window,
        }
    }

    pub async fn collect(&self, ctx: HandlerContext) -> Result<()> {
        let chat_id = ctx.event.chat_id;
        for &message_id in &ctx.event.deleted_ids {
            let services = ctx.services.clone();
            let on_flush = flush_fn(move |chat_id: i64, ids: Vec<i64>| {
                report(services.clone(), chat_id, ids)
            });
            self.batches
                .enqueue_unique(chat_id, message_id, self.window, WindowPolicy::Fixed, on_flush)
                .await;
        }
        Ok(())
    }
}

pub fn register(registry: &mut HandlerRegistry, config: &AppConfig) -> CoreResult<RegistrationId> {
    let logger = Arc::new(DeleteLogger::new(config.aggregation.delete_window()));
    let log_chat = config.log_chat_id;

    let batches = logger.batches.clone();
    registry.on_drain(move || {
        let batches = batches.clone();
        async move { batches.flush_all().await }
    });

    registry.register(
        "admin/log_text:deleted",
        CommandSpec::listen(&[EventKind::Deleted], move |event| {
            !event.deleted_ids.is_empty() && log_chat.is_some_and(|chat| chat != event.chat_id)
        })
        .category("admin")
        .description("Reports deleted messages to the log chat."),
        Callback::Single(handler(move |ctx| {
            let logger = Arc::clone(&logger);
            async move { logger.collect(ctx).await }
        })),
    )
}

async fn report(services: Services, chat_id: i64, mut ids: Vec<i64>) -> Result<()> {
    let Some(log_chat) = services.config.log_chat_id else {
        tracing::debug!("{}", logs::NO_LOG_CHAT);
        return Ok(());
    };
    ids.sort_unstable();

    let mut entries = Vec::with_capacity(ids.len());
    for &message_id in &ids {
        if let Some(cached) = message_cache::lookup(services.cache.as_ref(), chat_id, message_id).await {
            entries.push(messages::deleted_entry(message_id, cached.sender, &cached.text));
        }
    }
    if entries.is_empty() {
        tracing::debug!(chat = chat_id, count = ids.len(), "No cached text for deleted messages");
        return Ok(());
    }

    let count = entries.len();
    let mut lines = vec![messages::deleted_header(chat_id, count)];
    lines.extend(entries);
    services
        .sink
        .send_message(log_chat, &lines.join("\n"))
        .await
        .map_err(anyhow::Error::msg)?;
    tracing::info!(chat = chat_id, count, "Logged deleted messages");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatcher::Dispatcher;
    use crate::application::testing::{self, RecordingSink, VecSource};
    use crate::domain::event::Event;

    fn setup() -> (Dispatcher, Arc<RecordingSink>) {
        let config = AppConfig {
            log_chat_id: Some(-100),
            ..AppConfig::default()
        };
        let mut registry = HandlerRegistry::new(".");
        message_cache::register(&mut registry).unwrap();
        register(&mut registry, &config).unwrap();
        let (services, sink) = testing::services_with(config);
        (Dispatcher::new(Arc::new(registry), services), sink)
    }

    #[tokio::test(start_paused = true)]
    async fn test_deletions_are_merged_into_one_sorted_report() {
        let (dispatcher, sink) = setup();

        dispatcher.dispatch(Event::message(4, 9, 3, "nine")).await;
        dispatcher.dispatch(Event::message(4, 7, 2, "seven")).await;
        dispatcher.dispatch(Event::deleted(4, vec![9, 7])).await;
        tokio::time::advance(Duration::from_millis(1000)).await;
        dispatcher.dispatch(Event::deleted(4, vec![7, 8])).await;
        // nothing cached for this chat, so nothing is reported
        dispatcher.dispatch(Event::deleted(6, vec![1])).await;

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(
            sink.texts(),
            vec![
                [
                    messages::deleted_header(4, 2),
                    messages::deleted_entry(7, Some(2), "seven"),
                    messages::deleted_entry(9, Some(3), "nine"),
                ]
                .join("\n")
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_batch_is_reported_when_the_stream_ends() {
        let (dispatcher, sink) = setup();
        let source = VecSource::new([
            Event::message(4, 1, 2, "one"),
            Event::deleted(4, vec![1, 2]),
        ]);

        let flushed = dispatcher.run(source).await;

        assert_eq!(flushed, 1);
        assert_eq!(
            sink.texts(),
            vec![
                [
                    messages::deleted_header(4, 1),
                    messages::deleted_entry(1, Some(2), "one"),
                ]
                .join("\n")
            ]
        );
    }
}
