//! # Dispatcher
//!
//! Routes each incoming event through the registry and delivers it to the
//! matching handlers: access check, rate-limit gate, then either an immediate
//! call or an enqueue into the aggregation scheduler.
//!
//! Among command-style (exclusive) matches only the first registered one runs;
//! passive listeners always run alongside it. Handler failures are logged and
//! never reach the event loop.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::application::aggregator::{AggregationScheduler, flush_fn};
use crate::application::auth::{self, Access};
use crate::application::handler::{
    Aggregation, BatchContext, BatchHandler, Callback, HandlerContext, HandlerFuture, Services,
    run_guarded,
};
use crate::application::rate_limit::{Admission, RateLimiter};
use crate::application::registry::{HandlerEntry, HandlerRegistry, RegistrationId};
use crate::domain::error::CoreError;
use crate::domain::event::Event;
use crate::domain::traits::EventSource;
use crate::strings::logs;

/// What happened to one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Entries whose matcher accepted the event
    pub matched: usize,
    /// Handlers that ran to completion
    pub invoked: usize,
    /// Items handed to the aggregation scheduler
    pub queued: usize,
    pub suppressed: usize,
    pub denied: usize,
    pub failed: usize,
}

/// A handler call decided during routing, awaited once routing is done.
struct Invocation {
    handler: RegistrationId,
    call: HandlerFuture,
}

enum Step {
    Call(HandlerFuture),
    Queued,
    Suppressed,
    Denied,
    Skipped,
}

pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    services: Services,
    limiter: RateLimiter,
    scheduler: AggregationScheduler<String, HandlerContext>,
    disabled: HashSet<String>,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>, services: Services) -> Self {
        let limiter = RateLimiter::new(
            services.cache.clone(),
            services.config.rate_limit.notice_delay(),
        );
        let disabled = services.config.disabled_commands.iter().cloned().collect();
        Self {
            registry,
            services,
            limiter,
            scheduler: AggregationScheduler::new(),
            disabled,
        }
    }

    pub async fn dispatch(&self, event: Event) -> DispatchReport {
        let (report, calls) = self.route(event).await;
        complete(report, calls).await
    }

    /// Matches `event` and settles everything that must happen in arrival
    /// order (access, rate limit, enqueue). Handler calls are returned unstarted.
    async fn route(&self, event: Event) -> (DispatchReport, Vec<Invocation>) {
        let event = Arc::new(event);
        let matches = self.registry.match_event(&event);
        let mut report = DispatchReport {
            matched: matches.len(),
            ..DispatchReport::default()
        };
        let mut calls = Vec::new();
        let mut command_taken = false;

        for (entry, captures) in matches {
            if self.disabled.contains(entry.id.as_str()) {
                tracing::trace!(handler = %entry.id, "Skipping disabled handler");
                continue;
            }
            if entry.matcher.is_exclusive() {
                if command_taken {
                    tracing::debug!(handler = %entry.id, "Shadowed by an earlier command match");
                    continue;
                }
                command_taken = true;
            }

            let ctx = HandlerContext {
                event: Arc::clone(&event),
                captures,
                services: self.services.clone(),
            };
            match self.deliver(entry, ctx).await {
                Step::Call(call) => calls.push(Invocation {
                    handler: entry.id.clone(),
                    call,
                }),
                Step::Queued => report.queued += 1,
                Step::Suppressed => report.suppressed += 1,
                Step::Denied => report.denied += 1,
                Step::Skipped => {}
            }
        }
        (report, calls)
    }

    async fn deliver(&self, entry: &HandlerEntry, ctx: HandlerContext) -> Step {
        if let Access::Denied(notice) = auth::check(&entry.matcher.meta, ctx.event.sender_id, ctx.config()) {
            tokio::spawn(async move { auth::deny(&ctx, notice).await });
            return Step::Denied;
        }

        if let Some(limit) = &entry.rate_limit {
            match self.limiter.admit(&ctx, entry.rate_scope(), limit.window).await {
                Admission::Allowed => {}
                Admission::Suppressed { remaining } => {
                    let limiter = self.limiter.clone();
                    tokio::spawn(async move { limiter.notify(&ctx, remaining).await });
                    return Step::Suppressed;
                }
                Admission::NoActor => return Step::Skipped,
            }
        }

        match &entry.callback {
            Callback::Single(handler) => Step::Call(handler(ctx)),
            Callback::Batched {
                handler,
                aggregation,
            } => match (aggregation.key)(&*ctx.event) {
                Some(group) => {
                    self.enqueue(entry, group, ctx, handler, aggregation).await;
                    Step::Queued
                }
                None => Step::Call(handler(BatchContext {
                    group: entry.id.to_string(),
                    items: vec![ctx],
                })),
            },
        }
    }

    async fn enqueue(
        &self,
        entry: &HandlerEntry,
        group: String,
        ctx: HandlerContext,
        handler: &BatchHandler,
        aggregation: &Aggregation,
    ) {
        let handler = Arc::clone(handler);
        let on_flush = flush_fn(move |group: String, items: Vec<HandlerContext>| {
            handler(BatchContext { group, items })
        });
        self.scheduler
            .enqueue_with(
                format!("{}:{}", entry.id, group),
                ctx,
                aggregation.quiet,
                aggregation.policy,
                on_flush,
            )
            .await;
    }

    /// Flushes the open aggregation groups, including those buffered by
    /// handlers themselves. Returns the number of flushed groups.
    pub async fn drain(&self) -> usize {
        let mut flushed = self.scheduler.flush_all().await;
        for hook in self.registry.drain_hooks() {
            flushed += hook().await;
        }
        flushed
    }

    /// Drives `source` until it ends. Events are routed one after another on
    /// this loop, so grouped items are buffered in arrival order; the handler
    /// calls of each event then run on their own task. Once the stream closes,
    /// in-flight calls are awaited and open groups drained. Returns the number
    /// of flushed groups.
    pub async fn run<S: EventSource>(&self, mut source: S) -> usize {
        let mut tasks = JoinSet::new();
        tracing::info!("{}", logs::LISTENING);

        while let Some(event) = source.next_event().await {
            let (report, calls) = self.route(event).await;
            tasks.spawn(async move {
                let report = complete(report, calls).await;
                tracing::trace!(?report, "Event dispatched");
            });
            while let Some(done) = tasks.try_join_next() {
                if let Err(e) = done {
                    tracing::error!("Dispatch task aborted: {e}");
                }
            }
        }

        tracing::info!("{}", logs::SOURCE_CLOSED);
        while let Some(done) = tasks.join_next().await {
            if let Err(e) = done {
                tracing::error!("Dispatch task aborted: {e}");
            }
        }
        let flushed = self.drain().await;
        tracing::info!("{}", logs::drained(flushed));
        flushed
    }
}

/// Awaits the routed calls of one event, isolating failures and panics.
async fn complete(mut report: DispatchReport, calls: Vec<Invocation>) -> DispatchReport {
    for Invocation { handler, call } in calls {
        tracing::debug!(%handler, "Invoking handler");
        match run_guarded(call).await {
            Ok(()) => report.invoked += 1,
            Err(reason) => {
                let err = CoreError::HandlerExecution {
                    handler: handler.to_string(),
                    reason,
                };
                tracing::error!("{}", err);
                report.failed += 1;
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handler::{RateLimit, batch_handler, handler};
    use crate::application::pattern::CommandSpec;
    use crate::application::testing::{self, RecordingSink, VecSource};
    use crate::domain::config::AppConfig;
    use crate::domain::event::EventKind;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn recording(log: &Arc<Mutex<Vec<String>>>, name: &str) -> Callback {
        let log = log.clone();
        let name = name.to_string();
        Callback::Single(handler(move |ctx| {
            let log = log.clone();
            let name = name.clone();
            async move {
                log.lock().unwrap().push(format!("{name}:{}", ctx.args()));
                Ok(())
            }
        }))
    }

    fn dispatcher(registry: HandlerRegistry, config: AppConfig) -> (Dispatcher, Arc<RecordingSink>) {
        let (services, sink) = testing::services_with(config);
        (Dispatcher::new(Arc::new(registry), services), sink)
    }

    #[tokio::test]
    async fn test_first_command_match_wins_and_listeners_still_fire() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new(".");
        registry
            .register("ping", CommandSpec::command(["ping", "p"]), recording(&log, "ping"))
            .unwrap();
        registry
            .register(
                "ping-pattern",
                CommandSpec::regex(r"(?i)\.p(\w*)").exclusive(true),
                recording(&log, "pattern"),
            )
            .unwrap();
        registry
            .register(
                "listener",
                CommandSpec::listen(&[EventKind::NewMessage], |_| true),
                recording(&log, "listener"),
            )
            .unwrap();
        let (dispatcher, _) = dispatcher(registry, AppConfig::default());

        let report = dispatcher
            .dispatch(Event::message(1, 1, 1, ".P hello").outgoing())
            .await;

        assert_eq!(report.matched, 3);
        assert_eq!(report.invoked, 2);
        assert_eq!(*log.lock().unwrap(), vec!["ping:hello", "listener:.P hello"]);
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stop_the_next_event() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new(".");
        registry
            .register(
                "boom",
                CommandSpec::command(["boom"]),
                Callback::Single(handler(|_ctx| async { anyhow::bail!("exploded") })),
            )
            .unwrap();
        registry
            .register(
                "panic",
                CommandSpec::command(["panic"]),
                Callback::Single(handler(|_ctx| async {
                    if true {
                        panic!("handler bug");
                    }
                    Ok(())
                })),
            )
            .unwrap();
        registry
            .register("echo", CommandSpec::command(["echo"]), recording(&log, "echo"))
            .unwrap();
        let (dispatcher, _) = dispatcher(registry, AppConfig::default());

        let failed = dispatcher.dispatch(Event::message(1, 1, 1, ".boom").outgoing()).await;
        assert_eq!(failed.failed, 1);
        let panicked = dispatcher.dispatch(Event::message(1, 2, 1, ".panic").outgoing()).await;
        assert_eq!(panicked.failed, 1);

        let ok = dispatcher.dispatch(Event::message(1, 3, 1, ".echo hi").outgoing()).await;
        assert_eq!(ok.invoked, 1);
        assert_eq!(*log.lock().unwrap(), vec!["echo:hi"]);
    }

    #[tokio::test]
    async fn test_disabled_handler_is_skipped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new(".");
        registry
            .register("first", CommandSpec::command(["a"]), recording(&log, "first"))
            .unwrap();
        registry
            .register(
                "second",
                CommandSpec::regex(r"\.a").exclusive(true),
                recording(&log, "second"),
            )
            .unwrap();
        let config = AppConfig {
            disabled_commands: vec!["first".to_string()],
            ..AppConfig::default()
        };
        let (dispatcher, _) = dispatcher(registry, config);

        dispatcher.dispatch(Event::message(1, 1, 1, ".a").outgoing()).await;
        assert_eq!(*log.lock().unwrap(), vec!["second:"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new(".");
        registry
            .register_with(
                "ping",
                CommandSpec::command(["ping"]),
                recording(&log, "ping"),
                Some(RateLimit::per(Duration::from_secs(5))),
            )
            .unwrap();
        let (dispatcher, _) = dispatcher(registry, AppConfig::default());
        let event = Event::message(1, 1, 7, ".ping").outgoing();

        assert_eq!(dispatcher.dispatch(event.clone()).await.invoked, 1);
        assert_eq!(dispatcher.dispatch(event.clone()).await.suppressed, 1);
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(dispatcher.dispatch(event).await.invoked, 1);
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restricted_handler_denies_strangers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new(".");
        registry
            .register(
                "secret",
                CommandSpec::command(["secret"])
                    .admin_only()
                    .direction(crate::application::pattern::Direction::Any),
                recording(&log, "secret"),
            )
            .unwrap();
        let config = AppConfig {
            owner_id: Some(1),
            ..AppConfig::default()
        };
        let (dispatcher, sink) = dispatcher(registry, config);

        let denied = dispatcher.dispatch(Event::message(1, 9, 2, ".secret")).await;
        assert_eq!(denied.denied, 1);
        let allowed = dispatcher.dispatch(Event::message(1, 10, 1, ".secret")).await;
        assert_eq!(allowed.invoked, 1);

        tokio::time::sleep(auth::DENIAL_NOTICE * 2).await;
        assert_eq!(*log.lock().unwrap(), vec!["secret:"]);
        assert!(sink.actions().contains(&testing::Action::Delete { chat: 1, message: 9 }));
    }

    fn album_registry(tx: mpsc::UnboundedSender<(String, Vec<i64>)>) -> HandlerRegistry {
        let mut registry = HandlerRegistry::new(".");
        registry
            .register(
                "albums",
                CommandSpec::listen(&[EventKind::NewMessage], |event| event.has_media),
                Callback::Batched {
                    handler: batch_handler(move |batch: BatchContext| {
                        let tx = tx.clone();
                        async move {
                            let ids = batch.items.iter().map(|ctx| ctx.event.message_id).collect();
                            let _ = tx.send((batch.group, ids));
                            Ok(())
                        }
                    }),
                    aggregation: Aggregation::sliding(Duration::from_millis(2500), |event| {
                        event
                            .grouped_id
                            .map(|grouped| format!("{}:{grouped}", event.chat_id))
                    }),
                },
            )
            .unwrap();
        registry
    }

    #[tokio::test(start_paused = true)]
    async fn test_batched_handler_routes_through_scheduler() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (dispatcher, _) = dispatcher(album_registry(tx), AppConfig::default());

        for id in 1..=3 {
            let report = dispatcher
                .dispatch(Event::message(5, id, 9, "").with_media(Some(77)))
                .await;
            assert_eq!(report.queued, 1);
            tokio::time::advance(Duration::from_millis(500)).await;
        }
        // no grouping key: delivered alone, immediately
        let single = dispatcher
            .dispatch(Event::message(5, 10, 9, "").with_media(None))
            .await;
        assert_eq!(single.invoked, 1);
        assert_eq!(rx.recv().await.unwrap(), ("albums".to_string(), vec![10]));

        let (group, ids) = rx.recv().await.unwrap();
        assert_eq!(group, "albums:5:77");
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_flushes_open_groups_at_end_of_stream() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (dispatcher, _) = dispatcher(album_registry(tx), AppConfig::default());
        let source = VecSource::new(
            [1, 2].map(|id| Event::message(5, id, 9, "").with_media(Some(3))),
        );

        let flushed = dispatcher.run(source).await;
        assert_eq!(flushed, 1);
        assert_eq!(rx.try_recv().unwrap(), ("albums:5:3".to_string(), vec![1, 2]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_run_keeps_album_parts_in_arrival_order() {
        for round in 0..50 {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let (dispatcher, _) = dispatcher(album_registry(tx), AppConfig::default());
            let source = VecSource::new(
                (1..=10).map(|id| Event::message(5, id, 9, "").with_media(Some(round))),
            );

            assert_eq!(dispatcher.run(source).await, 1);
            let (_, ids) = rx.try_recv().unwrap();
            assert_eq!(ids, (1..=10).collect::<Vec<i64>>(), "round {round}");
        }
    }
}
