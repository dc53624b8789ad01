//! # Rate Limiter
//!
//! Single-flight gate per (scope, sender) pair. The last invocation time lives
//! in the external cache with a TTL equal to the window, so expiry needs no
//! cleanup task.
//!
//! The check-then-set sequence is not atomic: two calls from the same sender
//! racing inside the same instant may both pass.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::application::handler::{Handler, HandlerContext, handler};
use crate::domain::traits::Cache;
use crate::strings::messages;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Suppressed { remaining: Duration },
    /// The event carries no sender; nothing runs and nothing is recorded
    NoActor,
}

#[derive(Clone)]
pub struct RateLimiter {
    cache: Arc<dyn Cache>,
    notice_delay: Duration,
}

impl RateLimiter {
    pub fn new(cache: Arc<dyn Cache>, notice_delay: Duration) -> Self {
        Self {
            cache,
            notice_delay,
        }
    }

    pub fn cache_key(scope: &str, sender_id: i64) -> String {
        format!("rate_limit:{scope}:{sender_id}")
    }

    /// Checks the record for `scope` and the event's sender. An admitted call
    /// is recorded before returning. Cache failures admit the call.
    pub async fn admit(&self, ctx: &HandlerContext, scope: &str, window: Duration) -> Admission {
        let Some(sender_id) = ctx.event.sender_id else {
            return Admission::NoActor;
        };
        let key = Self::cache_key(scope, sender_id);
        let now_ms = Utc::now().timestamp_millis();

        match self.cache.get(&key).await {
            Ok(Some(recorded)) => {
                if let Some(remaining) = remaining(&recorded, now_ms, window) {
                    tracing::debug!(
                        scope,
                        sender = sender_id,
                        remaining_ms = remaining.as_millis() as u64,
                        "Rate limit active"
                    );
                    return Admission::Suppressed { remaining };
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(scope, "Rate limit lookup failed, allowing call: {e}"),
        }

        if let Err(e) = self
            .cache
            .set(&key, now_ms.to_string(), Some(window))
            .await
        {
            tracing::warn!(scope, "Failed to record rate limit: {e}");
        }
        Admission::Allowed
    }

    /// Edits the warning into the triggering message, waits, then restores the
    /// original text.
    pub async fn notify(&self, ctx: &HandlerContext, remaining: Duration) {
        if let Err(e) = ctx.edit(&messages::rate_limited(remaining)).await {
            tracing::debug!("Could not show rate-limit notice: {e:#}");
            return;
        }
        tokio::time::sleep(self.notice_delay).await;
        if let Err(e) = ctx.edit(&ctx.event.text).await {
            tracing::debug!("Could not restore message after rate-limit notice: {e:#}");
        }
    }

    /// Wraps `inner` so it runs at most once per `window` for each sender.
    pub fn guard(&self, scope: &str, window: Duration, inner: Handler) -> Handler {
        let limiter = self.clone();
        let scope = scope.to_string();
        handler(move |ctx: HandlerContext| {
            let limiter = limiter.clone();
            let scope = scope.clone();
            let inner = Arc::clone(&inner);
            async move {
                match limiter.admit(&ctx, &scope, window).await {
                    Admission::Allowed => inner(ctx).await,
                    Admission::Suppressed { remaining } => {
                        limiter.notify(&ctx, remaining).await;
                        Ok(())
                    }
                    Admission::NoActor => Ok(()),
                }
            }
        })
    }
}

/// Time left in the window, `None` once it has passed or the record is unreadable.
fn remaining(recorded: &str, now_ms: i64, window: Duration) -> Option<Duration> {
    let recorded: i64 = recorded.parse().ok()?;
    let elapsed = Duration::from_millis(now_ms.saturating_sub(recorded).max(0) as u64);
    let left = window.checked_sub(elapsed)?;
    (!left.is_zero()).then_some(left)
}
