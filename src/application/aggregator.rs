//! # Aggregation Scheduler
//!
//! Groups bursts of related items (album parts, deletion batches) under a key and
//! hands each completed group to a flush callback once the window closes.
//!
//! - One live group per key; the group map is only touched under a single lock, so
//!   "check, create or append, (re)arm timer" is one critical section.
//! - Every armed timer carries the group's generation. Re-arming bumps the
//!   generation and aborts the old timer, and a timer only flushes if its
//!   generation still matches, so a stale expiry can never flush a newer buffer.
//! - Flush callbacks run after the group was removed and the lock released; they
//!   may enqueue again. Failures are logged and the items are dropped (at-most-once).

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use crate::application::handler::run_guarded;
use crate::domain::error::CoreError;

pub type FlushFn<K, T> =
    Arc<dyn Fn(K, Vec<T>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Wraps an async fn or closure into a [`FlushFn`].
pub fn flush_fn<K, T, F, Fut>(f: F) -> FlushFn<K, T>
where
    F: Fn(K, Vec<T>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |key, items| -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(f(key, items))
    })
}

/// How later items affect an open window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowPolicy {
    /// Every item restarts the quiet period (debounce)
    #[default]
    Sliding,
    /// The first item fixes the deadline; later items only join the buffer
    Fixed,
}

struct Group<K, T> {
    items: Vec<T>,
    generation: u64,
    timer: JoinHandle<()>,
    /// Callback of the most recent enqueue
    on_flush: FlushFn<K, T>,
}

struct Inner<K, T> {
    groups: Mutex<HashMap<K, Group<K, T>>>,
    next_generation: std::sync::atomic::AtomicU64,
}

pub struct AggregationScheduler<K, T> {
    inner: Arc<Inner<K, T>>,
}

impl<K, T> Clone for AggregationScheduler<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, T> Default for AggregationScheduler<K, T>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> AggregationScheduler<K, T>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    T: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                groups: Mutex::new(HashMap::new()),
                next_generation: std::sync::atomic::AtomicU64::new(1),
            }),
        }
    }

    /// Sliding-window enqueue: appends `item` and restarts the quiet period.
    pub async fn enqueue(&self, key: K, item: T, quiet: Duration, on_flush: FlushFn<K, T>) {
        self.enqueue_with(key, item, quiet, WindowPolicy::Sliding, on_flush)
            .await;
    }

    pub async fn enqueue_with(
        &self,
        key: K,
        item: T,
        window: Duration,
        policy: WindowPolicy,
        on_flush: FlushFn<K, T>,
    ) {
        self.insert(key, item, window, policy, on_flush, |_, _| false)
            .await;
    }

    /// Like [`enqueue_with`](Self::enqueue_with), but an item equal to one already
    /// buffered replaces it in place instead of being appended again.
    pub async fn enqueue_unique(
        &self,
        key: K,
        item: T,
        window: Duration,
        policy: WindowPolicy,
        on_flush: FlushFn<K, T>,
    ) where
        T: PartialEq,
    {
        self.insert(key, item, window, policy, on_flush, |a, b| a == b)
            .await;
    }

    async fn insert<F>(
        &self,
        key: K,
        item: T,
        window: Duration,
        policy: WindowPolicy,
        on_flush: FlushFn<K, T>,
        same: F,
    ) where
        F: Fn(&T, &T) -> bool,
    {
        let mut groups = self.inner.groups.lock().await;

        match groups.get_mut(&key) {
            Some(group) => {
                match group.items.iter_mut().find(|existing| same(existing, &item)) {
                    Some(existing) => *existing = item,
                    None => group.items.push(item),
                }
                tracing::trace!(group = ?key, pending = group.items.len(), "Item joined open group");

                if policy == WindowPolicy::Sliding {
                    group.timer.abort();
                    group.generation = self.next_generation();
                    group.timer = self.arm(key.clone(), group.generation, window);
                }
                group.on_flush = on_flush;
            }
            None => {
                let generation = self.next_generation();
                let timer = self.arm(key.clone(), generation, window);
                tracing::debug!(group = ?key, window_ms = window.as_millis() as u64, "Opened aggregation group");
                groups.insert(
                    key,
                    Group {
                        items: vec![item],
                        generation,
                        timer,
                        on_flush,
                    },
                );
            }
        }
    }

    fn next_generation(&self) -> u64 {
        self.inner
            .next_generation
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }

    fn arm(&self, key: K, generation: u64, window: Duration) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let deadline = Instant::now() + window;
        tokio::spawn(async move {
            sleep_until(deadline).await;

            let expired = {
                let mut groups = inner.groups.lock().await;
                let current = groups
                    .get(&key)
                    .is_some_and(|group| group.generation == generation);
                if current { groups.remove(&key) } else { None }
            };

            if let Some(group) = expired {
                deliver(key, group.items, group.on_flush).await;
            }
        })
    }

    /// Drops a live group without flushing it. Returns the discarded items.
    pub async fn cancel(&self, key: &K) -> Option<Vec<T>> {
        let group = self.inner.groups.lock().await.remove(key)?;
        group.timer.abort();
        tracing::debug!(group = ?key, discarded = group.items.len(), "Cancelled aggregation group");
        Some(group.items)
    }

    /// Number of items buffered under `key`.
    pub async fn pending(&self, key: &K) -> usize {
        self.inner
            .groups
            .lock()
            .await
            .get(key)
            .map_or(0, |group| group.items.len())
    }

    pub async fn live_groups(&self) -> usize {
        self.inner.groups.lock().await.len()
    }

    /// Flushes every live group immediately through its own callback,
    /// ignoring remaining windows.
    pub async fn flush_all(&self) -> usize {
        let drained: Vec<(K, Group<K, T>)> = {
            let mut groups = self.inner.groups.lock().await;
            groups.drain().collect()
        };

        let count = drained.len();
        for (key, group) in drained {
            group.timer.abort();
            deliver(key, group.items, group.on_flush).await;
        }
        count
    }

    /// Cancels every live group without flushing. Returns how many were dropped.
    pub async fn shutdown(&self) -> usize {
        let mut groups = self.inner.groups.lock().await;
        let count = groups.len();
        for (_, group) in groups.drain() {
            group.timer.abort();
        }
        if count > 0 {
            tracing::info!(dropped = count, "Aggregation scheduler shut down");
        }
        count
    }
}

async fn deliver<K: Debug, T>(key: K, items: Vec<T>, on_flush: FlushFn<K, T>) {
    let label = format!("{key:?}");
    let count = items.len();
    tracing::debug!(group = %label, items = count, "Flushing aggregation group");

    if let Err(reason) = run_guarded(on_flush(key, items)).await {
        let err = CoreError::Flush {
            group: label,
            reason,
        };
        tracing::error!(items = count, "{}", err);
    }
}
