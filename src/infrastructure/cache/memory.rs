//! In-process cache backend with per-entry expiry and bounded capacity.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::traits::Cache;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
    /// Insertion sequence, breaks eviction ties
    seq: u64,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Default)]
struct Store {
    entries: HashMap<String, Entry>,
    seq: u64,
}

pub struct MemoryCache {
    store: Mutex<Store>,
    default_ttl: Option<Duration>,
    max_entries: usize,
}

impl MemoryCache {
    /// `default_ttl` applies to `set` calls without an explicit TTL.
    pub fn new(default_ttl: Option<Duration>, max_entries: usize) -> Self {
        Self {
            store: Mutex::new(Store::default()),
            default_ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.store
            .lock()
            .await
            .entries
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }
}

impl Store {
    fn purge_expired(&mut self, now: Instant) {
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }

    /// Drops the entry closest to expiry; entries without expiry go last,
    /// older insertions before newer ones.
    fn evict_one(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| (entry.expires_at.is_none(), entry.expires_at, entry.seq))
            .map(|(key, _)| key.clone());
        if let Some(key) = victim {
            tracing::trace!(key = %key, "Evicted cache entry");
            self.entries.remove(&key);
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, String> {
        let now = Instant::now();
        let mut store = self.store.lock().await;
        match store.entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                store.entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), String> {
        let now = Instant::now();
        let expires_at = ttl.or(self.default_ttl).map(|ttl| now + ttl);
        let mut store = self.store.lock().await;

        if !store.entries.contains_key(key) && store.entries.len() >= self.max_entries {
            store.purge_expired(now);
            while store.entries.len() >= self.max_entries {
                store.evict_one();
            }
        }

        store.seq += 1;
        let seq = store.seq;
        store.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at,
                seq,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, String> {
        let now = Instant::now();
        let removed = self.store.lock().await.entries.remove(key);
        Ok(removed.is_some_and(|entry| !entry.is_expired(now)))
    }
}
