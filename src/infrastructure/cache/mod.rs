//! # Cache Backends
//!
//! Implementations of the domain `Cache` trait, selected by `cache.backend`.

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::config::{CacheBackend, CacheConfig};
use crate::domain::traits::Cache;

/// Builds the configured backend. `default_ttl_secs = 0` means no default expiry.
pub async fn build(config: &CacheConfig) -> Result<Arc<dyn Cache>> {
    let default_ttl = (config.default_ttl_secs > 0)
        .then(|| Duration::from_secs(config.default_ttl_secs));

    match config.backend {
        CacheBackend::Memory => Ok(Arc::new(memory::MemoryCache::new(
            default_ttl,
            config.max_entries,
        ))),
        #[cfg(feature = "redis")]
        CacheBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("cache.redis_url is required for the redis backend"))?;
            Ok(Arc::new(redis::RedisCache::connect(url, default_ttl).await?))
        }
        #[cfg(not(feature = "redis"))]
        CacheBackend::Redis => {
            anyhow::bail!("herald was built without the `redis` feature")
        }
    }
}
