//! Redis cache backend (`redis` feature).

use anyhow::{Context, Result};
use async_trait::async_trait;
use ::redis::AsyncCommands;
use ::redis::aio::ConnectionManager;
use std::time::Duration;

use crate::domain::traits::Cache;

pub struct RedisCache {
    conn: ConnectionManager,
    default_ttl: Option<Duration>,
}

impl RedisCache {
    pub async fn connect(url: &str, default_ttl: Option<Duration>) -> Result<Self> {
        let client = ::redis::Client::open(url).context("Invalid redis url")?;
        let conn = ConnectionManager::new(client)
            .await
            .with_context(|| format!("Failed to connect to redis at {url}"))?;
        tracing::info!("Connected to redis cache");
        Ok(Self { conn, default_ttl })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, String> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(|e| e.to_string())
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), String> {
        let mut conn = self.conn.clone();
        let mut cmd = ::redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl.or(self.default_ttl) {
            cmd.arg("PX").arg(ttl.as_millis().max(1) as u64);
        }
        let _: () = cmd.query_async(&mut conn).await.map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, String> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await.map_err(|e| e.to_string())?;
        Ok(removed > 0)
    }
}
