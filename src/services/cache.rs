//! Redis read-through cache for listings and profiles.
//!
//! Values are stored as JSON with a TTL. Cache failures are logged and
//! treated as misses so a Redis outage only costs latency.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Redis cache client with connection pooling.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    default_ttl: Duration,
}

impl RedisCache {
    pub async fn new(redis_url: &str, default_ttl_seconds: u64) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        tracing::info!("Redis cache connected");

        Ok(Self {
            conn,
            default_ttl: Duration::from_secs(default_ttl_seconds),
        })
    }

    #[instrument(skip(self), fields(cache_hit))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn.clone();

        let hit = match conn.get::<_, Option<String>>(key).await {
            Ok(Some(data)) => match serde_json::from_str(&data) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key, error = %e, "Failed to deserialize cached value");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "Redis get error");
                None
            }
        };

        tracing::Span::current().record("cache_hit", hit.is_some());
        hit
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_with_ttl(key, value, self.default_ttl).await
    }

    #[instrument(skip(self, value))]
    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let mut conn = self.conn.clone();

        let data = serde_json::to_string(value).context("Failed to serialize value for cache")?;

        conn.set_ex::<_, _, ()>(key, data, ttl.as_secs())
            .await
            .context("Failed to set cache value")?;

        debug!(key, ttl_secs = ttl.as_secs(), "Cached value");
        Ok(())
    }

    /// Return the cached value or compute, store and return it.
    pub async fn get_or_load<T, E, F, Fut>(&self, key: &str, load: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let value = load().await?;
        if let Err(e) = self.set(key, &value).await {
            warn!(key, error = %e, "Failed to populate cache");
        }
        Ok(value)
    }

    /// Drop keys after a write. Never fails the caller.
    #[instrument(skip(self))]
    pub async fn invalidate(&self, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        let mut conn = self.conn.clone();
        match conn.del::<_, i64>(keys).await {
            Ok(deleted) => debug!(deleted, "Cache invalidated"),
            Err(e) => warn!(error = %e, "Cache invalidation failed"),
        }
    }

    /// Delete all keys matching a pattern (e.g. "listing:*").
    #[instrument(skip(self))]
    pub async fn delete_pattern(&self, pattern: &str) -> Result<usize> {
        let mut conn = self.conn.clone();

        let mut cursor: u64 = 0;
        let mut keys: Vec<String> = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .cursor_arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(1000)
                .query_async(&mut conn)
                .await
                .context("Failed to scan cache keys")?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        if keys.is_empty() {
            return Ok(0);
        }

        let deleted: i64 = conn.del(&keys).await.context("Failed to delete cache keys")?;

        debug!(pattern, deleted, "Cache pattern delete");
        Ok(deleted as usize)
    }

    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis health check failed")?;
        Ok(())
    }
}

/// Cache key builders for consistent key formats.
pub mod keys {
    use uuid::Uuid;

    /// Every active listing, the input of the browse filter
    pub fn active_listings() -> String {
        "listings:active".to_string()
    }

    pub fn listing(listing_id: Uuid) -> String {
        format!("listing:{}", listing_id)
    }

    pub fn profile(user_id: Uuid) -> String {
        format!("profile:{}", user_id)
    }

    /// Keys to drop after any write to a listing
    pub fn listing_writes(listing_id: Uuid) -> Vec<String> {
        vec![active_listings(), listing(listing_id)]
    }

    /// Pattern matching every cached listing detail
    pub fn listing_pattern() -> &'static str {
        "listing:*"
    }
}

#[cfg(test)]
mod tests {
    use super::keys;
    use uuid::Uuid;

    #[test]
    fn listing_writes_cover_detail_and_browse_set() {
        let id = Uuid::nil();
        assert_eq!(
            keys::listing_writes(id),
            vec![
                "listings:active".to_string(),
                "listing:00000000-0000-0000-0000-000000000000".to_string()
            ]
        );
    }

    #[test]
    fn browse_set_is_outside_the_detail_pattern() {
        // "listings:active" must survive a "listing:*" sweep
        assert!(!keys::active_listings().starts_with("listing:"));
        assert!(keys::profile(Uuid::nil()).starts_with("profile:"));
    }
}
