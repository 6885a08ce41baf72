use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use redis::{AsyncCommands, Client};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
enum CacheFailure {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
}

/// Best-effort Redis cache. Read and write failures are logged and treated as misses.
///
/// Every call, connection setup included, is bounded by `timeout`.
#[derive(Clone)]
pub struct RedisCache {
    client: Client,
    timeout: Duration,
}

impl RedisCache {
    pub async fn connect(redis_url: &str, timeout: Duration) -> Result<Self> {
        let cache = Self::open(redis_url, timeout)?;
        cache.ping().await?;
        Ok(cache)
    }

    /// Builds the client without touching the server.
    pub fn open(redis_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::open(redis_url)?;
        Ok(Self { client, timeout })
    }

    pub async fn ping(&self) -> Result<()> {
        self.bounded(async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            redis::cmd("PING").query_async::<_, String>(&mut conn).await
        })
        .await?;
        Ok(())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let read = self
            .bounded(async {
                let mut conn = self.client.get_multiplexed_async_connection().await?;
                conn.get::<_, Option<String>>(key).await
            })
            .await;

        let payload = match read {
            Ok(payload) => payload?,
            Err(err) => {
                warn!(error = %err, key, "failed to read cache");
                return None;
            }
        };

        match serde_json::from_str(&payload) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(error = ?err, key, "discarding undecodable cache entry");
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = ?err, key, "failed to encode cache entry");
                return;
            }
        };

        let write = self
            .bounded(async {
                let mut conn = self.client.get_multiplexed_async_connection().await?;
                conn.set_ex::<_, _, ()>(key, payload, ttl_seconds).await
            })
            .await;
        if let Err(err) = write {
            warn!(error = %err, key, "failed to write cache");
        }
    }

    pub async fn delete(&self, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        let removal = self
            .bounded(async {
                let mut conn = self.client.get_multiplexed_async_connection().await?;
                conn.del::<_, ()>(keys.to_vec()).await
            })
            .await;
        if let Err(err) = removal {
            warn!(error = %err, ?keys, "failed to invalidate cache");
        }
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, CacheFailure>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(CacheFailure::Timeout(self.timeout)),
        }
    }
}
