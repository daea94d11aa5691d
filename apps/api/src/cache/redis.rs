use std::sync::Arc;

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands};
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{CacheError, CacheStore};

/// Redis-backed cache store.
///
/// The multiplexed connection is established on first use and dropped on any
/// command error so the next call reconnects.
pub struct RedisCache {
    client: redis::Client,
    connection: Arc<RwLock<Option<MultiplexedConnection>>>,
}

impl RedisCache {
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            connection: Arc::new(RwLock::new(None)),
        }
    }

    async fn connection(&self) -> Result<MultiplexedConnection, redis::RedisError> {
        {
            let guard = self.connection.read().await;
            if let Some(conn) = guard.as_ref() {
                return Ok(conn.clone());
            }
        }

        let mut guard = self.connection.write().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self.client.get_multiplexed_async_connection().await?;
        *guard = Some(conn.clone());
        debug!("Redis connection established");
        Ok(conn)
    }

    async fn reset(&self) {
        *self.connection.write().await = None;
        debug!("Redis connection reset after error");
    }

    /// Runs `op` on a live connection, resetting it if the command fails.
    async fn with_conn<T, F, Fut>(&self, op: F) -> Result<T, CacheError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: std::future::Future<Output = redis::RedisResult<T>>,
    {
        let conn = match self.connection().await {
            Ok(conn) => conn,
            Err(e) => {
                self.reset().await;
                return Err(e.into());
            }
        };
        match op(conn).await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.reset().await;
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let key = key.to_string();
        self.with_conn(|mut conn| async move { conn.get::<_, Option<String>>(key).await })
            .await
    }

    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> Result<(), CacheError> {
        let key = key.to_string();
        self.with_conn(|mut conn| async move {
            if ttl_seconds == 0 {
                conn.set::<_, _, ()>(key, value).await
            } else {
                conn.set_ex::<_, _, ()>(key, value, ttl_seconds).await
            }
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let key = key.to_string();
        self.with_conn(|mut conn| async move { conn.del::<_, ()>(key).await })
            .await
    }

    async fn incr(&self, key: &str) -> Result<i64, CacheError> {
        let key = key.to_string();
        self.with_conn(|mut conn| async move { conn.incr::<_, _, i64>(key, 1i64).await })
            .await
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.with_conn(|mut conn| async move {
            redis::cmd("PING")
                .query_async::<_, String>(&mut conn)
                .await
                .map(|_| ())
        })
        .await
    }
}
