//! Redis backend: one hash per product.

use std::future::Future;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError, RedisResult};
use tokio::sync::Mutex;

use super::{FieldMap, InventoryStore};
use crate::error::{StoreError, StoreResult};

/// Store adapter over a single Redis endpoint.
///
/// The connection is opened on first use and shared by all requests. An I/O
/// failure drops it so the next request dials again; the failing command
/// itself is reported, not retried.
pub struct RedisStore {
    client: Client,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisStore {
    /// Parses `url` without connecting.
    pub fn open(url: &str) -> StoreResult<Self> {
        let client = Client::open(url)
            .map_err(|e| StoreError::unavailable(format!("invalid Redis URL {url}: {e}")))?;
        Ok(RedisStore {
            client,
            conn: Mutex::new(None),
        })
    }

    /// Round-trips a `PING`, dialing if needed.
    pub async fn ping(&self) -> StoreResult<()> {
        self.run(|mut conn| async move {
            redis::cmd("PING").query_async::<String>(&mut conn).await
        })
        .await
        .map(|_| ())
    }

    async fn connection(&self) -> StoreResult<MultiplexedConnection> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self.client.get_multiplexed_async_connection().await?;
        tracing::debug!("connected to redis");
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn run<T, F, Fut>(&self, command: F) -> StoreResult<T>
    where
        F: FnOnce(MultiplexedConnection) -> Fut + Send,
        Fut: Future<Output = RedisResult<T>> + Send,
    {
        let conn = self.connection().await?;
        match command(conn).await {
            Ok(value) => Ok(value),
            Err(e) => {
                if is_connection_fault(&e) {
                    tracing::warn!(error = %e, "redis connection lost");
                    self.conn.lock().await.take();
                }
                Err(e.into())
            }
        }
    }
}

fn is_connection_fault(e: &RedisError) -> bool {
    e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
}

#[async_trait]
impl InventoryStore for RedisStore {
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.run(|mut conn| async move { conn.exists(key).await })
            .await
    }

    async fn write_fields(&self, key: &str, fields: &FieldMap) -> StoreResult<()> {
        let items: Vec<(&str, &str)> = fields
            .iter()
            .map(|(field, value)| (field.as_str(), value.as_str()))
            .collect();
        self.run(|mut conn| async move { conn.hset_multiple(key, &items).await })
            .await
    }

    async fn read_fields(&self, key: &str) -> StoreResult<FieldMap> {
        self.run(|mut conn| async move { conn.hgetall(key).await })
            .await
    }

    async fn update_field(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let _created: i64 = self
            .run(|mut conn| async move { conn.hset(key, field, value).await })
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let removed: i64 = self
            .run(|mut conn| async move { conn.del(key).await })
            .await?;
        Ok(removed > 0)
    }

    async fn list_keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        self.run(|mut conn| async move { conn.keys(pattern).await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unparsable_url() {
        assert!(matches!(
            RedisStore::open("not a url"),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_server_reports_unavailable() {
        // Port 1 is reserved and never runs Redis.
        let store = RedisStore::open("redis://127.0.0.1:1").unwrap();
        assert!(matches!(
            store.exists("1").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.conn.lock().await.is_none());
    }
}
