use super::{Cache, CacheError, CacheResult};
use redis::{AsyncCommands, Client};
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;

/// Redis cache implementation with single connection and reconnection logic
pub struct RedisCache {
    client: Client,
    connection: Arc<Mutex<Option<redis::aio::MultiplexedConnection>>>,
    key_prefix: String,
}

impl RedisCache {
    pub fn new(redis_url: &str, key_prefix: String) -> CacheResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| CacheError::Cache(format!("Redis client error: {}", e)))?;

        Ok(Self {
            client,
            connection: Arc::new(Mutex::new(None)),
            key_prefix,
        })
    }

    /// Get a working Redis connection, creating or reusing existing one
    async fn get_connection(&self) -> CacheResult<redis::aio::MultiplexedConnection> {
        let mut conn_guard = self.connection.lock().await;

        // Try to reuse existing connection
        if let Some(conn) = conn_guard.take() {
            if self.test_connection(&conn).await.is_ok() {
                return Ok(conn);
            }
        }

        let new_conn = self
            .client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| CacheError::Connection(format!("Connection failed: {}", e)))?;

        Ok(new_conn)
    }

    async fn test_connection(
        &self,
        conn: &redis::aio::MultiplexedConnection,
    ) -> Result<(), redis::RedisError> {
        let mut conn = conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// Return connection to storage for reuse
    async fn return_connection(&self, conn: redis::aio::MultiplexedConnection) {
        *self.connection.lock().await = Some(conn);
    }

    /// Add key prefix to avoid conflicts
    fn prefixed_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    pub async fn health_check(&self) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Cache(format!("Ping failed: {}", e)))?;

        self.return_connection(conn).await;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Cache for RedisCache {
    async fn get<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        let key = self.prefixed_key(key);
        let mut conn = self.get_connection().await?;

        let result: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| CacheError::Cache(e.to_string()))?;

        self.return_connection(conn).await;

        match result {
            Some(data) => {
                let value = serde_json::from_str::<T>(&data)
                    .map_err(|e| CacheError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> CacheResult<()>
    where
        T: serde::Serialize + Send + Sync,
    {
        let key = self.prefixed_key(key);
        let data =
            serde_json::to_string(value).map_err(|e| CacheError::Serialization(e.to_string()))?;

        let mut conn = self.get_connection().await?;

        if let Some(ttl) = ttl {
            let _: () = conn
                .set_ex(&key, &data, ttl.as_secs())
                .await
                .map_err(|e| CacheError::Cache(e.to_string()))?;
        } else {
            let _: () = conn
                .set(&key, &data)
                .await
                .map_err(|e| CacheError::Cache(e.to_string()))?;
        }

        self.return_connection(conn).await;

        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let key = self.prefixed_key(key);
        let mut conn = self.get_connection().await?;

        let _: () = conn
            .del(&key)
            .await
            .map_err(|e| CacheError::Cache(e.to_string()))?;

        self.return_connection(conn).await;
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let key = self.prefixed_key(key);
        let mut conn = self.get_connection().await?;

        let exists: bool = conn
            .exists(&key)
            .await
            .map_err(|e| CacheError::Cache(e.to_string()))?;

        self.return_connection(conn).await;
        Ok(exists)
    }

    async fn take<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        let key = self.prefixed_key(key);
        let mut conn = self.get_connection().await?;

        // GETDEL is atomic server-side, so concurrent takers race safely.
        let result: Option<String> = redis::cmd("GETDEL")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Cache(e.to_string()))?;

        self.return_connection(conn).await;

        match result {
            Some(data) => {
                let value = serde_json::from_str::<T>(&data)
                    .map_err(|e| CacheError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_redis_cache_new() {
        // Client creation succeeds even without a running Redis instance
        let result = RedisCache::new("redis://localhost:6379", "test:".to_string());
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_redis_cache_key_prefix() {
        let cache = RedisCache::new("redis://localhost:6379", "test:".to_string()).unwrap();
        let prefixed = cache.prefixed_key("my_key");
        assert_eq!(prefixed, "test:my_key");
    }
}
