//! TTL-capable cache backing the state store and the token blocklist.

use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use thiserror::Error;

pub mod memory;
pub mod redis;

pub use memory::MemoryCache;
pub use redis::RedisCache;

use crate::config::CacheConfig;

/// Cache error types
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache error: {0}")]
    Cache(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Backend contract. `take` must be atomic: when two callers race on the same
/// key, at most one of them observes the value.
#[async_trait::async_trait]
pub trait Cache: Send + Sync {
    async fn get<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned + Send;

    async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> CacheResult<()>
    where
        T: Serialize + Send + Sync;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Atomically read and delete a key.
    async fn take<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned + Send;
}

/// Backend selection happens once at startup; callers hold a `CacheManager`
/// and never see the concrete backend.
pub enum CacheManager {
    Memory(MemoryCache),
    Redis(RedisCache),
}

impl CacheManager {
    /// Create cache manager with a memory backend (tests / single instance).
    pub fn new_memory() -> Self {
        CacheManager::Memory(MemoryCache::new())
    }

    pub fn new_from_config(config: &CacheConfig) -> CacheResult<Self> {
        match config.backend.as_str() {
            "redis" => Ok(CacheManager::Redis(RedisCache::new(
                &config.redis_url,
                config.key_prefix.clone(),
            )?)),
            "memory" => Ok(CacheManager::Memory(MemoryCache::new())),
            other => Err(CacheError::Cache(format!(
                "Unknown cache backend: {other}"
            ))),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            CacheManager::Memory(_) => "memory",
            CacheManager::Redis(_) => "redis",
        }
    }

    pub async fn health_check(&self) -> CacheResult<()> {
        match self {
            CacheManager::Memory(_) => Ok(()),
            CacheManager::Redis(redis) => redis.health_check().await,
        }
    }
}

#[async_trait::async_trait]
impl crate::health::HealthChecker for CacheManager {
    fn name(&self) -> &str {
        "cache"
    }

    async fn check(&self) -> crate::health::HealthCheckResult {
        match self.health_check().await {
            Ok(_) => crate::health::HealthCheckResult::healthy_with_details(serde_json::json!({
                "backend": self.backend_name(),
            })),
            Err(err) => crate::health::HealthCheckResult::unhealthy_with_details(
                "Cache health check failed".to_string(),
                serde_json::json!({
                    "backend": self.backend_name(),
                    "error": err.to_string(),
                }),
            ),
        }
    }
}

#[async_trait::async_trait]
impl Cache for CacheManager {
    async fn get<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self {
            CacheManager::Memory(c) => c.get(key).await,
            CacheManager::Redis(c) => c.get(key).await,
        }
    }

    async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> CacheResult<()>
    where
        T: Serialize + Send + Sync,
    {
        match self {
            CacheManager::Memory(c) => c.set(key, value, ttl).await,
            CacheManager::Redis(c) => c.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        match self {
            CacheManager::Memory(c) => c.delete(key).await,
            CacheManager::Redis(c) => c.delete(key).await,
        }
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        match self {
            CacheManager::Memory(c) => c.exists(key).await,
            CacheManager::Redis(c) => c.exists(key).await,
        }
    }

    async fn take<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self {
            CacheManager::Memory(c) => c.take(key).await,
            CacheManager::Redis(c) => c.take(key).await,
        }
    }
}
