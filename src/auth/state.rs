use crate::cache::{Cache, CacheManager};
use crate::database::entities::ProviderKind;
use crate::error::AppError;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// OAuth state token TTL (10 minutes)
pub const STATE_TTL_SECONDS: u64 = 600;

const STATE_KEY_PREFIX: &str = "oauth_state:";

/// CSRF state record kept server-side for the duration of a login attempt
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateData {
    pub provider: ProviderKind,
    pub created_at: DateTime<Utc>,
}

/// Issues and redeems single-use anti-CSRF state tokens backed by the cache.
#[derive(Clone)]
pub struct StateStore {
    cache: Arc<CacheManager>,
}

impl StateStore {
    pub fn new(cache: Arc<CacheManager>) -> Self {
        Self { cache }
    }

    /// Issue a fresh state token for a login attempt. 32 random bytes,
    /// hex-encoded, so the token is 64 characters of entropy.
    pub async fn issue(&self, provider: ProviderKind) -> Result<String, AppError> {
        self.issue_with_ttl(provider, Duration::from_secs(STATE_TTL_SECONDS))
            .await
    }

    async fn issue_with_ttl(
        &self,
        provider: ProviderKind,
        ttl: Duration,
    ) -> Result<String, AppError> {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        let data = StateData {
            provider,
            created_at: Utc::now(),
        };

        self.cache
            .set(&format!("{}{}", STATE_KEY_PREFIX, token), &data, Some(ttl))
            .await?;

        Ok(token)
    }

    /// Check whether a state token is currently live without consuming it.
    pub async fn exists(&self, token: &str) -> Result<bool, AppError> {
        let exists = self
            .cache
            .exists(&format!("{}{}", STATE_KEY_PREFIX, token))
            .await?;
        Ok(exists)
    }

    /// Redeem a state token. The read and delete are a single atomic step,
    /// so concurrent callbacks with the same token produce one winner.
    pub async fn consume(&self, token: &str) -> Result<StateData, AppError> {
        let data: Option<StateData> = self
            .cache
            .take(&format!("{}{}", STATE_KEY_PREFIX, token))
            .await?;

        data.ok_or(AppError::InvalidState)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> StateStore {
        StateStore::new(Arc::new(CacheManager::new_memory()))
    }

    #[tokio::test]
    async fn test_issue_produces_64_hex_chars() {
        let store = store();
        let token = store.issue(ProviderKind::Google).await.unwrap();

        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_issued_tokens_are_unique() {
        let store = store();
        let a = store.issue(ProviderKind::Google).await.unwrap();
        let b = store.issue(ProviderKind::Google).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_consume_is_single_use() {
        let store = store();
        let token = store.issue(ProviderKind::Facebook).await.unwrap();

        let data = store.consume(&token).await.unwrap();
        assert_eq!(data.provider, ProviderKind::Facebook);

        // Replay fails
        assert!(matches!(
            store.consume(&token).await,
            Err(AppError::InvalidState)
        ));
    }

    #[tokio::test]
    async fn test_consume_unknown_token_fails() {
        let store = store();
        let result = store.consume("deadbeef").await;
        assert!(matches!(result, Err(AppError::InvalidState)));
    }

    #[tokio::test]
    async fn test_state_outliving_ttl_cannot_be_consumed() {
        let store = store();
        let token = store
            .issue_with_ttl(ProviderKind::Google, Duration::from_millis(30))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(!store.exists(&token).await.unwrap());
        assert!(matches!(
            store.consume(&token).await,
            Err(AppError::InvalidState)
        ));
    }

    #[tokio::test]
    async fn test_exists_does_not_consume() {
        let store = store();
        let token = store.issue(ProviderKind::Google).await.unwrap();

        assert!(store.exists(&token).await.unwrap());
        assert!(store.exists(&token).await.unwrap());
        assert!(store.consume(&token).await.is_ok());
        assert!(!store.exists(&token).await.unwrap());
    }
}
