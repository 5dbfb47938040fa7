use crate::auth::oauth::facebook::FacebookAdapter;
use crate::auth::oauth::google::GoogleAdapter;
use crate::auth::oauth::instagram::InstagramAdapter;
use crate::auth::oauth::provider::{ExternalProfile, ProviderAdapter};
use crate::auth::oauth::telegram::TelegramVerifier;
use crate::auth::reconcile::ReconciliationEngine;
use crate::auth::state::StateStore;
use crate::config::OAuthConfig;
use crate::database::entities::{ProviderKind, Role, UserRecord};
use crate::error::AppError;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub authorization_url: String,
    pub state: String,
    pub provider: ProviderKind,
}

/// Orchestrates the login flow: state issuance, code exchange, profile
/// normalization, and account resolution.
pub struct OAuthService {
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
    telegram: Option<TelegramVerifier>,
    state_store: StateStore,
    reconciler: ReconciliationEngine,
}

impl OAuthService {
    pub fn new(
        oauth_config: &OAuthConfig,
        state_store: StateStore,
        reconciler: ReconciliationEngine,
    ) -> Result<Self, AppError> {
        let mut adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>> = HashMap::new();

        if let Some(google) = &oauth_config.google {
            adapters.insert(ProviderKind::Google, Arc::new(GoogleAdapter::new(google)?));
        }
        if let Some(facebook) = &oauth_config.facebook {
            adapters.insert(
                ProviderKind::Facebook,
                Arc::new(FacebookAdapter::new(facebook)?),
            );
        }
        if let Some(instagram) = &oauth_config.instagram {
            adapters.insert(
                ProviderKind::Instagram,
                Arc::new(InstagramAdapter::new(instagram)?),
            );
        }

        let telegram = oauth_config.telegram.as_ref().map(TelegramVerifier::new);

        tracing::info!(
            providers = adapters.len(),
            telegram = telegram.is_some(),
            "Initialized identity providers"
        );

        Ok(Self {
            adapters,
            telegram,
            state_store,
            reconciler,
        })
    }

    /// Providers available for login.
    pub fn providers(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<ProviderKind> = self.adapters.keys().copied().collect();
        if self.telegram.is_some() {
            kinds.push(ProviderKind::Telegram);
        }
        kinds
    }

    fn adapter(&self, provider: ProviderKind) -> Result<&Arc<dyn ProviderAdapter>, AppError> {
        self.adapters
            .get(&provider)
            .ok_or_else(|| AppError::BadRequest(format!("Provider not configured: {provider}")))
    }

    /// Start a login attempt: mint a state token and build the redirect URL.
    pub async fn build_authorization_url(
        &self,
        provider: ProviderKind,
    ) -> Result<AuthorizeResponse, AppError> {
        let adapter = self.adapter(provider)?;
        let state = self.state_store.issue(provider).await?;
        let authorization_url = adapter.authorization_url(&state)?;

        Ok(AuthorizeResponse {
            authorization_url,
            state,
            provider,
        })
    }

    /// Finish an authorization-code login.
    pub async fn complete_login(
        &self,
        provider: ProviderKind,
        code: &str,
        state: &str,
        requested_role: Role,
    ) -> Result<UserRecord, AppError> {
        let adapter = self.adapter(provider)?;

        // Validate and burn the state before talking to the provider. The
        // consume is atomic, so a replayed callback loses here.
        if !self.state_store.exists(state).await? {
            return Err(AppError::InvalidState);
        }
        let state_data = self.state_store.consume(state).await?;
        if state_data.provider != provider {
            return Err(AppError::InvalidState);
        }

        let tokens = adapter.exchange_code(code).await?;
        let profile = adapter.fetch_profile(&tokens).await?;

        self.resolve(profile, requested_role).await
    }

    /// Finish a Telegram login. No code exchange exists for Telegram; the
    /// asserted chat id is verified against the Bot API instead.
    pub async fn complete_telegram_login(
        &self,
        telegram_id: i64,
        requested_role: Role,
    ) -> Result<UserRecord, AppError> {
        let verifier = self
            .telegram
            .as_ref()
            .ok_or_else(|| AppError::BadRequest("Provider not configured: telegram".to_string()))?;

        let profile = verifier.verify(telegram_id).await?;
        self.resolve(profile, requested_role).await
    }

    async fn resolve(
        &self,
        profile: ExternalProfile,
        requested_role: Role,
    ) -> Result<UserRecord, AppError> {
        let user = self.reconciler.resolve(&profile, requested_role).await?;

        tracing::info!(
            user_id = user.id,
            provider = %profile.provider,
            "Login completed"
        );

        Ok(user)
    }
}
