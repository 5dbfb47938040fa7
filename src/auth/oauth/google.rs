use crate::auth::oauth::provider::{
    ExternalProfile, OauthClient, ProviderAdapter, ProviderTokens, create_oauth_client,
    exchange_http_client,
};
use crate::auth::oauth::verifier::IdTokenVerifier;
use crate::config::GoogleConfig;
use crate::database::entities::ProviderKind;
use crate::error::AppError;
use async_trait::async_trait;
use oauth2::{AuthorizationCode, CsrfToken, Scope, TokenResponse};
use std::sync::Arc;

/// Google sign-in. Identity comes from the verified OpenID ID token, never
/// from an unauthenticated profile endpoint.
pub struct GoogleAdapter {
    client: OauthClient,
    scopes: Vec<String>,
    verifier: Arc<IdTokenVerifier>,
}

impl GoogleAdapter {
    pub fn new(config: &GoogleConfig) -> Result<Self, AppError> {
        let client = create_oauth_client(&config.provider, "google")?;
        let verifier = Arc::new(IdTokenVerifier::new(
            config.provider.client_id.clone(),
            config.issuers.clone(),
            config.certs_url.clone(),
        ));

        Ok(Self {
            client,
            scopes: config.provider.scopes.clone(),
            verifier,
        })
    }
}

#[async_trait]
impl ProviderAdapter for GoogleAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn authorization_url(&self, state: &str) -> Result<String, AppError> {
        let state = state.to_string();
        let (url, _csrf) = self
            .client
            .authorize_url(|| CsrfToken::new(state))
            .add_scopes(self.scopes.iter().map(|s| Scope::new(s.clone())))
            .url();

        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, AppError> {
        let http_client = exchange_http_client()?;

        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&http_client)
            .await
            .map_err(|e| AppError::ProviderExchangeFailed(format!("google: {e}")))?;

        Ok(ProviderTokens {
            access_token: token.access_token().secret().clone(),
            id_token: token.extra_fields().id_token.clone(),
            user_id: None,
        })
    }

    async fn fetch_profile(&self, tokens: &ProviderTokens) -> Result<ExternalProfile, AppError> {
        let id_token = tokens.id_token.as_deref().ok_or_else(|| {
            AppError::InvalidIdentityAssertion("Google response missing ID token".to_string())
        })?;

        let claims = self.verifier.verify(id_token).await?;

        let mut profile = ExternalProfile::new(ProviderKind::Google, claims.sub);
        profile.email = claims.email;
        profile.email_verified = claims.email_verified.unwrap_or(false);
        profile.first_name = claims.given_name;
        profile.last_name = claims.family_name;
        profile.avatar_url = claims.picture;

        Ok(profile)
    }
}
