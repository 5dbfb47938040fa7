use crate::config::ProviderConfig;
use crate::database::entities::ProviderKind;
use crate::error::AppError;
use async_trait::async_trait;
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthUrl, Client, ClientId, ClientSecret, EndpointNotSet, EndpointSet, ExtraTokenFields,
    RedirectUrl, StandardRevocableToken, StandardTokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};

/// Non-standard token response fields. Google returns the OpenID `id_token`
/// alongside the access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl ExtraTokenFields for IdTokenFields {}

pub type OauthTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

// Avoid oauth2 type madness
pub type OauthClient = Client<
    BasicErrorResponse,
    OauthTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// Tokens obtained from a provider after the code exchange.
#[derive(Debug, Clone)]
pub struct ProviderTokens {
    pub access_token: String,
    /// OpenID Connect ID token, when the provider issues one.
    pub id_token: Option<String>,
    /// Provider-assigned user id returned directly by the token endpoint.
    pub user_id: Option<String>,
}

/// Normalized identity assertion produced by every adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProfile {
    pub provider: ProviderKind,
    pub provider_id: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub birthday: Option<String>,
}

impl ExternalProfile {
    pub fn new(provider: ProviderKind, provider_id: impl Into<String>) -> Self {
        Self {
            provider,
            provider_id: provider_id.into(),
            email: None,
            email_verified: false,
            first_name: None,
            last_name: None,
            avatar_url: None,
            bio: None,
            birthday: None,
        }
    }
}

/// One adapter per identity provider. Adapters translate provider-specific
/// wire formats into `ExternalProfile`.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Authorization URL for the browser redirect, carrying the given state.
    fn authorization_url(&self, state: &str) -> Result<String, AppError>;

    /// Exchange an authorization code for provider tokens.
    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, AppError>;

    /// Fetch and normalize the user's profile.
    async fn fetch_profile(&self, tokens: &ProviderTokens) -> Result<ExternalProfile, AppError>;
}

/// Build the oauth2 client for an authorization-code provider.
pub fn create_oauth_client(
    provider: &ProviderConfig,
    provider_name: &str,
) -> Result<OauthClient, AppError> {
    let auth_url = provider.authorization_url.as_ref().ok_or_else(|| {
        AppError::BadRequest(format!(
            "Authorization URL not configured for provider '{}'",
            provider_name
        ))
    })?;
    let auth_url = AuthUrl::new(auth_url.clone()).map_err(|e| {
        AppError::BadRequest(format!(
            "Invalid authorization URL for provider '{}': {}",
            provider_name, e
        ))
    })?;

    let token_url = provider.token_url.as_ref().ok_or_else(|| {
        AppError::BadRequest(format!(
            "Token URL not configured for provider '{}'",
            provider_name
        ))
    })?;
    let token_url = TokenUrl::new(token_url.clone()).map_err(|e| {
        AppError::BadRequest(format!(
            "Invalid token URL for provider '{}': {}",
            provider_name, e
        ))
    })?;

    let redirect_url = RedirectUrl::new(provider.redirect_uri.clone()).map_err(|e| {
        AppError::BadRequest(format!(
            "Invalid redirect URI for provider '{}': {}",
            provider_name, e
        ))
    })?;

    let client = Client::new(ClientId::new(provider.client_id.clone()))
        .set_client_secret(ClientSecret::new(provider.client_secret.clone()))
        .set_auth_uri(auth_url)
        .set_token_uri(token_url)
        .set_redirect_uri(redirect_url);

    Ok(client)
}

/// HTTP client for token exchanges. Following redirects would open the
/// exchange up to SSRF, so they are disabled.
pub fn exchange_http_client() -> Result<reqwest::Client, AppError> {
    reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| AppError::Internal(format!("reqwest build error: {e}")))
}
