use crate::auth::oauth::provider::{
    ExternalProfile, OauthClient, ProviderAdapter, ProviderTokens, create_oauth_client,
    exchange_http_client,
};
use crate::config::ProviderConfig;
use crate::database::entities::ProviderKind;
use crate::error::AppError;
use async_trait::async_trait;
use oauth2::{AuthorizationCode, CsrfToken, Scope, TokenResponse};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct FacebookProfile {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    birthday: Option<String>,
    #[serde(default)]
    picture: Option<FacebookPicture>,
}

#[derive(Debug, Deserialize)]
struct FacebookPicture {
    data: FacebookPictureData,
}

#[derive(Debug, Deserialize)]
struct FacebookPictureData {
    #[serde(default)]
    url: Option<String>,
}

/// Facebook login via the Graph API.
pub struct FacebookAdapter {
    client: OauthClient,
    scopes: Vec<String>,
    profile_url: String,
    http_client: reqwest::Client,
}

impl FacebookAdapter {
    pub fn new(config: &ProviderConfig) -> Result<Self, AppError> {
        let client = create_oauth_client(config, "facebook")?;
        let profile_url = config.profile_url.clone().ok_or_else(|| {
            AppError::BadRequest("Profile URL not configured for provider 'facebook'".to_string())
        })?;

        Ok(Self {
            client,
            scopes: config.scopes.clone(),
            profile_url,
            http_client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl ProviderAdapter for FacebookAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Facebook
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
            .map_err(|e| AppError::ProviderExchangeFailed(format!("facebook: {e}")))?;

        Ok(ProviderTokens {
            access_token: token.access_token().secret().clone(),
            id_token: None,
            user_id: None,
        })
    }

    async fn fetch_profile(&self, tokens: &ProviderTokens) -> Result<ExternalProfile, AppError> {
        let response = self
            .http_client
            .get(&self.profile_url)
            .query(&[("fields", "id,email,first_name,last_name,picture,birthday")])
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .map_err(|e| AppError::ProviderProfileFailed {
                status: None,
                message: format!("facebook profile request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ProviderProfileFailed {
                status: Some(status.as_u16()),
                message: format!("facebook profile endpoint returned {status}: {body}"),
            });
        }

        let profile: FacebookProfile =
            response
                .json()
                .await
                .map_err(|e| AppError::ProviderProfileFailed {
                    status: None,
                    message: format!("facebook profile response malformed: {e}"),
                })?;

        let mut external = ExternalProfile::new(ProviderKind::Facebook, profile.id);
        // Facebook only returns an email the user has confirmed
        external.email_verified = profile.email.is_some();
        external.email = profile.email;
        external.first_name = profile.first_name;
        external.last_name = profile.last_name;
        external.birthday = profile.birthday;
        external.avatar_url = profile.picture.and_then(|p| p.data.url);

        Ok(external)
    }
}
