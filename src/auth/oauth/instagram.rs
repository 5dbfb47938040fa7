use crate::auth::oauth::provider::{ExternalProfile, ProviderAdapter, ProviderTokens};
use crate::config::ProviderConfig;
use crate::database::entities::ProviderKind;
use crate::error::AppError;
use async_trait::async_trait;
use serde::Deserialize;

/// Instagram's token endpoint omits `token_type`, so the standard OAuth
/// response types cannot parse it. The exchange is done with a plain form
/// POST instead.
#[derive(Debug, Deserialize)]
struct InstagramTokenResponse {
    access_token: String,
    user_id: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct InstagramProfile {
    id: String,
    #[serde(default)]
    username: Option<String>,
}

/// Instagram Basic Display login. No email is ever asserted.
pub struct InstagramAdapter {
    config: ProviderConfig,
    authorization_url: String,
    token_url: String,
    profile_url: String,
    http_client: reqwest::Client,
}

impl InstagramAdapter {
    pub fn new(config: &ProviderConfig) -> Result<Self, AppError> {
        let authorization_url = config.authorization_url.clone().ok_or_else(|| {
            AppError::BadRequest(
                "Authorization URL not configured for provider 'instagram'".to_string(),
            )
        })?;
        let token_url = config.token_url.clone().ok_or_else(|| {
            AppError::BadRequest("Token URL not configured for provider 'instagram'".to_string())
        })?;
        let profile_url = config.profile_url.clone().ok_or_else(|| {
            AppError::BadRequest("Profile URL not configured for provider 'instagram'".to_string())
        })?;

        let http_client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AppError::Internal(format!("reqwest build error: {e}")))?;

        Ok(Self {
            config: config.clone(),
            authorization_url,
            token_url,
            profile_url,
            http_client,
        })
    }
}

#[async_trait]
impl ProviderAdapter for InstagramAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Instagram
    }

    fn authorization_url(&self, state: &str) -> Result<String, AppError> {
        let mut url = url::Url::parse(&self.authorization_url)
            .map_err(|e| AppError::Internal(format!("Invalid instagram authorization URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(","))
            .append_pair("state", state);

        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, AppError> {
        let response = self
            .http_client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("code", code),
            ])
            .send()
            .await
            .map_err(|e| AppError::ProviderExchangeFailed(format!("instagram: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ProviderExchangeFailed(format!(
                "instagram token endpoint returned {status}: {body}"
            )));
        }

        let token: InstagramTokenResponse = response.json().await.map_err(|e| {
            AppError::ProviderExchangeFailed(format!("instagram token response malformed: {e}"))
        })?;

        // user_id arrives as a JSON number
        let user_id = match &token.user_id {
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) => s.clone(),
            other => {
                return Err(AppError::ProviderExchangeFailed(format!(
                    "instagram user_id malformed: {other}"
                )));
            }
        };

        Ok(ProviderTokens {
            access_token: token.access_token,
            id_token: None,
            user_id: Some(user_id),
        })
    }

    async fn fetch_profile(&self, tokens: &ProviderTokens) -> Result<ExternalProfile, AppError> {
        let response = self
            .http_client
            .get(&self.profile_url)
            .query(&[
                ("fields", "id,username"),
                ("access_token", tokens.access_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::ProviderProfileFailed {
                status: None,
                message: format!("instagram profile request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ProviderProfileFailed {
                status: Some(status.as_u16()),
                message: format!("instagram profile endpoint returned {status}: {body}"),
            });
        }

        let profile: InstagramProfile =
            response
                .json()
                .await
                .map_err(|e| AppError::ProviderProfileFailed {
                    status: None,
                    message: format!("instagram profile response malformed: {e}"),
                })?;

        let mut external = ExternalProfile::new(ProviderKind::Instagram, profile.id);
        external.first_name = profile.username;

        Ok(external)
    }
}
