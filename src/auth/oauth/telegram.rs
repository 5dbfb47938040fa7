use crate::auth::oauth::provider::ExternalProfile;
use crate::config::TelegramConfig;
use crate::database::entities::ProviderKind;
use crate::error::AppError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct BotApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<TelegramChat>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    bio: Option<String>,
}

/// Telegram has no authorization-code exchange. The client hands over a chat
/// id and the server confirms it against the Bot API, which only resolves
/// chats the bot has actually seen.
pub struct TelegramVerifier {
    api_url: String,
    bot_token: String,
    http_client: reqwest::Client,
}

impl TelegramVerifier {
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            api_url: config.api_url.clone(),
            bot_token: config.bot_token.clone(),
            http_client: reqwest::Client::new(),
        }
    }

    /// Confirm a Telegram identity and normalize its profile.
    pub async fn verify(&self, telegram_id: i64) -> Result<ExternalProfile, AppError> {
        let url = format!("{}/bot{}/getChat", self.api_url, self.bot_token);

        let response = self
            .http_client
            .get(&url)
            .query(&[("chat_id", telegram_id)])
            .send()
            .await
            .map_err(|e| AppError::ProviderProfileFailed {
                status: None,
                message: format!("telegram getChat request failed: {e}"),
            })?;

        let body: BotApiResponse =
            response
                .json()
                .await
                .map_err(|e| AppError::ProviderProfileFailed {
                    status: None,
                    message: format!("telegram getChat response malformed: {e}"),
                })?;

        if !body.ok {
            return Err(AppError::InvalidIdentityAssertion(format!(
                "telegram rejected chat id {}: {}",
                telegram_id,
                body.description.unwrap_or_else(|| "no details".to_string())
            )));
        }

        let chat = body.result.ok_or_else(|| {
            AppError::InvalidIdentityAssertion("telegram getChat returned no chat".to_string())
        })?;

        let mut profile = ExternalProfile::new(ProviderKind::Telegram, chat.id.to_string());
        profile.first_name = chat.first_name.or(chat.username);
        profile.last_name = chat.last_name;
        profile.bio = chat.bio;

        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn verifier(api_url: String) -> TelegramVerifier {
        TelegramVerifier::new(&TelegramConfig {
            bot_token: "123:abc".to_string(),
            api_url,
        })
    }

    #[tokio::test]
    async fn test_verify_known_chat() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bot123:abc/getChat"))
            .and(query_param("chat_id", "555"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {
                    "id": 555,
                    "type": "private",
                    "first_name": "Carol",
                    "username": "carol_t",
                    "bio": "hello"
                }
            })))
            .mount(&server)
            .await;

        let profile = verifier(server.uri()).verify(555).await.unwrap();
        assert_eq!(profile.provider, ProviderKind::Telegram);
        assert_eq!(profile.provider_id, "555");
        assert_eq!(profile.first_name.as_deref(), Some("Carol"));
        assert_eq!(profile.bio.as_deref(), Some("hello"));
        assert!(profile.email.is_none());
    }

    #[tokio::test]
    async fn test_verify_falls_back_to_username() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bot123:abc/getChat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {"id": 9, "type": "private", "username": "nameless"}
            })))
            .mount(&server)
            .await;

        let profile = verifier(server.uri()).verify(9).await.unwrap();
        assert_eq!(profile.first_name.as_deref(), Some("nameless"));
    }

    #[tokio::test]
    async fn test_verify_unknown_chat_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bot123:abc/getChat"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let err = verifier(server.uri()).verify(404404).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidIdentityAssertion(_)));
        assert!(err.to_string().contains("chat not found"));
    }
}
