use crate::auth::jwt::AccessClaims;
use crate::auth::middleware::{UserExtractor, token_block_key};
use crate::auth::oauth::AuthorizeResponse;
use crate::cache::Cache;
use crate::database::entities::{ProviderKind, Role, UserRecord};
use crate::error::AppError;
use crate::server::Server;
use axum::{
    Extension, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    pub code: String,
    pub state: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramCallbackRequest {
    pub telegram_id: i64,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserRecord,
    pub token: String,
}

pub fn create_auth_routes() -> Router<Server> {
    Router::new()
        .route("/providers", get(providers_handler))
        .route("/{provider}/url", get(authorize_url_handler))
        .route("/{provider}/callback", post(callback_handler))
        .route("/telegram/callback", post(telegram_callback_handler))
        .route("/refresh", post(refresh_handler))
}

pub fn create_protected_auth_routes() -> Router<Server> {
    Router::new()
        .route("/me", get(me_handler))
        .route("/logout", post(logout_handler))
}

fn parse_provider(name: &str) -> Result<ProviderKind, AppError> {
    ProviderKind::parse(name)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown provider: {name}")))
}

/// Providers available for login, so clients know which buttons to render.
pub async fn providers_handler(State(server): State<Server>) -> Json<Vec<ProviderKind>> {
    let mut providers = server.oauth_service.providers();
    providers.sort_by_key(|p| p.as_str());
    Json(providers)
}

pub async fn authorize_url_handler(
    State(server): State<Server>,
    Path(provider): Path<String>,
) -> Result<Json<AuthorizeResponse>, AppError> {
    let provider = parse_provider(&provider)?;
    let response = server.oauth_service.build_authorization_url(provider).await?;
    Ok(Json(response))
}

pub async fn callback_handler(
    State(server): State<Server>,
    Path(provider): Path<String>,
    jar: CookieJar,
    Json(request): Json<CallbackRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let provider = parse_provider(&provider)?;
    let role = Role::parse_or_default(request.role.as_deref());

    let user = server
        .oauth_service
        .complete_login(provider, &request.code, &request.state, role)
        .await?;

    login_response(&server, jar, user).await
}

pub async fn telegram_callback_handler(
    State(server): State<Server>,
    jar: CookieJar,
    Json(request): Json<TelegramCallbackRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let role = Role::parse_or_default(request.role.as_deref());

    let user = server
        .oauth_service
        .complete_telegram_login(request.telegram_id, role)
        .await?;

    login_response(&server, jar, user).await
}

pub async fn refresh_handler(
    State(server): State<Server>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let presented = jar
        .get(&server.config.refresh_cookie.name)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::Unauthorized("Missing refresh token".to_string()))?;

    let user_id = server.credential_issuer.rotate(&presented).await?;

    let user = server
        .database
        .users()
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

    if !user.active || !user.approved {
        return Err(AppError::Unauthorized("Account is not active".to_string()));
    }

    login_response(&server, jar, user).await
}

pub async fn logout_handler(
    State(server): State<Server>,
    Extension(claims): Extension<AccessClaims>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), AppError> {
    // Block this access token for its remaining lifetime
    let remaining = claims.exp.saturating_sub(Utc::now().timestamp().max(0) as usize);
    if remaining > 0 {
        server
            .cache
            .set(
                &token_block_key(&claims.jti),
                &true,
                Some(Duration::from_secs(remaining as u64)),
            )
            .await?;
    }

    server.credential_issuer.revoke_all(claims.sub).await?;

    tracing::info!(user_id = claims.sub, "User logged out");

    let jar = jar.add(server.credential_issuer.removal_cookie());
    Ok((jar, StatusCode::NO_CONTENT))
}

pub async fn me_handler(UserExtractor(user): UserExtractor) -> Json<UserRecord> {
    Json(user)
}

async fn login_response(
    server: &Server,
    jar: CookieJar,
    user: UserRecord,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let credentials = server.credential_issuer.issue(&user).await?;

    let jar = jar.add(credentials.refresh_cookie);
    Ok((
        jar,
        Json(LoginResponse {
            user,
            token: credentials.access_token,
        }),
    ))
}
