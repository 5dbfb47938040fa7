use crate::cache::Cache;
use crate::database::entities::UserRecord;
use crate::error::AppError;
use crate::server::Server;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{trace, warn};

const TOKEN_BLOCK_PREFIX: &str = "jwt_block:";

/// Cache key for a blocked access token id.
pub fn token_block_key(jti: &str) -> String {
    format!("{}{}", TOKEN_BLOCK_PREFIX, jti)
}

/// Bearer-token authentication middleware.
///
/// Validates the JWT, rejects tokens blocked by logout, loads the account,
/// and refuses inactive or unapproved accounts. Claims and the user record
/// land in request extensions for downstream handlers.
pub async fn jwt_auth_middleware(
    State(server): State<Server>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization format".to_string()))?;

    let claims = server.jwt_service.validate_access_token(token)?;

    let blocked: Option<bool> = server.cache.get(&token_block_key(&claims.jti)).await?;
    if blocked.is_some() {
        warn!(user_id = claims.sub, "Rejected blocked access token");
        return Err(AppError::Unauthorized("Token has been revoked".to_string()));
    }

    let user = server
        .database
        .users()
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| {
            warn!(user_id = claims.sub, "User not found");
            AppError::Unauthorized("User not found".to_string())
        })?;

    if !user.active || !user.approved {
        warn!(user_id = user.id, "Inactive account rejected");
        return Err(AppError::Unauthorized("Account is not active".to_string()));
    }

    trace!(user_id = user.id, "Request authenticated");

    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Extractor for the authenticated user placed by `jwt_auth_middleware`.
pub struct UserExtractor(pub UserRecord);

impl<S> FromRequestParts<S> for UserExtractor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserRecord>()
            .cloned()
            .map(UserExtractor)
            .ok_or_else(|| AppError::Unauthorized("Missing user authentication".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::AccessClaims;
    use crate::database::entities::Role;
    use crate::test_utils::TestServerBuilder;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
    };
    use std::time::Duration;
    use tower::ServiceExt;

    async fn test_handler() -> &'static str {
        "success"
    }

    fn protected_app(server: Server) -> Router {
        Router::new()
            .route("/test", get(test_handler))
            .layer(middleware::from_fn_with_state(server, jwt_auth_middleware))
    }

    fn bearer_request(token: &str) -> Request<Body> {
        Request::builder()
            .uri("/test")
            .header("Authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_middleware_accepts_valid_token() {
        let server = TestServerBuilder::new().build().await;
        let user = crate::test_utils::create_test_user(&server, "mw@example.com").await;

        let claims = AccessClaims::new(user.id, Role::Client, 3600);
        let token = server.jwt_service.create_access_token(&claims).unwrap();

        let response = protected_app(server).oneshot(bearer_request(&token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_middleware_missing_header() {
        let server = TestServerBuilder::new().build().await;
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();

        let response = protected_app(server).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_middleware_rejects_garbage_token() {
        let server = TestServerBuilder::new().build().await;
        let response = protected_app(server)
            .oneshot(bearer_request("not.a.jwt"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_middleware_rejects_blocked_jti() {
        let server = TestServerBuilder::new().build().await;
        let user = crate::test_utils::create_test_user(&server, "blocked@example.com").await;

        let claims = AccessClaims::new(user.id, Role::Client, 3600);
        let token = server.jwt_service.create_access_token(&claims).unwrap();

        server
            .cache
            .set(
                &token_block_key(&claims.jti),
                &true,
                Some(Duration::from_secs(3600)),
            )
            .await
            .unwrap();

        let response = protected_app(server).oneshot(bearer_request(&token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_middleware_rejects_inactive_user() {
        let server = TestServerBuilder::new().build().await;

        let inactive = crate::database::entities::UserRecord::new("off@example.com", Role::Client);
        let inactive = server.database.users().insert(&inactive).await.unwrap();

        let claims = AccessClaims::new(inactive.id, Role::Client, 3600);
        let token = server.jwt_service.create_access_token(&claims).unwrap();

        let response = protected_app(server).oneshot(bearer_request(&token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_middleware_rejects_unknown_user() {
        let server = TestServerBuilder::new().build().await;

        let claims = AccessClaims::new(99999, Role::Client, 3600);
        let token = server.jwt_service.create_access_token(&claims).unwrap();

        let response = protected_app(server).oneshot(bearer_request(&token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
