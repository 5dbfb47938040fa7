use crate::{cache::CacheError, database::DatabaseError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application error taxonomy.
///
/// Login-flow failures are terminal for the flow instance: the client must
/// restart from a fresh authorization URL.
#[derive(Error, Debug)]
pub enum AppError {
    /// Unknown, expired, or already-consumed state token.
    #[error("Invalid or expired state token")]
    InvalidState,

    /// The provider rejected the authorization code.
    #[error("Provider code exchange failed: {0}")]
    ProviderExchangeFailed(String),

    /// Transport or provider error while fetching the user profile.
    #[error("Provider profile request failed: {message}")]
    ProviderProfileFailed {
        status: Option<u16>,
        message: String,
    },

    /// Signature, audience, issuer, or expiry failure on a signed identity
    /// assertion. Never retried.
    #[error("Invalid identity assertion: {0}")]
    InvalidIdentityAssertion(String),

    /// The asserted email belongs to an account already linked to a different
    /// external identity. Requires manual resolution.
    #[error("Email is already linked to another identity")]
    EmailAlreadyLinked,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable reason, independent of the human message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidState => "invalid_state",
            AppError::ProviderExchangeFailed(_) => "provider_exchange_failed",
            AppError::ProviderProfileFailed { .. } => "provider_profile_failed",
            AppError::InvalidIdentityAssertion(_) => "invalid_identity_assertion",
            AppError::EmailAlreadyLinked => "email_already_linked",
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Config(_) => "configuration_error",
            AppError::Database(_) => "database_error",
            AppError::Cache(_) => "cache_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidState => StatusCode::BAD_REQUEST,
            AppError::ProviderExchangeFailed(_) => StatusCode::BAD_REQUEST,
            AppError::ProviderProfileFailed { status, .. } => status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            AppError::InvalidIdentityAssertion(_) => StatusCode::UNAUTHORIZED,
            AppError::EmailAlreadyLinked => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) | AppError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "request failed");
        }

        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_errors_map_to_client_status() {
        assert_eq!(AppError::InvalidState.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::ProviderExchangeFailed("code expired".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::InvalidIdentityAssertion("bad signature".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::EmailAlreadyLinked.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_profile_failure_propagates_provider_status() {
        let err = AppError::ProviderProfileFailed {
            status: Some(403),
            message: "forbidden".into(),
        };
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let transport = AppError::ProviderProfileFailed {
            status: None,
            message: "connection reset".into(),
        };
        assert_eq!(transport.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(AppError::InvalidState.code(), "invalid_state");
        assert_eq!(AppError::EmailAlreadyLinked.code(), "email_already_linked");
        assert_eq!(
            AppError::InvalidIdentityAssertion("x".into()).code(),
            "invalid_identity_assertion"
        );
    }

    #[test]
    fn test_error_display() {
        let err = AppError::Unauthorized("missing bearer token".to_string());
        assert_eq!(err.to_string(), "Unauthorized: missing bearer token");

        let err = AppError::InvalidState;
        assert_eq!(err.to_string(), "Invalid or expired state token");
    }
}
