use crate::auth::jwt::{AccessClaims, JwtService};
use crate::config::{JwtConfig, RefreshCookieConfig};
use crate::database::RefreshTokensDao;
use crate::database::entities::{RefreshTokenRecord, UserRecord};
use crate::error::AppError;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Hash an opaque refresh token for storage. The raw value only ever lives
/// in the client's cookie.
pub fn hash_token(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    hex::encode(digest)
}

fn generate_refresh_token() -> (String, String) {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let raw = hex::encode(bytes);
    let hash = hash_token(&raw);
    (raw, hash)
}

/// Session credentials produced after a successful login: a bearer access
/// token for the response body and a refresh token that travels only as a
/// cookie.
pub struct IssuedCredentials {
    pub access_token: String,
    pub claims: AccessClaims,
    pub refresh_cookie: Cookie<'static>,
}

/// Issues, rotates, and revokes session credentials.
#[derive(Clone)]
pub struct CredentialIssuer {
    jwt: Arc<dyn JwtService>,
    tokens: RefreshTokensDao,
    jwt_config: JwtConfig,
    cookie_config: RefreshCookieConfig,
}

impl CredentialIssuer {
    pub fn new(
        jwt: Arc<dyn JwtService>,
        tokens: RefreshTokensDao,
        jwt_config: JwtConfig,
        cookie_config: RefreshCookieConfig,
    ) -> Self {
        Self {
            jwt,
            tokens,
            jwt_config,
            cookie_config,
        }
    }

    /// Issue a fresh credential pair for an authenticated account.
    pub async fn issue(&self, user: &UserRecord) -> Result<IssuedCredentials, AppError> {
        let claims = AccessClaims::new(user.id, user.role, self.jwt_config.access_token_ttl);
        let access_token = self.jwt.create_access_token(&claims)?;

        let (raw, hash) = generate_refresh_token();
        let now = Utc::now();
        let record = RefreshTokenRecord {
            id: 0,
            token_hash: hash,
            user_id: user.id,
            created_at: now,
            expires_at: now + Duration::seconds(self.jwt_config.refresh_token_ttl as i64),
            revoked_at: None,
        };
        self.tokens.store(&record).await?;

        Ok(IssuedCredentials {
            access_token,
            claims,
            refresh_cookie: self.build_cookie(raw),
        })
    }

    /// Redeem a presented refresh token. The old token is revoked and the
    /// owning user id is returned so the caller can issue a new pair.
    pub async fn rotate(&self, presented: &str) -> Result<i32, AppError> {
        let hash = hash_token(presented);

        let record = self
            .tokens
            .find_by_hash(&hash)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Unknown refresh token".to_string()))?;

        if !record.is_valid(Utc::now()) {
            return Err(AppError::Unauthorized(
                "Refresh token expired or revoked".to_string(),
            ));
        }

        self.tokens.revoke(&hash).await?;

        Ok(record.user_id)
    }

    /// Drop every refresh token belonging to a user.
    pub async fn revoke_all(&self, user_id: i32) -> Result<(), AppError> {
        let removed = self.tokens.delete_all_for_user(user_id).await?;
        tracing::debug!(user_id, removed, "Revoked refresh tokens");
        Ok(())
    }

    /// Expired cookie that instructs the browser to drop the refresh token.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = self.build_cookie(String::new());
        cookie.set_max_age(cookie::time::Duration::ZERO);
        cookie
    }

    fn build_cookie(&self, value: String) -> Cookie<'static> {
        let cfg = &self.cookie_config;

        let mut cookie = Cookie::new(cfg.name.clone(), value);
        cookie.set_http_only(true);
        cookie.set_secure(cfg.secure);
        cookie.set_path(cfg.path.clone());
        cookie.set_same_site(parse_same_site(&cfg.same_site));
        cookie.set_max_age(cookie::time::Duration::seconds(
            self.jwt_config.refresh_token_ttl as i64,
        ));
        if let Some(domain) = &cfg.domain {
            cookie.set_domain(domain.clone());
        }
        cookie
    }
}

fn parse_same_site(value: &str) -> SameSite {
    match value {
        "strict" => SameSite::Strict,
        "none" => SameSite::None,
        _ => SameSite::Lax,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::JwtServiceImpl;
    use crate::database::{DatabaseManager, DatabaseManagerImpl};
    use jsonwebtoken::Algorithm;

    async fn issuer_with_user() -> (CredentialIssuer, UserRecord) {
        let db = DatabaseManagerImpl {
            connection: sea_orm::Database::connect("sqlite::memory:").await.unwrap(),
        };
        db.migrate().await.unwrap();

        let user = UserRecord::new("a@x.com", crate::database::entities::Role::Client)
            .with_activated(true, true);
        let user = db.users().insert(&user).await.unwrap();

        let jwt = Arc::new(JwtServiceImpl::new("test-secret", Algorithm::HS256).unwrap());
        let issuer = CredentialIssuer::new(
            jwt,
            db.refresh_tokens(),
            JwtConfig::default(),
            RefreshCookieConfig::default(),
        );
        (issuer, user)
    }

    #[test]
    fn test_hash_token_is_stable_hex() {
        let a = hash_token("abc");
        let b = hash_token("abc");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_token("abd"));
    }

    #[test]
    fn test_generate_refresh_token_shape() {
        let (raw, hash) = generate_refresh_token();
        assert_eq!(raw.len(), 64);
        assert_eq!(hash, hash_token(&raw));

        let (raw2, _) = generate_refresh_token();
        assert_ne!(raw, raw2);
    }

    #[test]
    fn test_parse_same_site() {
        assert_eq!(parse_same_site("strict"), SameSite::Strict);
        assert_eq!(parse_same_site("none"), SameSite::None);
        assert_eq!(parse_same_site("lax"), SameSite::Lax);
        assert_eq!(parse_same_site("whatever"), SameSite::Lax);
    }

    #[tokio::test]
    async fn test_issue_sets_cookie_attributes() {
        let (issuer, user) = issuer_with_user().await;
        let creds = issuer.issue(&user).await.unwrap();

        let cookie = &creds.refresh_cookie;
        assert_eq!(cookie.name(), "refresh_token");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/auth/refresh"));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.value().len(), 64);

        // Raw token never appears in the access token
        assert!(!creds.access_token.contains(cookie.value()));
    }

    #[tokio::test]
    async fn test_rotate_consumes_old_token() {
        let (issuer, user) = issuer_with_user().await;
        let creds = issuer.issue(&user).await.unwrap();
        let raw = creds.refresh_cookie.value().to_string();

        let user_id = issuer.rotate(&raw).await.unwrap();
        assert_eq!(user_id, user.id);

        // Second redemption of the same token fails
        assert!(issuer.rotate(&raw).await.is_err());
    }

    #[tokio::test]
    async fn test_rotate_unknown_token_fails() {
        let (issuer, _) = issuer_with_user().await;
        assert!(issuer.rotate("not-a-token").await.is_err());
    }

    #[tokio::test]
    async fn test_revoke_all_invalidates_tokens() {
        let (issuer, user) = issuer_with_user().await;
        let creds = issuer.issue(&user).await.unwrap();
        let raw = creds.refresh_cookie.value().to_string();

        issuer.revoke_all(user.id).await.unwrap();
        assert!(issuer.rotate(&raw).await.is_err());
    }

    #[tokio::test]
    async fn test_removal_cookie_expires_immediately() {
        let (issuer, _) = issuer_with_user().await;

        let cookie = issuer.removal_cookie();
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(cookie::time::Duration::ZERO));
    }
}
