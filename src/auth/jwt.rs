use crate::database::entities::Role;
use crate::error::AppError;
use crate::health::{HealthCheckResult, HealthChecker};
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

pub fn parse_algorithm(alg: &str) -> Result<Algorithm, AppError> {
    Algorithm::from_str(alg)
        .map_err(|_| AppError::BadRequest(format!("Unsupported JWT algorithm: {}", alg)))
}

fn create_encoding_key(key_data: &str, algorithm: Algorithm) -> Result<EncodingKey, AppError> {
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            Ok(EncodingKey::from_secret(key_data.as_ref()))
        }
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => EncodingKey::from_rsa_pem(key_data.as_bytes())
            .map_err(|_| AppError::Unauthorized("Invalid RSA key format".to_string())),
        Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(key_data.as_bytes())
            .map_err(|_| AppError::Unauthorized("Invalid EC key format".to_string())),
        Algorithm::EdDSA => EncodingKey::from_ed_pem(key_data.as_bytes())
            .map_err(|_| AppError::Unauthorized("Invalid EdDSA key format".to_string())),
    }
}

fn create_decoding_key(key_data: &str, algorithm: Algorithm) -> Result<DecodingKey, AppError> {
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            Ok(DecodingKey::from_secret(key_data.as_ref()))
        }
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => DecodingKey::from_rsa_pem(key_data.as_bytes())
            .map_err(|_| AppError::Unauthorized("Invalid RSA key format".to_string())),
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(key_data.as_bytes())
            .map_err(|_| AppError::Unauthorized("Invalid EC key format".to_string())),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(key_data.as_bytes())
            .map_err(|_| AppError::Unauthorized("Invalid EdDSA key format".to_string())),
    }
}

/// Access token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: i32, // Database user ID
    pub role: Role,
    pub jti: String,
    pub iat: usize,
    pub exp: usize,
}

impl AccessClaims {
    pub fn new(user_id: i32, role: Role, expires_in_seconds: u64) -> Self {
        let now = Utc::now().timestamp() as usize;
        Self {
            sub: user_id,
            role,
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp: now + expires_in_seconds as usize,
        }
    }

    pub fn is_expired(&self) -> bool {
        let now = Utc::now().timestamp() as usize;
        self.exp <= now
    }
}

/// JWT service trait for dependency injection and testing
#[async_trait]
pub trait JwtService: Send + Sync {
    /// Create access token from claims
    fn create_access_token(&self, claims: &AccessClaims) -> Result<String, AppError>;

    /// Validate access token and return claims
    fn validate_access_token(&self, token: &str) -> Result<AccessClaims, AppError>;

    /// Get algorithm used by this service
    fn algorithm(&self) -> Algorithm;
}

#[derive(Clone)]
pub struct JwtServiceImpl {
    pub algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtServiceImpl {
    pub fn new(secret: &str, algorithm: Algorithm) -> Result<Self, AppError> {
        let encoding_key = create_encoding_key(secret, algorithm)?;
        let decoding_key = create_decoding_key(secret, algorithm)?;

        Ok(Self {
            algorithm,
            encoding_key,
            decoding_key,
        })
    }

    /// Create a health checker for this JWT service
    pub fn health_checker(&self) -> Arc<JwtHealthChecker> {
        Arc::new(JwtHealthChecker {
            service: self.clone(),
        })
    }
}

#[async_trait]
impl JwtService for JwtServiceImpl {
    fn create_access_token(&self, claims: &AccessClaims) -> Result<String, AppError> {
        let header = Header::new(self.algorithm);
        encode(&header, claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    fn validate_access_token(&self, token: &str) -> Result<AccessClaims, AppError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.leeway = 0;

        let token_data = decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

        Ok(token_data.claims)
    }

    fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

/// Health checker implementation for JWT service
pub struct JwtHealthChecker {
    service: JwtServiceImpl,
}

#[async_trait::async_trait]
impl HealthChecker for JwtHealthChecker {
    fn name(&self) -> &str {
        "jwt"
    }

    async fn check(&self) -> HealthCheckResult {
        // Sign and verify a throwaway token
        let test_claims = AccessClaims::new(1, Role::Client, 60);

        let token = match self.service.create_access_token(&test_claims) {
            Ok(token) => token,
            Err(err) => {
                return HealthCheckResult::unhealthy_with_details(
                    "Failed to create test JWT token".to_string(),
                    serde_json::json!({
                        "algorithm": format!("{:?}", self.service.algorithm),
                        "token_creation": "failed",
                        "error": err.to_string()
                    }),
                );
            }
        };

        match self.service.validate_access_token(&token) {
            Ok(claims) if claims.sub == test_claims.sub => {
                HealthCheckResult::healthy_with_details(serde_json::json!({
                    "algorithm": format!("{:?}", self.service.algorithm),
                    "token_creation": "success",
                    "token_validation": "success"
                }))
            }
            Ok(_) => HealthCheckResult::unhealthy_with_details(
                "Token validation returned incorrect claims".to_string(),
                serde_json::json!({
                    "algorithm": format!("{:?}", self.service.algorithm),
                    "error": "claims mismatch"
                }),
            ),
            Err(err) => HealthCheckResult::unhealthy_with_details(
                "Failed to validate test JWT token".to_string(),
                serde_json::json!({
                    "algorithm": format!("{:?}", self.service.algorithm),
                    "token_validation": "failed",
                    "error": err.to_string()
                }),
            ),
        }
    }

    fn info(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "service": "JWT Token Service",
            "algorithm": format!("{:?}", self.service.algorithm),
        }))
    }
}
