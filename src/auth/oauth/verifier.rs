use crate::error::AppError;
use chrono::Utc;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tokio::sync::RwLock;

/// Claims asserted by a Google ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    pub aud: String,
    pub iss: String,
    pub exp: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Verifies Google ID tokens against the published JWKS.
///
/// The signature is checked before any claim is looked at, so a token whose
/// claims are wrong but whose signature is invalid reports a signature
/// failure, never a claim failure.
pub struct IdTokenVerifier {
    client_id: String,
    issuers: Vec<String>,
    certs_url: String,
    http_client: reqwest::Client,
    keys: RwLock<Option<JwkSet>>,
}

impl IdTokenVerifier {
    pub fn new(client_id: String, issuers: Vec<String>, certs_url: String) -> Self {
        Self {
            client_id,
            issuers,
            certs_url,
            http_client: reqwest::Client::new(),
            keys: RwLock::new(None),
        }
    }

    /// Verify signature, audience, issuer, and expiry, in that order.
    pub async fn verify(&self, id_token: &str) -> Result<IdTokenClaims, AppError> {
        let header = decode_header(id_token)
            .map_err(|_| AppError::InvalidIdentityAssertion("Malformed ID token".to_string()))?;
        let kid = header.kid.ok_or_else(|| {
            AppError::InvalidIdentityAssertion("ID token missing key id".to_string())
        })?;

        let (decoding_key, algorithm) = self.decoding_key_for(&kid).await?;

        // Signature only, with the algorithm pinned to the one the signing
        // key declares rather than whatever the token header asks for. Claim
        // checks follow explicitly so failures are reported in a
        // deterministic order.
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let token_data = decode::<IdTokenClaims>(id_token, &decoding_key, &validation)
            .map_err(|_| {
                AppError::InvalidIdentityAssertion("ID token signature invalid".to_string())
            })?;
        let claims = token_data.claims;

        if claims.aud != self.client_id {
            return Err(AppError::InvalidIdentityAssertion(
                "ID token audience mismatch".to_string(),
            ));
        }

        if !self.issuers.iter().any(|iss| iss == &claims.iss) {
            return Err(AppError::InvalidIdentityAssertion(
                "ID token issuer not trusted".to_string(),
            ));
        }

        if claims.exp <= Utc::now().timestamp() {
            return Err(AppError::InvalidIdentityAssertion(
                "ID token expired".to_string(),
            ));
        }

        Ok(claims)
    }

    /// Look up the signing key and its declared algorithm, refreshing the
    /// JWKS once when the key id is unknown. Providers rotate keys, so a miss
    /// is not immediately fatal.
    async fn decoding_key_for(&self, kid: &str) -> Result<(DecodingKey, Algorithm), AppError> {
        if let Some(key) = self.cached_key(kid).await? {
            return Ok(key);
        }

        self.refresh_keys().await?;

        self.cached_key(kid).await?.ok_or_else(|| {
            AppError::InvalidIdentityAssertion("ID token signed by unknown key".to_string())
        })
    }

    async fn cached_key(&self, kid: &str) -> Result<Option<(DecodingKey, Algorithm)>, AppError> {
        let keys = self.keys.read().await;
        let Some(jwks) = keys.as_ref() else {
            return Ok(None);
        };
        let Some(jwk) = jwks.find(kid) else {
            return Ok(None);
        };

        let algorithm = jwk
            .common
            .key_algorithm
            .and_then(|alg| Algorithm::from_str(&alg.to_string()).ok())
            .ok_or_else(|| {
                AppError::InvalidIdentityAssertion(
                    "Signing key declares no usable algorithm".to_string(),
                )
            })?;

        let key = DecodingKey::from_jwk(jwk).map_err(|e| {
            AppError::InvalidIdentityAssertion(format!("Unusable signing key: {e}"))
        })?;
        Ok(Some((key, algorithm)))
    }

    async fn refresh_keys(&self) -> Result<(), AppError> {
        tracing::debug!(url = %self.certs_url, "Refreshing provider signing keys");

        let jwks: JwkSet = self
            .http_client
            .get(&self.certs_url)
            .send()
            .await
            .map_err(|e| {
                AppError::InvalidIdentityAssertion(format!("Failed to fetch signing keys: {e}"))
            })?
            .error_for_status()
            .map_err(|e| {
                AppError::InvalidIdentityAssertion(format!("Signing key endpoint error: {e}"))
            })?
            .json()
            .await
            .map_err(|e| {
                AppError::InvalidIdentityAssertion(format!("Invalid signing key document: {e}"))
            })?;

        *self.keys.write().await = Some(jwks);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECRET: &[u8] = b"verifier-test-secret";
    const KID: &str = "test-key-1";
    const CLIENT_ID: &str = "marketplace-client";
    const ISSUER: &str = "https://accounts.google.com";

    fn jwks_json() -> serde_json::Value {
        serde_json::json!({
            "keys": [{
                "kty": "oct",
                "alg": "HS256",
                "kid": KID,
                "k": URL_SAFE_NO_PAD.encode(SECRET),
            }]
        })
    }

    async fn mock_certs_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/certs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json()))
            .mount(&server)
            .await;
        server
    }

    fn verifier(certs_url: String) -> IdTokenVerifier {
        IdTokenVerifier::new(
            CLIENT_ID.to_string(),
            vec![ISSUER.to_string(), "accounts.google.com".to_string()],
            certs_url,
        )
    }

    fn sign(claims: &IdTokenClaims, kid: &str, secret: &[u8]) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(kid.to_string());
        encode(&header, claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn valid_claims() -> IdTokenClaims {
        IdTokenClaims {
            sub: "google-user-1".to_string(),
            aud: CLIENT_ID.to_string(),
            iss: ISSUER.to_string(),
            exp: Utc::now().timestamp() + 300,
            email: Some("alice@example.com".to_string()),
            email_verified: Some(true),
            given_name: Some("Alice".to_string()),
            family_name: None,
            picture: None,
        }
    }

    #[tokio::test]
    async fn test_verify_valid_token() {
        let server = mock_certs_server().await;
        let verifier = verifier(format!("{}/certs", server.uri()));

        let token = sign(&valid_claims(), KID, SECRET);
        let claims = verifier.verify(&token).await.unwrap();

        assert_eq!(claims.sub, "google-user-1");
        assert_eq!(claims.email.as_deref(), Some("alice@example.com"));
    }

    #[tokio::test]
    async fn test_verify_rejects_tampered_signature() {
        let server = mock_certs_server().await;
        let verifier = verifier(format!("{}/certs", server.uri()));

        let token = sign(&valid_claims(), KID, b"some-other-secret");
        let err = verifier.verify(&token).await.unwrap_err();
        assert!(err.to_string().contains("signature"));
    }

    #[tokio::test]
    async fn test_verify_rejects_foreign_audience() {
        let server = mock_certs_server().await;
        let verifier = verifier(format!("{}/certs", server.uri()));

        let mut claims = valid_claims();
        claims.aud = "some-other-app".to_string();
        let token = sign(&claims, KID, SECRET);

        let err = verifier.verify(&token).await.unwrap_err();
        assert!(err.to_string().contains("audience"));
    }

    #[tokio::test]
    async fn test_verify_rejects_untrusted_issuer() {
        let server = mock_certs_server().await;
        let verifier = verifier(format!("{}/certs", server.uri()));

        let mut claims = valid_claims();
        claims.iss = "https://evil.example".to_string();
        let token = sign(&claims, KID, SECRET);

        let err = verifier.verify(&token).await.unwrap_err();
        assert!(err.to_string().contains("issuer"));
    }

    #[tokio::test]
    async fn test_verify_rejects_expired_token() {
        let server = mock_certs_server().await;
        let verifier = verifier(format!("{}/certs", server.uri()));

        let mut claims = valid_claims();
        claims.exp = Utc::now().timestamp() - 10;
        let token = sign(&claims, KID, SECRET);

        let err = verifier.verify(&token).await.unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[tokio::test]
    async fn test_verify_rejects_unknown_kid() {
        let server = mock_certs_server().await;
        let verifier = verifier(format!("{}/certs", server.uri()));

        let token = sign(&valid_claims(), "rotated-away", SECRET);
        let err = verifier.verify(&token).await.unwrap_err();
        assert!(err.to_string().contains("unknown key"));
    }

    #[tokio::test]
    async fn test_verify_rejects_missing_kid() {
        let server = mock_certs_server().await;
        let verifier = verifier(format!("{}/certs", server.uri()));

        let token = encode(
            &Header::new(Algorithm::HS256),
            &valid_claims(),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        let err = verifier.verify(&token).await.unwrap_err();
        assert!(err.to_string().contains("key id"));
    }

    #[tokio::test]
    async fn test_verify_rejects_algorithm_the_key_does_not_declare() {
        let server = mock_certs_server().await;
        let verifier = verifier(format!("{}/certs", server.uri()));

        // Token header asks for a different algorithm than the JWK declares;
        // the pinned validation refuses it
        let mut header = Header::new(Algorithm::HS384);
        header.kid = Some(KID.to_string());
        let token = encode(&header, &valid_claims(), &EncodingKey::from_secret(SECRET)).unwrap();

        let err = verifier.verify(&token).await.unwrap_err();
        assert!(err.to_string().contains("signature"));
    }

    #[tokio::test]
    async fn test_signature_checked_before_claims() {
        let server = mock_certs_server().await;
        let verifier = verifier(format!("{}/certs", server.uri()));

        // Expired AND badly signed: the signature failure must win.
        let mut claims = valid_claims();
        claims.exp = Utc::now().timestamp() - 10;
        let token = sign(&claims, KID, b"some-other-secret");

        let err = verifier.verify(&token).await.unwrap_err();
        assert!(err.to_string().contains("signature"));
    }
}
