use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use market_sso::{
    Config, Server,
    config::{GoogleConfig, ProviderConfig},
    test_utils::TestServerBuilder,
};
use serde::Serialize;
use serde_json::Value;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CLIENT_ID: &str = "marketplace-client";
pub const ISSUER: &str = "https://accounts.google.com";

const ID_TOKEN_SECRET: &[u8] = b"harness-signing-secret";
const KID: &str = "harness-key-1";

/// Test harness wiring a full server against a mock Google backend.
pub struct TestHarness {
    pub server: Server,
    pub app: Router,
    pub google: MockServer,
}

impl TestHarness {
    pub async fn new() -> Self {
        let google = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/certs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "keys": [{
                    "kty": "oct",
                    "alg": "HS256",
                    "kid": KID,
                    "k": URL_SAFE_NO_PAD.encode(ID_TOKEN_SECRET),
                }]
            })))
            .mount(&google)
            .await;

        let mut config = Config::default();
        config.app.domain = "market.example".to_string();
        config.oauth.google = Some(GoogleConfig {
            provider: ProviderConfig {
                client_id: CLIENT_ID.to_string(),
                client_secret: "test-client-secret".to_string(),
                redirect_uri: "https://market.example/auth/google/callback".to_string(),
                scopes: vec!["openid".to_string(), "email".to_string()],
                authorization_url: Some(format!("{}/auth", google.uri())),
                token_url: Some(format!("{}/token", google.uri())),
                profile_url: None,
            },
            certs_url: format!("{}/certs", google.uri()),
            issuers: vec![ISSUER.to_string(), "accounts.google.com".to_string()],
        });

        let server = TestServerBuilder::new().with_config(config).build().await;
        let app = server.create_app();

        Self {
            server,
            app,
            google,
        }
    }

    /// Mount a token-exchange response for one authorization code.
    pub async fn mock_code_exchange(&self, code: &str, id_token: &str) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains(format!("code={}", code)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": format!("provider-access-{}", code),
                "token_type": "bearer",
                "expires_in": 3600,
                "id_token": id_token,
            })))
            .mount(&self.google)
            .await;
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn request(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Run the authorization URL step and return the issued state token.
    pub async fn issue_state(&self) -> String {
        let response = self.get("/auth/google/url").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        body["state"].as_str().unwrap().to_string()
    }

    /// Complete a full Google login for the given identity and return the
    /// response.
    pub async fn google_login(&self, code: &str, claims: &IdClaims) -> Response<Body> {
        let state = self.issue_state().await;
        self.mock_code_exchange(code, &sign_id_token(claims)).await;
        self.post_json(
            "/auth/google/callback",
            serde_json::json!({ "code": code, "state": state }),
        )
        .await
    }
}

#[derive(Debug, Serialize)]
pub struct IdClaims {
    pub sub: String,
    pub aud: String,
    pub iss: String,
    pub exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
}

impl IdClaims {
    pub fn for_user(sub: &str, email: &str) -> Self {
        Self {
            sub: sub.to_string(),
            aud: CLIENT_ID.to_string(),
            iss: ISSUER.to_string(),
            exp: Utc::now().timestamp() + 300,
            email: Some(email.to_string()),
            email_verified: Some(true),
            given_name: Some("Test".to_string()),
        }
    }
}

/// Sign an ID token with the harness JWKS key.
pub fn sign_id_token(claims: &IdClaims) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(KID.to_string());
    encode(&header, claims, &EncodingKey::from_secret(ID_TOKEN_SECRET)).unwrap()
}

pub async fn read_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Extract the refresh cookie value from a Set-Cookie header.
#[allow(dead_code)]
pub fn refresh_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("refresh_token="))
        .map(|v| v.to_string())
}
