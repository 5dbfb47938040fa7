use crate::{
    auth::jwt::AccessClaims,
    config::Config,
    database::entities::{Role, UserRecord},
    server::Server,
};

/// Test server builder for creating test instances with in-memory backends
pub struct TestServerBuilder {
    config: Config,
    jwt_secret: Option<String>,
}

impl TestServerBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            jwt_secret: Some("test-secret".to_string()),
        }
    }

    /// Set a custom JWT secret for testing
    pub fn with_jwt_secret(mut self, secret: String) -> Self {
        self.jwt_secret = Some(secret);
        self
    }

    /// Set a custom configuration
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Build the test server with configured settings
    pub async fn build(self) -> Server {
        let mut config = self.config;

        config.database.url = "sqlite::memory:".to_string();
        config.cache.backend = "memory".to_string();

        if let Some(secret) = &self.jwt_secret {
            config.jwt.secret = secret.clone();
            config.jwt.algorithm = "HS256".to_string();
        }

        let server = Server::new(config).await.unwrap();
        server.database.migrate().await.unwrap();
        server
    }
}

impl Default for TestServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Create an active, approved test user in the database
pub async fn create_test_user(server: &Server, email: &str) -> UserRecord {
    let user = UserRecord::new(email, Role::Client).with_activated(true, true);
    server.database.users().insert(&user).await.unwrap()
}

/// Create a test JWT access token for the given user
pub fn create_test_jwt(server: &Server, user: &UserRecord) -> String {
    let claims = AccessClaims::new(user.id, user.role, 3600);
    server.jwt_service.create_access_token(&claims).unwrap()
}

/// Create an expired JWT token for testing expiration
pub fn create_expired_jwt_token() -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct ExpiredClaims {
        sub: i32,
        role: String,
        jti: String,
        iat: i64,
        exp: i64,
    }

    let now = chrono::Utc::now().timestamp();
    let expired_claims = ExpiredClaims {
        sub: 1,
        role: "client".to_string(),
        jti: uuid::Uuid::new_v4().to_string(),
        iat: now - 3600,
        exp: now - 1800,
    };

    let key = EncodingKey::from_secret("test-secret".as_ref());
    encode(&Header::default(), &expired_claims, &key).unwrap()
}
