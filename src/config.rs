use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub refresh_cookie: RefreshCookieConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Application-level settings consumed by the login core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Domain used for synthetic placeholder emails when a provider does not
    /// assert one (e.g. `instagram_12345@example.com`).
    pub domain: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            domain: "example.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// "memory" or "redis"
    pub backend: String,
    pub redis_url: String,
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "market_sso:".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_jwt_algorithm")]
    pub algorithm: String,
    /// Access token TTL in seconds.
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl: u64,
    /// Refresh token TTL in seconds.
    #[serde(default = "default_refresh_token_ttl")]
    pub refresh_token_ttl: u64,
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}

fn default_access_token_ttl() -> u64 {
    3600 // 1 hour
}

fn default_refresh_token_ttl() -> u64 {
    2592000 // 30 days
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "change-me".to_string(),
            algorithm: default_jwt_algorithm(),
            access_token_ttl: default_access_token_ttl(),
            refresh_token_ttl: default_refresh_token_ttl(),
        }
    }
}

/// Attributes of the refresh-token cookie. The path must stay scoped to the
/// refresh endpoint so the browser never attaches the token elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshCookieConfig {
    #[serde(default = "default_cookie_name")]
    pub name: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default = "default_cookie_secure")]
    pub secure: bool,
    /// "strict", "lax", or "none"
    #[serde(default = "default_cookie_same_site")]
    pub same_site: String,
}

fn default_cookie_name() -> String {
    "refresh_token".to_string()
}

fn default_cookie_path() -> String {
    "/auth/refresh".to_string()
}

fn default_cookie_secure() -> bool {
    true
}

fn default_cookie_same_site() -> String {
    "lax".to_string()
}

impl Default for RefreshCookieConfig {
    fn default() -> Self {
        Self {
            name: default_cookie_name(),
            domain: None,
            path: default_cookie_path(),
            secure: default_cookie_secure(),
            same_site: default_cookie_same_site(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OAuthConfig {
    #[serde(default)]
    pub google: Option<GoogleConfig>,
    #[serde(default)]
    pub facebook: Option<ProviderConfig>,
    #[serde(default)]
    pub instagram: Option<ProviderConfig>,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
}

/// Settings for an authorization-code provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub authorization_url: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default)]
    pub profile_url: Option<String>,
}

/// Google adds ID-token verification on top of the common provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(flatten)]
    pub provider: ProviderConfig,
    /// JWKS endpoint publishing Google's signing keys.
    #[serde(default = "default_google_certs_url")]
    pub certs_url: String,
    /// Accepted `iss` claim values.
    #[serde(default = "default_google_issuers")]
    pub issuers: Vec<String>,
}

fn default_google_certs_url() -> String {
    "https://www.googleapis.com/oauth2/v3/certs".to_string()
}

fn default_google_issuers() -> Vec<String> {
    vec![
        "https://accounts.google.com".to_string(),
        "accounts.google.com".to_string(),
    ]
}

/// Telegram has no authorization-code exchange; identity is verified against
/// the Bot API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Apply provider endpoint defaults so deployments only need credentials.
fn apply_provider_defaults(config: &mut Config) {
    if let Some(google) = &mut config.oauth.google {
        let p = &mut google.provider;
        if p.authorization_url.is_none() {
            p.authorization_url = Some("https://accounts.google.com/o/oauth2/v2/auth".to_string());
        }
        if p.token_url.is_none() {
            p.token_url = Some("https://oauth2.googleapis.com/token".to_string());
        }
        if p.scopes.is_empty() {
            p.scopes = vec![
                "openid".to_string(),
                "email".to_string(),
                "profile".to_string(),
            ];
        }
    }

    if let Some(facebook) = &mut config.oauth.facebook {
        if facebook.authorization_url.is_none() {
            facebook.authorization_url =
                Some("https://www.facebook.com/v18.0/dialog/oauth".to_string());
        }
        if facebook.token_url.is_none() {
            facebook.token_url =
                Some("https://graph.facebook.com/v18.0/oauth/access_token".to_string());
        }
        if facebook.profile_url.is_none() {
            facebook.profile_url = Some("https://graph.facebook.com/me".to_string());
        }
        if facebook.scopes.is_empty() {
            facebook.scopes = vec!["email".to_string(), "public_profile".to_string()];
        }
    }

    if let Some(instagram) = &mut config.oauth.instagram {
        if instagram.authorization_url.is_none() {
            instagram.authorization_url =
                Some("https://api.instagram.com/oauth/authorize".to_string());
        }
        if instagram.token_url.is_none() {
            instagram.token_url = Some("https://api.instagram.com/oauth/access_token".to_string());
        }
        if instagram.profile_url.is_none() {
            instagram.profile_url = Some("https://graph.instagram.com/me".to_string());
        }
        if instagram.scopes.is_empty() {
            instagram.scopes = vec!["user_profile".to_string()];
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(config::Config::try_from(&Config::default())?);

        if Path::new("config.yaml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        builder = builder.add_source(
            Environment::with_prefix("MARKET")
                .prefix_separator("_")
                .separator("__"),
        );

        let mut config: Config = builder.build()?.try_deserialize()?;
        apply_provider_defaults(&mut config);
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(config::Config::try_from(&Config::default())?);

        if path.as_ref().exists() {
            builder = builder.add_source(File::from(path.as_ref()));
        }

        builder = builder.add_source(
            Environment::with_prefix("MARKET")
                .prefix_separator("_")
                .separator("__"),
        );

        let mut config: Config = builder.build()?.try_deserialize()?;
        apply_provider_defaults(&mut config);
        Ok(config)
    }
}
