use crate::{
    auth::{
        CredentialIssuer, ReconciliationEngine, StateStore,
        jwt::{JwtService, JwtServiceImpl, parse_algorithm},
        middleware::jwt_auth_middleware,
        oauth::OAuthService,
    },
    cache::CacheManager,
    config::Config,
    database::{DatabaseManager, DatabaseManagerImpl},
    error::AppError,
    health::HealthService,
    routes::{create_auth_routes, create_health_routes, create_protected_auth_routes},
};
use axum::{Router, middleware};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone)]
pub struct Server {
    pub config: Arc<Config>,
    pub jwt_service: Arc<dyn JwtService>,
    pub oauth_service: Arc<OAuthService>,
    pub credential_issuer: CredentialIssuer,
    pub health_service: Arc<HealthService>,
    pub database: Arc<dyn DatabaseManager>,
    pub cache: Arc<CacheManager>,
}

impl Server {
    pub async fn new(config: Config) -> Result<Self, AppError> {
        let jwt_algorithm = parse_algorithm(&config.jwt.algorithm)?;
        let jwt_service_impl = JwtServiceImpl::new(&config.jwt.secret, jwt_algorithm)?;
        let jwt_service: Arc<dyn JwtService> = Arc::new(jwt_service_impl.clone());

        let cache = Arc::new(CacheManager::new_from_config(&config.cache)?);

        let database_impl = Arc::new(DatabaseManagerImpl::new_from_config(&config).await?);
        let database: Arc<dyn DatabaseManager> = database_impl.clone();

        let state_store = StateStore::new(cache.clone());
        let reconciler = ReconciliationEngine::new(
            database.users(),
            database.links(),
            config.app.domain.clone(),
        );
        let oauth_service = Arc::new(OAuthService::new(&config.oauth, state_store, reconciler)?);

        let credential_issuer = CredentialIssuer::new(
            jwt_service.clone(),
            database.refresh_tokens(),
            config.jwt.clone(),
            config.refresh_cookie.clone(),
        );

        let health_service = Arc::new(HealthService::new());
        health_service.register(database_impl).await;
        health_service.register(cache.clone()).await;
        health_service.register(jwt_service_impl.health_checker()).await;

        Ok(Self {
            config: Arc::new(config),
            jwt_service,
            oauth_service,
            credential_issuer,
            health_service,
            database,
            cache,
        })
    }

    pub async fn run(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        self.database.migrate().await?;

        let removed = self.database.refresh_tokens().cleanup_expired().await?;
        if removed > 0 {
            info!(removed, "Dropped expired refresh tokens");
        }

        info!(
            cache = self.cache.backend_name(),
            checks = ?self.health_service.registered_checkers().await,
            "Server components initialized"
        );

        let app = self.create_app();

        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid server host: {e}")))?,
            self.config.server.port,
        );
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to bind to address: {e}")))?;

        info!("Server listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Graceful shutdown initiated");
            })
            .await
            .map_err(|e| AppError::Internal(format!("Server error: {e}")))?;

        info!("Server shutdown complete");
        Ok(())
    }

    /// Creates the application router
    pub fn create_app(&self) -> Router {
        Router::new()
            .nest("/auth", create_auth_routes())
            .nest("/auth", self.protected_auth_routes())
            .nest("/health", create_health_routes())
            .with_state(self.clone())
    }

    fn protected_auth_routes(&self) -> Router<Server> {
        create_protected_auth_routes().layer(middleware::from_fn_with_state(
            self.clone(),
            jwt_auth_middleware,
        ))
    }
}
