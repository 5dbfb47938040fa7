use crate::health::{HealthStatus, OverallHealthResponse};
use crate::server::Server;
use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
};

pub fn create_health_routes() -> Router<Server> {
    Router::new()
        .route("/", get(health_handler))
        .route("/{check}", get(health_check_handler))
}

/// Liveness probe. Runs no component checks.
pub async fn health_handler(
    State(server): State<Server>,
) -> (StatusCode, Json<OverallHealthResponse>) {
    respond(server.health_service.check_health(None).await)
}

/// Component health. `all` runs every registered check, anything else runs
/// the named check only.
pub async fn health_check_handler(
    State(server): State<Server>,
    Path(check): Path<String>,
) -> (StatusCode, Json<OverallHealthResponse>) {
    respond(server.health_service.check_health(Some(&check)).await)
}

fn respond(response: OverallHealthResponse) -> (StatusCode, Json<OverallHealthResponse>) {
    let status = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(response))
}
