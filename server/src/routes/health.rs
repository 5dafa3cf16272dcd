//! Liveness endpoints. Client instances are probed on `/health` of their own;
//! this is the server's.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    pub registered_clients: usize,
    pub consolidated_clients: usize,
    pub scheduler_running: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        database: state.db.backend_name(),
        registered_clients: state.registry.len(),
        consolidated_clients: state.store.stats().await.total_clients,
        scheduler_running: state.scheduler.is_running().await,
    })
}

async fn root() -> &'static str {
    "Pokesync Server"
}
