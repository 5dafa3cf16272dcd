//! Client registration endpoints.

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::registry::{ClientRegistration, RegisteredClient};
use crate::AppState;

/// Create client routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/sync/clients", get(list_clients).post(register_client))
        .route("/api/sync/clients/cleanup", post(cleanup_clients))
        .route("/api/sync/clients/{client_id}", delete(unregister_client))
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub client_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ClientListResponse {
    pub clients: Vec<RegisteredClient>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub success: bool,
    pub removed_count: usize,
    pub remaining: usize,
}

/// POST /api/sync/clients - Register a client after a health probe.
async fn register_client(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(registration): Json<ClientRegistration>,
) -> Result<Json<RegisterResponse>> {
    let registration = registration.validate().map_err(AppError::BadRequest)?;
    let client_id = registration.client_id.clone();
    let client_url = registration.client_url.clone();

    let success = state.registry.register(registration).await;
    let message = if success {
        format!("Client {} registered", client_id)
    } else {
        format!("Health check failed for {}", client_url)
    };

    Ok(Json(RegisterResponse {
        success,
        client_id,
        message,
    }))
}

/// GET /api/sync/clients - List registered clients.
async fn list_clients(State(state): State<AppState>) -> Json<ClientListResponse> {
    let clients = state.registry.list();
    Json(ClientListResponse {
        count: clients.len(),
        clients,
    })
}

/// DELETE /api/sync/clients/{client_id} - Unregister a client.
async fn unregister_client(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(client_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    if !state.registry.unregister(&client_id) {
        return Err(AppError::NotFound(format!("client {}", client_id)));
    }
    Ok(Json(serde_json::json!({
        "success": true,
        "client_id": client_id,
    })))
}

/// POST /api/sync/clients/cleanup - Probe all clients and drop dead ones.
async fn cleanup_clients(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Json<CleanupResponse> {
    let removed_count = state.registry.cleanup_inactive().await;
    Json(CleanupResponse {
        success: true,
        removed_count,
        remaining: state.registry.len(),
    })
}
