//! Consolidated store inspection and admin endpoints.

use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Json, Router,
};
use pokesync_engine::{PokemonId, StorageStats};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::AppState;

/// Create storage routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/sync/storage", delete(clear_storage))
        .route("/api/sync/storage/stats", get(storage_stats))
        .route(
            "/api/sync/storage/clients/{client_id}",
            get(client_captures).delete(remove_client),
        )
}

#[derive(Debug, Serialize)]
pub struct ClientCapturesResponse {
    pub client_id: String,
    pub pokemon_ids: Vec<PokemonId>,
    pub count: usize,
}

/// GET /api/sync/storage/stats - Store counters.
async fn storage_stats(State(state): State<AppState>) -> Json<StorageStats> {
    Json(state.store.stats().await)
}

/// GET /api/sync/storage/clients/{client_id} - One client's active set.
async fn client_captures(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<ClientCapturesResponse>> {
    let pokemon_ids = state
        .store
        .client_captures(&client_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("client {}", client_id)))?;

    Ok(Json(ClientCapturesResponse {
        client_id,
        count: pokemon_ids.len(),
        pokemon_ids,
    }))
}

/// DELETE /api/sync/storage/clients/{client_id} - Drop a client's captures.
async fn remove_client(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(client_id): Path<String>,
) -> Result<Json<StorageStats>> {
    if !state.engine.remove_client_captures(&client_id).await {
        return Err(AppError::NotFound(format!("client {}", client_id)));
    }
    Ok(Json(state.store.stats().await))
}

/// DELETE /api/sync/storage - Drop everything.
async fn clear_storage(State(state): State<AppState>, _auth: AuthUser) -> Json<StorageStats> {
    state.engine.clear_storage().await;
    Json(state.store.stats().await)
}
