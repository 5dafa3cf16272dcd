//! Manual sync trigger endpoints.

use axum::{extract::State, routing::post, Json, Router};

use crate::auth::AuthUser;
use crate::reconcile::SyncSummary;
use crate::AppState;

/// Create sync routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/sync/pull", post(pull_all))
        .route("/api/sync/pull/recent", post(pull_recent))
}

/// POST /api/sync/pull - Run a full reconciliation cycle now.
///
/// Always 200: failed clients are listed in the summary.
async fn pull_all(State(state): State<AppState>, _auth: AuthUser) -> Json<SyncSummary> {
    Json(state.engine.run_full_cycle().await)
}

/// POST /api/sync/pull/recent - Run a recent-changes cycle now.
async fn pull_recent(State(state): State<AppState>, _auth: AuthUser) -> Json<SyncSummary> {
    Json(state.engine.run_recent_cycle().await)
}
