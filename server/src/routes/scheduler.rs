//! Scheduler control endpoints.

use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::scheduler::SchedulerStatus;
use crate::AppState;

/// Create scheduler routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/sync/scheduler", get(status))
        .route("/api/sync/scheduler/start", post(start))
        .route("/api/sync/scheduler/stop", post(stop))
        .route("/api/sync/scheduler/interval", put(set_interval))
}

/// Body for interval changes.
#[derive(Debug, Deserialize)]
pub struct IntervalRequest {
    /// Polling period in seconds (minimum 5)
    pub seconds: u64,
    /// Optional liveness cleanup period in seconds
    pub cleanup_seconds: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub success: bool,
    pub running: bool,
    pub message: String,
}

/// GET /api/sync/scheduler - Scheduler status.
async fn status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status().await)
}

/// POST /api/sync/scheduler/start - Start polling.
async fn start(State(state): State<AppState>, _auth: AuthUser) -> Json<ControlResponse> {
    let started = state.scheduler.start().await;
    Json(ControlResponse {
        success: true,
        running: true,
        message: if started {
            "Scheduler started".to_string()
        } else {
            "Scheduler already running".to_string()
        },
    })
}

/// POST /api/sync/scheduler/stop - Stop polling and wait for the loop to exit.
async fn stop(State(state): State<AppState>, _auth: AuthUser) -> Json<ControlResponse> {
    let stopped = state.scheduler.stop().await;
    Json(ControlResponse {
        success: true,
        running: false,
        message: if stopped {
            "Scheduler stopped".to_string()
        } else {
            "Scheduler was not running".to_string()
        },
    })
}

/// PUT /api/sync/scheduler/interval - Change the polling period.
async fn set_interval(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(request): Json<IntervalRequest>,
) -> Result<Json<SchedulerStatus>> {
    state
        .scheduler
        .set_intervals(request.seconds, request.cleanup_seconds)?;
    Ok(Json(state.scheduler.status().await))
}
