//! HTTP route definitions.

mod clients;
mod health;
mod ranking;
mod scheduler;
mod storage;
mod sync;

use crate::AppState;
use axum::Router;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(clients::routes())
        .merge(sync::routes())
        .merge(scheduler::routes())
        .merge(storage::routes())
        .merge(ranking::routes())
}
