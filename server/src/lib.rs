//! Pokesync Server - pull-based synchronization for Pokedex client instances.
//!
//! The server keeps a registry of client instances, polls each one for its
//! full capture list on a fixed period, folds the reports into a file-backed
//! consolidated store, and rebuilds the popularity ranking plus a legacy
//! favorites mirror in PostgreSQL.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod ranking;
pub mod reconcile;
pub mod registry;
pub mod remote;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod storage;

pub use state::AppState;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the application router with its middleware stack.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
