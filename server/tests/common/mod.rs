//! Shared helpers: mock client instances and a wired test state.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use pokesync_server::config::Config;
use pokesync_server::db::{Database, MemoryDatabase};
use pokesync_server::AppState;
use serde::Deserialize;
use serde_json::{json, Value};
use tempfile::TempDir;

/// Shared state of a mock client instance.
#[derive(Clone, Default)]
struct MockState {
    captures: Arc<Mutex<Value>>,
    healthy: Arc<AtomicBool>,
    fail_fetch: Arc<AtomicBool>,
    fetch_delay_ms: Arc<AtomicU64>,
    acks: Arc<Mutex<Vec<Vec<String>>>>,
    since_seen: Arc<Mutex<Vec<Option<String>>>>,
}

/// A running mock client instance on 127.0.0.1.
pub struct MockClient {
    pub url: String,
    state: MockState,
    handle: tokio::task::JoinHandle<()>,
}

impl MockClient {
    /// Replace the reported capture list.
    pub fn set_captures(&self, captures: Value) {
        *self.state.captures.lock().unwrap() = captures;
    }

    /// Make the health endpoint answer 503 (or 200 again).
    pub fn set_healthy(&self, healthy: bool) {
        self.state.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Make the capture endpoint answer 500 (or 200 again).
    pub fn set_fail_fetch(&self, fail: bool) {
        self.state.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Delay every capture response by `delay`.
    pub fn set_fetch_delay(&self, delay: Duration) {
        self.state
            .fetch_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Acknowledgement bodies received so far.
    pub fn acks(&self) -> Vec<Vec<String>> {
        self.state.acks.lock().unwrap().clone()
    }

    /// `since` query values received on the capture endpoint.
    pub fn since_seen(&self) -> Vec<Option<String>> {
        self.state.since_seen.lock().unwrap().clone()
    }
}

impl Drop for MockClient {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Deserialize)]
struct SinceQuery {
    since: Option<String>,
}

#[derive(Deserialize)]
struct AckBody {
    capture_ids: Vec<String>,
}

async fn health(State(state): State<MockState>) -> StatusCode {
    if state.healthy.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn all_captures(
    State(state): State<MockState>,
    axum::extract::Query(query): axum::extract::Query<SinceQuery>,
) -> Result<Json<Value>, StatusCode> {
    state.since_seen.lock().unwrap().push(query.since);
    let delay = state.fetch_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if state.fail_fetch.load(Ordering::SeqCst) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let captures = state.captures.lock().unwrap().clone();
    Ok(Json(json!({ "captures": captures })))
}

async fn acknowledge(State(state): State<MockState>, Json(body): Json<AckBody>) -> StatusCode {
    state.acks.lock().unwrap().push(body.capture_ids);
    StatusCode::OK
}

/// Spawn a healthy mock client reporting `captures`.
pub async fn spawn_mock_client(captures: Value) -> MockClient {
    let state = MockState::default();
    state.healthy.store(true, Ordering::SeqCst);
    *state.captures.lock().unwrap() = captures;

    let app = Router::new()
        .route("/health", get(health))
        .route("/all-captures", get(all_captures))
        .route("/acknowledge", post(acknowledge))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockClient { url, state, handle }
}

/// A capture record as a client would report it.
pub fn capture(id: u64, pokemon_id: u32, name: &str, timestamp: &str) -> Value {
    json!({
        "id": id,
        "pokemon_id": pokemon_id,
        "pokemon_name": name,
        "action": "capture",
        "timestamp": timestamp,
        "metadata": {"removed": false}
    })
}

/// Same as [`capture`] but flagged removed.
pub fn removed(id: u64, pokemon_id: u32, name: &str, timestamp: &str) -> Value {
    json!({
        "id": id,
        "pokemon_id": pokemon_id,
        "pokemon_name": name,
        "action": "capture",
        "timestamp": timestamp,
        "metadata": {"removed": true}
    })
}

/// Test configuration with short timeouts and a temp store file.
pub fn test_config(dir: &TempDir) -> Config {
    Config {
        storage_path: dir.path().join("client_storage.json"),
        register_timeout: Duration::from_secs(2),
        health_timeout: Duration::from_secs(1),
        fetch_timeout: Duration::from_secs(2),
        scheduler_autostart: false,
        ..Config::default()
    }
}

/// Fully wired state over in-memory tables.
pub async fn test_state(dir: &TempDir) -> (AppState, MemoryDatabase) {
    test_state_with(test_config(dir)).await
}

/// Fully wired state over in-memory tables with a custom config.
pub async fn test_state_with(config: Config) -> (AppState, MemoryDatabase) {
    let mem = MemoryDatabase::new();
    let state = AppState::build(config, Database::Memory(mem.clone()))
        .await
        .unwrap();
    (state, mem)
}
