//! Polling scheduler lifecycle tests.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{capture, spawn_mock_client, test_state};
use pokesync_server::registry::ClientRegistration;
use pokesync_server::scheduler::{PollingScheduler, SchedulerError};
use serde_json::json;
use tempfile::TempDir;

#[tokio::test]
async fn interval_below_floor_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (state, _mem) = test_state(&dir).await;

    let err = state.scheduler.set_sync_interval(2).unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::IntervalTooShort { requested: 2, min: 5 }
    ));
    assert_eq!(state.scheduler.sync_interval_secs(), 30);

    state.scheduler.set_sync_interval(5).unwrap();
    assert_eq!(state.scheduler.sync_interval_secs(), 5);
    assert!(state.scheduler.set_cleanup_interval(0).is_err());
}

#[tokio::test]
async fn invalid_cleanup_interval_leaves_sync_interval_alone() {
    let dir = TempDir::new().unwrap();
    let (state, _mem) = test_state(&dir).await;

    let err = state.scheduler.set_intervals(10, Some(0)).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidCleanupInterval));
    assert_eq!(state.scheduler.sync_interval_secs(), 30);
    assert_eq!(state.scheduler.cleanup_interval_secs(), 3600);

    assert!(state.scheduler.set_intervals(2, Some(60)).is_err());
    assert_eq!(state.scheduler.cleanup_interval_secs(), 3600);

    state.scheduler.set_intervals(10, Some(60)).unwrap();
    assert_eq!(state.scheduler.sync_interval_secs(), 10);
    assert_eq!(state.scheduler.cleanup_interval_secs(), 60);
}

#[tokio::test]
async fn construction_rejects_short_interval() {
    let dir = TempDir::new().unwrap();
    let (state, _mem) = test_state(&dir).await;

    let result = PollingScheduler::new(
        state.engine.clone(),
        state.registry.clone(),
        Duration::from_secs(1),
        Duration::from_secs(60),
    );
    assert!(result.is_err());
}

#[tokio::test]
async fn start_runs_a_cycle_and_stop_waits() {
    let dir = TempDir::new().unwrap();
    let (state, _mem) = test_state(&dir).await;
    let client = spawn_mock_client(json!([capture(1, 25, "Pikachu", "2024-05-01T10:00:00Z")])).await;
    assert!(state.registry.register(ClientRegistration::new("alpha", &client.url)).await);

    let scheduler = Arc::clone(&state.scheduler);
    assert!(scheduler.start().await);
    assert!(!scheduler.start().await, "second start is a no-op");
    assert!(scheduler.is_running().await);

    // The first tick runs immediately
    let mut waited = Duration::ZERO;
    while scheduler.status().await.cycles_run == 0 {
        assert!(waited < Duration::from_secs(10), "no cycle ran");
        tokio::time::sleep(Duration::from_millis(50)).await;
        waited += Duration::from_millis(50);
    }

    assert!(scheduler.stop().await);
    assert!(!scheduler.is_running().await);
    assert!(!scheduler.stop().await, "second stop is a no-op");

    let status = scheduler.status().await;
    assert!(!status.running);
    assert!(status.cycles_run >= 1);
    assert!(status.last_summary.unwrap().success);
    assert_eq!(state.store.client_captures("alpha").await, Some(vec![25]));
}

#[tokio::test]
async fn scheduler_can_be_restarted() {
    let dir = TempDir::new().unwrap();
    let (state, _mem) = test_state(&dir).await;

    assert!(state.scheduler.start().await);
    assert!(state.scheduler.stop().await);
    assert!(state.scheduler.start().await);
    assert!(state.scheduler.is_running().await);
    assert!(state.scheduler.stop().await);
}
