//! Polling scheduler - drives reconciliation cycles on a fixed period.
//!
//! One background task runs a full cycle, checks whether the liveness cleanup
//! is due, then sleeps. A cycle that panics is logged and followed by a short
//! backoff; the loop itself only exits on [`PollingScheduler::stop`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::config::MIN_SYNC_INTERVAL_SECS;
use crate::reconcile::{ReconciliationEngine, SyncSummary};
use crate::registry::ClientRegistry;

/// Delay before the next tick after a failed one.
pub const TICK_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Scheduler configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("sync interval must be at least {min} seconds, got {requested}")]
    IntervalTooShort { requested: u64, min: u64 },

    #[error("cleanup interval must be at least 1 second")]
    InvalidCleanupInterval,
}

/// Bookkeeping shared between the loop and status readers.
#[derive(Debug, Default)]
struct Stats {
    cycles_run: u64,
    cleanups_run: u64,
    last_run_at: Option<DateTime<Utc>>,
    last_cleanup_at: Option<DateTime<Utc>>,
    last_summary: Option<SyncSummary>,
    last_error: Option<String>,
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub sync_interval_secs: u64,
    pub cleanup_interval_secs: u64,
    pub cycles_run: u64,
    pub cleanups_run: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_cleanup_at: Option<DateTime<Utc>>,
    pub last_summary: Option<SyncSummary>,
    pub last_error: Option<String>,
}

struct Running {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Everything the background loop needs, cloned into the task.
#[derive(Clone)]
struct LoopContext {
    engine: Arc<ReconciliationEngine>,
    registry: Arc<ClientRegistry>,
    sync_interval_secs: Arc<AtomicU64>,
    cleanup_interval_secs: Arc<AtomicU64>,
    stats: Arc<StdMutex<Stats>>,
}

impl LoopContext {
    fn record<F: FnOnce(&mut Stats)>(&self, f: F) {
        let mut stats = self.stats.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut stats);
    }
}

/// Periodic driver for the reconciliation engine.
pub struct PollingScheduler {
    ctx: LoopContext,
    running: Mutex<Option<Running>>,
}

impl std::fmt::Debug for PollingScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingScheduler")
            .field("sync_interval_secs", &self.ctx.sync_interval_secs)
            .field("cleanup_interval_secs", &self.ctx.cleanup_interval_secs)
            .finish_non_exhaustive()
    }
}

impl PollingScheduler {
    /// Create a stopped scheduler.
    pub fn new(
        engine: Arc<ReconciliationEngine>,
        registry: Arc<ClientRegistry>,
        sync_interval: Duration,
        cleanup_interval: Duration,
    ) -> Result<Self, SchedulerError> {
        let sync_secs = validate_sync_interval(sync_interval.as_secs())?;
        let cleanup_secs = validate_cleanup_interval(cleanup_interval.as_secs())?;

        Ok(Self {
            ctx: LoopContext {
                engine,
                registry,
                sync_interval_secs: Arc::new(AtomicU64::new(sync_secs)),
                cleanup_interval_secs: Arc::new(AtomicU64::new(cleanup_secs)),
                stats: Arc::new(StdMutex::new(Stats::default())),
            },
            running: Mutex::new(None),
        })
    }

    /// Start the background loop. Returns false if it was already running.
    pub async fn start(&self) -> bool {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return false;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(self.ctx.clone(), shutdown_rx));
        *running = Some(Running { shutdown, handle });

        tracing::info!(
            interval_secs = self.sync_interval_secs(),
            cleanup_interval_secs = self.cleanup_interval_secs(),
            "Polling scheduler started"
        );
        true
    }

    /// Stop the loop and wait for it to exit. Returns false if it was not
    /// running.
    ///
    /// A cycle already in flight finishes first; its HTTP calls are bounded
    /// by their own timeouts.
    pub async fn stop(&self) -> bool {
        let Some(running) = self.running.lock().await.take() else {
            return false;
        };

        let _ = running.shutdown.send(true);
        if let Err(e) = running.handle.await {
            tracing::error!("Polling scheduler task ended abnormally: {}", e);
        }

        tracing::info!("Polling scheduler stopped");
        true
    }

    /// Whether the loop is active.
    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Change the polling period. Takes effect after the current sleep.
    pub fn set_sync_interval(&self, seconds: u64) -> Result<(), SchedulerError> {
        let seconds = validate_sync_interval(seconds)?;
        self.ctx.sync_interval_secs.store(seconds, Ordering::SeqCst);
        tracing::info!(interval_secs = seconds, "Sync interval updated");
        Ok(())
    }

    /// Change the liveness cleanup period.
    pub fn set_cleanup_interval(&self, seconds: u64) -> Result<(), SchedulerError> {
        let seconds = validate_cleanup_interval(seconds)?;
        self.ctx.cleanup_interval_secs.store(seconds, Ordering::SeqCst);
        tracing::info!(cleanup_interval_secs = seconds, "Cleanup interval updated");
        Ok(())
    }

    /// Change both periods at once. Nothing is applied unless both are valid.
    pub fn set_intervals(
        &self,
        sync_seconds: u64,
        cleanup_seconds: Option<u64>,
    ) -> Result<(), SchedulerError> {
        let sync_seconds = validate_sync_interval(sync_seconds)?;
        let cleanup_seconds = cleanup_seconds.map(validate_cleanup_interval).transpose()?;

        self.set_sync_interval(sync_seconds)?;
        if let Some(cleanup_seconds) = cleanup_seconds {
            self.set_cleanup_interval(cleanup_seconds)?;
        }
        Ok(())
    }

    pub fn sync_interval_secs(&self) -> u64 {
        self.ctx.sync_interval_secs.load(Ordering::SeqCst)
    }

    pub fn cleanup_interval_secs(&self) -> u64 {
        self.ctx.cleanup_interval_secs.load(Ordering::SeqCst)
    }

    /// Current status.
    pub async fn status(&self) -> SchedulerStatus {
        let running = self.is_running().await;
        let stats = self.ctx.stats.lock().unwrap_or_else(|p| p.into_inner());
        SchedulerStatus {
            running,
            sync_interval_secs: self.sync_interval_secs(),
            cleanup_interval_secs: self.cleanup_interval_secs(),
            cycles_run: stats.cycles_run,
            cleanups_run: stats.cleanups_run,
            last_run_at: stats.last_run_at,
            last_cleanup_at: stats.last_cleanup_at,
            last_summary: stats.last_summary.clone(),
            last_error: stats.last_error.clone(),
        }
    }
}

fn validate_sync_interval(seconds: u64) -> Result<u64, SchedulerError> {
    if seconds < MIN_SYNC_INTERVAL_SECS {
        return Err(SchedulerError::IntervalTooShort {
            requested: seconds,
            min: MIN_SYNC_INTERVAL_SECS,
        });
    }
    Ok(seconds)
}

fn validate_cleanup_interval(seconds: u64) -> Result<u64, SchedulerError> {
    if seconds == 0 {
        return Err(SchedulerError::InvalidCleanupInterval);
    }
    Ok(seconds)
}

async fn run_loop(ctx: LoopContext, mut shutdown: watch::Receiver<bool>) {
    let mut last_cleanup = Instant::now();

    loop {
        if *shutdown.borrow() {
            break;
        }

        let delay = match run_tick(&ctx, &mut last_cleanup).await {
            Ok(()) => Duration::from_secs(ctx.sync_interval_secs.load(Ordering::SeqCst)),
            Err(e) => {
                tracing::error!("Scheduler tick failed: {}", e);
                ctx.record(|stats| stats.last_error = Some(e));
                TICK_ERROR_BACKOFF
            }
        };

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// One tick: a full cycle, then the cleanup pass if it is due.
///
/// Work runs in its own task so a panic surfaces as an error here instead of
/// tearing down the loop.
async fn run_tick(ctx: &LoopContext, last_cleanup: &mut Instant) -> Result<(), String> {
    let engine = ctx.engine.clone();
    let summary = tokio::spawn(async move { engine.run_full_cycle().await })
        .await
        .map_err(|e| format!("reconciliation cycle aborted: {}", e))?;

    ctx.record(|stats| {
        stats.cycles_run += 1;
        stats.last_run_at = Some(Utc::now());
        stats.last_summary = Some(summary);
        stats.last_error = None;
    });

    let cleanup_every = Duration::from_secs(ctx.cleanup_interval_secs.load(Ordering::SeqCst));
    if last_cleanup.elapsed() >= cleanup_every {
        *last_cleanup = Instant::now();
        let registry = ctx.registry.clone();
        let removed = tokio::spawn(async move { registry.cleanup_inactive().await })
            .await
            .map_err(|e| format!("client cleanup aborted: {}", e))?;

        ctx.record(|stats| {
            stats.cleanups_run += 1;
            stats.last_cleanup_at = Some(Utc::now());
        });
        tracing::info!(removed, "Client liveness cleanup finished");
    }

    Ok(())
}
