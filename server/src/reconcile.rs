//! Reconciliation engine - one pull-sync cycle across all registered clients.
//!
//! # Cycle
//!
//! 1. Fetch every registered client's capture report concurrently
//! 2. Resolve each report (drop removed entries and unsupported actions)
//! 3. Merge each client into the consolidated store, in client id order
//! 4. Rebuild the persisted ranking
//! 5. Mirror the counts into the legacy favorites bucket
//! 6. Acknowledge consumed records (best effort)
//!
//! A client that cannot be fetched is reported as failed and skipped; it
//! stays registered. Cycles never overlap: manual triggers and scheduler
//! ticks queue on the same lock, as do the storage admin mutations. The
//! ranking and the favorites mirror are both derived from one counts
//! snapshot, so they always reflect exactly one cycle's merges.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use pokesync_engine::{resolve_captures, PokemonId, RankingStats, StorageStats};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::Config;
use crate::db::{to_column, Database, DbError, StoredFavorite, LEGACY_BUCKET_USER_ID};
use crate::ranking::RankingComputer;
use crate::registry::{ClientRegistry, RegisteredClient};
use crate::remote::RemoteClient;
use crate::storage::ConsolidatedStore;

/// Which fetch a cycle performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Full capture history; replaces each client's set
    Full,
    /// Only records inside the lookback window; merged additively
    Recent,
}

/// Tunables for the engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub fetch_timeout: Duration,
    pub acknowledge_timeout: Duration,
    pub ranking_limit: usize,
    pub recent_window: Duration,
    pub acknowledge_captures: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fetch_timeout: config.fetch_timeout,
            acknowledge_timeout: config.health_timeout,
            ranking_limit: config.ranking_limit,
            recent_window: config.recent_window,
            acknowledge_captures: config.acknowledge_captures,
        }
    }
}

/// Per-client outcome within a cycle.
#[derive(Debug, Clone, Serialize)]
pub struct ClientSyncReport {
    pub client_id: String,
    pub client_url: String,
    pub active_captures: usize,
    pub added_count: usize,
    pub removed_count: usize,
    pub total_captures: usize,
    pub skipped_removed: usize,
    pub skipped_action: usize,
    pub malformed: usize,
}

/// Outcome of the legacy favorites mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FavoritesStats {
    pub user_id: i64,
    pub deleted_count: u64,
    pub inserted_count: usize,
}

/// Summary of one reconciliation cycle.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub cycle_id: Uuid,
    pub mode: SyncMode,
    /// True iff no client failed
    pub success: bool,
    pub clients_processed: usize,
    pub total_captures: usize,
    /// URLs of clients that could not be fetched
    pub failed_clients: Vec<String>,
    pub errors: Vec<String>,
    pub clients: Vec<ClientSyncReport>,
    pub ranking_stats: Option<RankingStats>,
    pub favorites_stats: Option<FavoritesStats>,
    pub storage_stats: StorageStats,
    pub started_at: DateTime<Utc>,
    pub processing_time_ms: u64,
}

/// Orchestrates fetch, merge, ranking and mirror for all registered clients.
#[derive(Debug)]
pub struct ReconciliationEngine {
    registry: Arc<ClientRegistry>,
    store: Arc<ConsolidatedStore>,
    ranking: Arc<RankingComputer>,
    db: Database,
    remote: RemoteClient,
    settings: EngineSettings,
    cycle_lock: Mutex<()>,
}

impl ReconciliationEngine {
    pub fn new(
        registry: Arc<ClientRegistry>,
        store: Arc<ConsolidatedStore>,
        ranking: Arc<RankingComputer>,
        db: Database,
        remote: RemoteClient,
        settings: EngineSettings,
    ) -> Self {
        Self {
            registry,
            store,
            ranking,
            db,
            remote,
            settings,
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Pull every client's full capture list and reconcile.
    pub async fn run_full_cycle(&self) -> SyncSummary {
        self.run_cycle(SyncMode::Full).await
    }

    /// Pull only records inside the lookback window and reconcile.
    pub async fn run_recent_cycle(&self) -> SyncSummary {
        self.run_cycle(SyncMode::Recent).await
    }

    /// Rebuild the persisted ranking outside a cycle.
    pub async fn rebuild_ranking(&self, limit: usize) -> Result<RankingStats, DbError> {
        let _guard = self.cycle_lock.lock().await;
        self.ranking.recompute(limit).await
    }

    /// Drop one client's consolidated captures between cycles.
    pub async fn remove_client_captures(&self, client_id: &str) -> bool {
        let _guard = self.cycle_lock.lock().await;
        self.store.remove_client(client_id).await
    }

    /// Drop every client's consolidated captures between cycles.
    pub async fn clear_storage(&self) {
        let _guard = self.cycle_lock.lock().await;
        self.store.clear().await;
    }

    async fn run_cycle(&self, mode: SyncMode) -> SyncSummary {
        let _guard = self.cycle_lock.lock().await;

        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        let timer = Instant::now();
        let since = match mode {
            SyncMode::Full => None,
            SyncMode::Recent => chrono::Duration::from_std(self.settings.recent_window)
                .ok()
                .map(|window| started_at - window),
        };

        let clients = self.registry.list();
        tracing::info!(
            cycle_id = %cycle_id,
            mode = ?mode,
            clients = clients.len(),
            "Starting reconciliation cycle"
        );

        let fetches = clients.iter().map(|client| async move {
            let result = self
                .remote
                .fetch_captures(client.client_url(), since, self.settings.fetch_timeout)
                .await;
            (client, result)
        });
        let fetched = join_all(fetches).await;

        let mut failed_clients = Vec::new();
        let mut errors = Vec::new();
        let mut reports = Vec::new();
        let mut acknowledgements: Vec<(&RegisteredClient, Vec<String>)> = Vec::new();
        let mut total_captures = 0;

        for (client, result) in fetched {
            let raw = match result {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(
                        cycle_id = %cycle_id,
                        client_id = %client.client_id(),
                        "Failed to fetch captures: {}",
                        e
                    );
                    failed_clients.push(client.client_url().to_string());
                    errors.push(format!("{}: {}", client.client_id(), e));
                    continue;
                }
            };
            self.registry.mark_seen(client.client_id(), Utc::now());

            let batch = resolve_captures(&raw, since);
            errors.extend(
                batch
                    .errors
                    .iter()
                    .map(|e| format!("{}: {}", client.client_id(), e)),
            );

            let stats = match mode {
                SyncMode::Full => {
                    self.store
                        .update_client_captures(client.client_id(), &batch.active)
                        .await
                }
                SyncMode::Recent => {
                    self.store
                        .apply_client_changes(client.client_id(), &batch.active, &batch.removed_ids)
                        .await
                }
            };

            total_captures += batch.active.len();
            reports.push(ClientSyncReport {
                client_id: client.client_id().to_string(),
                client_url: client.client_url().to_string(),
                active_captures: batch.active.len(),
                added_count: stats.added_count,
                removed_count: stats.removed_count,
                total_captures: stats.total_captures,
                skipped_removed: batch.skipped_removed,
                skipped_action: batch.skipped_action,
                malformed: batch.errors.len(),
            });

            if self.settings.acknowledge_captures && !batch.consumed_ids.is_empty() {
                acknowledgements.push((client, batch.consumed_ids));
            }
        }

        // Ranking and mirror derive from the same counts
        let counts = self.store.pokemon_counts().await;

        let ranking_stats = match self
            .ranking
            .rebuild_from(&counts, self.settings.ranking_limit)
            .await
        {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::error!(cycle_id = %cycle_id, "Ranking rebuild failed: {}", e);
                errors.push(format!("ranking: {}", e));
                None
            }
        };

        let favorites_stats = match self.mirror_favorites(&counts).await {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::error!(cycle_id = %cycle_id, "Legacy favorites mirror failed: {}", e);
                errors.push(format!("favorites: {}", e));
                None
            }
        };

        self.acknowledge(acknowledgements).await;

        let summary = SyncSummary {
            cycle_id,
            mode,
            success: failed_clients.is_empty(),
            clients_processed: reports.len(),
            total_captures,
            failed_clients,
            errors,
            clients: reports,
            ranking_stats,
            favorites_stats,
            storage_stats: self.store.stats().await,
            started_at,
            processing_time_ms: timer.elapsed().as_millis() as u64,
        };

        tracing::info!(
            cycle_id = %cycle_id,
            success = summary.success,
            processed = summary.clients_processed,
            failed = summary.failed_clients.len(),
            captures = summary.total_captures,
            elapsed_ms = summary.processing_time_ms,
            "Reconciliation cycle finished"
        );

        summary
    }

    /// Replace the legacy bucket with one row per counted pokemon.
    async fn mirror_favorites(
        &self,
        counts: &BTreeMap<PokemonId, u32>,
    ) -> Result<FavoritesStats, DbError> {
        let now = Utc::now();
        let rows = counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(pokemon_id, count)| {
                Ok(StoredFavorite {
                    user_id: LEGACY_BUCKET_USER_ID,
                    pokemon_id: to_column("pokemon_id", *pokemon_id)?,
                    pokemon_name: pokesync_engine::pokemon_name(*pokemon_id).into_owned(),
                    capture_count: to_column("capture_count", *count)?,
                    created_at: now,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        let (deleted_count, inserted_count) = self
            .db
            .replace_favorites(LEGACY_BUCKET_USER_ID, &rows)
            .await?;

        tracing::debug!(deleted_count, inserted_count, "Legacy favorites mirrored");
        Ok(FavoritesStats {
            user_id: LEGACY_BUCKET_USER_ID,
            deleted_count,
            inserted_count,
        })
    }

    async fn acknowledge(&self, acknowledgements: Vec<(&RegisteredClient, Vec<String>)>) {
        let posts = acknowledgements.iter().map(|(client, ids)| async move {
            if let Err(e) = self
                .remote
                .acknowledge(client.client_url(), ids, self.settings.acknowledge_timeout)
                .await
            {
                tracing::debug!(
                    client_id = %client.client_id(),
                    "Acknowledgement not delivered: {}",
                    e
                );
            }
        });
        join_all(posts).await;
    }
}
