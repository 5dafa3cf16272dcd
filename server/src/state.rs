//! Application state shared across handlers and the scheduler.

use std::sync::Arc;

use crate::config::Config;
use crate::db::Database;
use crate::ranking::RankingComputer;
use crate::reconcile::{EngineSettings, ReconciliationEngine};
use crate::registry::ClientRegistry;
use crate::remote::RemoteClient;
use crate::scheduler::{PollingScheduler, SchedulerError};
use crate::storage::ConsolidatedStore;

/// Process-wide services, constructed once at startup and injected into
/// handlers through axum state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub registry: Arc<ClientRegistry>,
    pub store: Arc<ConsolidatedStore>,
    pub ranking: Arc<RankingComputer>,
    pub engine: Arc<ReconciliationEngine>,
    pub scheduler: Arc<PollingScheduler>,
}

impl AppState {
    /// Wire every service from configuration and a relational backend.
    pub async fn build(config: Config, db: Database) -> Result<Self, SchedulerError> {
        let remote = RemoteClient::new();

        let registry = Arc::new(ClientRegistry::new(
            remote.clone(),
            config.register_timeout,
            config.health_timeout,
        ));
        let store = Arc::new(ConsolidatedStore::open(&config.storage_path).await);
        let ranking = Arc::new(RankingComputer::new(store.clone(), db.clone()));
        let engine = Arc::new(ReconciliationEngine::new(
            registry.clone(),
            store.clone(),
            ranking.clone(),
            db.clone(),
            remote,
            EngineSettings::from_config(&config),
        ));
        let scheduler = Arc::new(PollingScheduler::new(
            engine.clone(),
            registry.clone(),
            config.sync_interval,
            config.cleanup_interval,
        )?);

        Ok(Self {
            config: Arc::new(config),
            db,
            registry,
            store,
            ranking,
            engine,
            scheduler,
        })
    }
}
