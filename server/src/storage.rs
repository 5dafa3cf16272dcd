//! File-backed consolidated store.
//!
//! Wraps [`ConsolidatedState`] behind an async mutex and rewrites the whole
//! JSON file (temp file + rename) after every mutation. A failed write is
//! logged and the in-memory state stays authoritative; the store is marked
//! dirty so the next mutation retries the write.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::Utc;
use pokesync_engine::{
    ActiveCapture, ConsolidatedState, PokemonId, StorageStats, UpdateStats,
};
use tokio::sync::Mutex;

/// File persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Engine(#[from] pokesync_engine::Error),
}

#[derive(Debug)]
struct Inner {
    state: ConsolidatedState,
    /// Set while the file lags behind the in-memory state
    dirty: bool,
}

/// The single persisted source of truth for client captures.
#[derive(Debug)]
pub struct ConsolidatedStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl ConsolidatedStore {
    /// Open the store at `path`.
    ///
    /// A missing file yields an empty store. An unreadable or corrupt file is
    /// logged and replaced on the next successful write.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match load_state(&path).await {
            Ok(Some(state)) => {
                let stats = state.stats();
                tracing::info!(
                    path = %path.display(),
                    clients = stats.total_clients,
                    unique_pokemon = stats.unique_pokemon,
                    "Loaded consolidated store"
                );
                state
            }
            Ok(None) => {
                tracing::info!(path = %path.display(), "No consolidated store yet, starting empty");
                ConsolidatedState::new()
            }
            Err(e) => {
                tracing::error!(path = %path.display(), "Failed to load consolidated store, starting empty: {}", e);
                ConsolidatedState::new()
            }
        };

        Self {
            path,
            inner: Mutex::new(Inner {
                state,
                dirty: false,
            }),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace a client's active set and persist.
    pub async fn update_client_captures(
        &self,
        client_id: &str,
        captures: &[ActiveCapture],
    ) -> UpdateStats {
        let mut inner = self.inner.lock().await;
        let is_new = inner.state.client_captures(client_id).is_none();
        let stats = inner
            .state
            .update_client_captures(client_id, captures, Utc::now());

        if is_new || !stats.is_noop() {
            tracing::debug!(
                client_id = %client_id,
                added = stats.added_count,
                removed = stats.removed_count,
                total = stats.total_captures,
                "Client captures updated"
            );
        }
        self.persist_if_needed(&mut inner, is_new || !stats.is_noop())
            .await;
        stats
    }

    /// Apply a partial report to a client's active set and persist.
    pub async fn apply_client_changes(
        &self,
        client_id: &str,
        added: &[ActiveCapture],
        removed: &BTreeSet<PokemonId>,
    ) -> UpdateStats {
        let mut inner = self.inner.lock().await;
        let is_new = inner.state.client_captures(client_id).is_none();
        let stats = inner
            .state
            .apply_client_changes(client_id, added, removed, Utc::now());
        self.persist_if_needed(&mut inner, is_new || !stats.is_noop())
            .await;
        stats
    }

    /// Top `limit` `(pokemon_id, count)` pairs, count desc then id asc.
    pub async fn get_ranking_data(&self, limit: usize) -> Vec<(PokemonId, u32)> {
        self.inner.lock().await.state.ranking_data(limit)
    }

    /// Copy of the per-pokemon counts.
    pub async fn pokemon_counts(&self) -> BTreeMap<PokemonId, u32> {
        self.inner.lock().await.state.pokemon_counts().clone()
    }

    /// A client's active ids, if the client is known.
    pub async fn client_captures(&self, client_id: &str) -> Option<Vec<PokemonId>> {
        self.inner
            .lock()
            .await
            .state
            .client_captures(client_id)
            .map(|set| set.iter().copied().collect())
    }

    /// Drop a client's captures. Returns false if unknown.
    pub async fn remove_client(&self, client_id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let removed = inner.state.remove_client(client_id, Utc::now());
        self.persist_if_needed(&mut inner, removed).await;
        if removed {
            tracing::info!(client_id = %client_id, "Removed client from consolidated store");
        }
        removed
    }

    /// Drop every client's captures.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.state.clear(Utc::now());
        self.persist_if_needed(&mut inner, true).await;
        tracing::warn!("Consolidated store cleared");
    }

    /// Summary counters.
    pub async fn stats(&self) -> StorageStats {
        self.inner.lock().await.state.stats()
    }

    /// Whether the file is behind the in-memory state.
    pub async fn is_dirty(&self) -> bool {
        self.inner.lock().await.dirty
    }

    async fn persist_if_needed(&self, inner: &mut Inner, changed: bool) {
        if !changed && !inner.dirty {
            return;
        }
        match write_state(&self.path, &inner.state).await {
            Ok(()) => inner.dirty = false,
            Err(e) => {
                inner.dirty = true;
                tracing::error!(path = %self.path.display(), "Failed to persist consolidated store: {}", e);
            }
        }
    }
}

async fn load_state(path: &Path) -> Result<Option<ConsolidatedState>, StorageError> {
    match tokio::fs::read_to_string(path).await {
        Ok(json) => Ok(Some(ConsolidatedState::from_json(&json)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StorageError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Overwrite `path` atomically with the serialized state.
async fn write_state(path: &Path, state: &ConsolidatedState) -> Result<(), StorageError> {
    let json = state.to_json_pretty()?;
    let io_err = |source: std::io::Error| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, json.as_bytes()).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
    Ok(())
}
