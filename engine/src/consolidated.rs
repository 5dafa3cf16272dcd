//! Consolidated state - the authoritative client to capture mapping.
//!
//! Holds, for every client, the set of pokemon ids it currently has active,
//! plus a derived count of how many clients hold each id. Counts are never
//! updated incrementally: every mutation recounts from `clients`, so the
//! index cannot drift.
//!
//! Serialization uses `BTreeMap`/`BTreeSet` so the persisted JSON is
//! deterministic for identical state.

use crate::{ActiveCapture, ClientId, Error, PokemonId, Result, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Version of the persisted state format.
pub const STORE_FORMAT_VERSION: u32 = 1;

/// Result of merging one client's captures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStats {
    /// Ids newly present in the client's set
    pub added_count: usize,
    /// Ids no longer present in the client's set
    pub removed_count: usize,
    /// Size of the client's set after the merge
    pub total_captures: usize,
}

impl UpdateStats {
    /// Whether the merge changed anything.
    pub fn is_noop(&self) -> bool {
        self.added_count == 0 && self.removed_count == 0
    }
}

/// Summary of the consolidated state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageStats {
    pub total_clients: usize,
    pub unique_pokemon: usize,
    pub total_captures: usize,
    pub last_updated: Option<Timestamp>,
    pub version: u32,
}

/// Client to active-capture mapping with derived per-pokemon counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedState {
    #[serde(default)]
    clients: BTreeMap<ClientId, BTreeSet<PokemonId>>,
    #[serde(default)]
    pokemon_counts: BTreeMap<PokemonId, u32>,
    #[serde(default)]
    last_updated: Option<Timestamp>,
    #[serde(default = "default_version")]
    version: u32,
}

fn default_version() -> u32 {
    STORE_FORMAT_VERSION
}

impl Default for ConsolidatedState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsolidatedState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self {
            clients: BTreeMap::new(),
            pokemon_counts: BTreeMap::new(),
            last_updated: None,
            version: STORE_FORMAT_VERSION,
        }
    }

    /// Replace a client's active set with `captures`.
    ///
    /// Returns the symmetric difference against the previous set. Calling
    /// this twice with the same input is a no-op the second time, including
    /// `last_updated`.
    pub fn update_client_captures(
        &mut self,
        client_id: &str,
        captures: &[ActiveCapture],
        now: Timestamp,
    ) -> UpdateStats {
        let next: BTreeSet<PokemonId> = captures.iter().map(|c| c.pokemon_id).collect();
        let is_new_client = !self.clients.contains_key(client_id);
        let previous = self.clients.get(client_id).cloned().unwrap_or_default();

        let stats = UpdateStats {
            added_count: next.difference(&previous).count(),
            removed_count: previous.difference(&next).count(),
            total_captures: next.len(),
        };

        if is_new_client || !stats.is_noop() {
            self.clients.insert(client_id.to_string(), next);
            self.recount();
            self.last_updated = Some(now);
        }

        stats
    }

    /// Apply a partial report to a client's active set.
    ///
    /// Ids in `added` become active, ids in `removed` are dropped, and
    /// everything else the client held is left untouched.
    pub fn apply_client_changes(
        &mut self,
        client_id: &str,
        added: &[ActiveCapture],
        removed: &BTreeSet<PokemonId>,
        now: Timestamp,
    ) -> UpdateStats {
        let is_new_client = !self.clients.contains_key(client_id);
        let set = self.clients.entry(client_id.to_string()).or_default();

        let mut stats = UpdateStats::default();
        for capture in added {
            if !removed.contains(&capture.pokemon_id) && set.insert(capture.pokemon_id) {
                stats.added_count += 1;
            }
        }
        for pokemon_id in removed {
            if set.remove(pokemon_id) {
                stats.removed_count += 1;
            }
        }
        stats.total_captures = set.len();

        if is_new_client || !stats.is_noop() {
            self.recount();
            self.last_updated = Some(now);
        }

        stats
    }

    /// Rebuild `pokemon_counts` from `clients`.
    pub fn recount(&mut self) {
        let mut counts = BTreeMap::new();
        for pokemon_id in self.clients.values().flatten() {
            *counts.entry(*pokemon_id).or_insert(0u32) += 1;
        }
        self.pokemon_counts = counts;
    }

    /// Top `limit` `(pokemon_id, count)` pairs.
    ///
    /// Ordered by count descending, then pokemon id ascending, so ties
    /// always resolve to the lower id.
    pub fn ranking_data(&self, limit: usize) -> Vec<(PokemonId, u32)> {
        crate::rank_counts(&self.pokemon_counts, limit)
    }

    /// Drop a client and its captures. Returns false if unknown.
    pub fn remove_client(&mut self, client_id: &str, now: Timestamp) -> bool {
        if self.clients.remove(client_id).is_none() {
            return false;
        }
        self.recount();
        self.last_updated = Some(now);
        true
    }

    /// Drop every client.
    pub fn clear(&mut self, now: Timestamp) {
        self.clients.clear();
        self.recount();
        self.last_updated = Some(now);
    }

    /// A client's active set, if the client is known.
    pub fn client_captures(&self, client_id: &str) -> Option<&BTreeSet<PokemonId>> {
        self.clients.get(client_id)
    }

    /// All known client ids.
    pub fn client_ids(&self) -> impl Iterator<Item = &ClientId> {
        self.clients.keys()
    }

    /// The derived per-pokemon counts.
    pub fn pokemon_counts(&self) -> &BTreeMap<PokemonId, u32> {
        &self.pokemon_counts
    }

    /// When the state last changed.
    pub fn last_updated(&self) -> Option<Timestamp> {
        self.last_updated
    }

    /// Summary counters.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            total_clients: self.clients.len(),
            unique_pokemon: self.pokemon_counts.len(),
            total_captures: self.clients.values().map(BTreeSet::len).sum(),
            last_updated: self.last_updated,
            version: self.version,
        }
    }

    /// Serialize to pretty JSON with deterministic ordering.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    ///
    /// Counts in the input are discarded and recomputed from `clients`.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut state: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if state.version > STORE_FORMAT_VERSION {
            return Err(Error::UnsupportedSnapshotVersion {
                supported: STORE_FORMAT_VERSION,
                actual: state.version,
            });
        }

        state.recount();
        Ok(state)
    }
}
