//! Ranking derivation from consolidated counts.
//!
//! A ranking is always rebuilt from scratch: [`rank_counts`] orders a counts
//! snapshot into `(pokemon_id, count)` pairs and [`build_ranking`] turns those
//! into rows with positional ranks and resolved names.

use crate::{names, PokemonId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default number of ranking rows kept.
pub const DEFAULT_RANKING_LIMIT: usize = 100;

/// One row of the popularity ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    /// 1-based position
    pub rank: u32,
    pub pokemon_id: PokemonId,
    pub pokemon_name: String,
    /// Number of distinct clients holding this pokemon
    pub favorite_count: u32,
}

/// Summary of a ranking rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingStats {
    pub inserted_count: usize,
    pub top_pokemon_id: Option<PokemonId>,
    pub top_pokemon_count: Option<u32>,
}

impl RankingStats {
    /// Summarize a freshly built ranking.
    pub fn from_entries(entries: &[RankingEntry]) -> Self {
        let top = entries.first();
        Self {
            inserted_count: entries.len(),
            top_pokemon_id: top.map(|e| e.pokemon_id),
            top_pokemon_count: top.map(|e| e.favorite_count),
        }
    }
}

/// Top `limit` `(pokemon_id, count)` pairs of a counts snapshot.
///
/// Ordered by count descending, then pokemon id ascending, so ties always
/// resolve to the lower id. Zero counts are skipped.
pub fn rank_counts(counts: &BTreeMap<PokemonId, u32>, limit: usize) -> Vec<(PokemonId, u32)> {
    let mut pairs: Vec<(PokemonId, u32)> = counts
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(id, count)| (*id, *count))
        .collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    pairs.truncate(limit);
    pairs
}

/// Build ranking rows from ordered `(pokemon_id, count)` pairs.
///
/// Input order is preserved; ranks are positional.
pub fn build_ranking(pairs: &[(PokemonId, u32)]) -> Vec<RankingEntry> {
    pairs
        .iter()
        .enumerate()
        .map(|(idx, (pokemon_id, count))| RankingEntry {
            rank: idx as u32 + 1,
            pokemon_id: *pokemon_id,
            pokemon_name: names::pokemon_name(*pokemon_id).into_owned(),
            favorite_count: *count,
        })
        .collect()
}
