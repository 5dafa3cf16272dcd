//! Ranking computer - rebuilds the persisted popularity ranking.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use pokesync_engine::{build_ranking, rank_counts, PokemonId, RankingEntry, RankingStats};

use crate::db::{Database, DbError, StoredRanking};
use crate::storage::ConsolidatedStore;

/// Rebuilds the `pokemon_rankings` table from the consolidated store.
#[derive(Debug)]
pub struct RankingComputer {
    store: Arc<ConsolidatedStore>,
    db: Database,
}

impl RankingComputer {
    pub fn new(store: Arc<ConsolidatedStore>, db: Database) -> Self {
        Self { store, db }
    }

    /// Truncate and rebuild the persisted ranking with the top `limit` pokemon.
    ///
    /// The rebuild is one transaction: on failure the previous ranking stays
    /// in place and the error is returned.
    pub async fn recompute(&self, limit: usize) -> Result<RankingStats, DbError> {
        let counts = self.store.pokemon_counts().await;
        self.rebuild_from(&counts, limit).await
    }

    /// Rebuild the persisted ranking from an already taken counts snapshot.
    pub async fn rebuild_from(
        &self,
        counts: &BTreeMap<PokemonId, u32>,
        limit: usize,
    ) -> Result<RankingStats, DbError> {
        let entries = build_ranking(&rank_counts(counts, limit));
        let now = Utc::now();
        let rows = entries
            .iter()
            .map(|entry| StoredRanking::from_entry(entry, now))
            .collect::<Result<Vec<_>, _>>()?;

        self.db.replace_rankings(&rows).await?;

        let stats = RankingStats::from_entries(&entries);
        tracing::info!(
            inserted = stats.inserted_count,
            top_pokemon_id = ?stats.top_pokemon_id,
            top_pokemon_count = ?stats.top_pokemon_count,
            "Ranking rebuilt"
        );
        Ok(stats)
    }

    /// Ranking derived directly from the store, without touching the table.
    pub async fn live(&self, limit: usize) -> Vec<RankingEntry> {
        build_ranking(&self.store.get_ranking_data(limit).await)
    }

    /// The last persisted ranking.
    pub async fn persisted(&self, limit: i64) -> Result<Vec<StoredRanking>, DbError> {
        self.db.get_rankings(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDatabase;
    use pokesync_engine::ActiveCapture;

    async fn seeded() -> (tempfile::TempDir, Arc<ConsolidatedStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ConsolidatedStore::open(dir.path().join("s.json")).await);
        let reports = [
            ("a", vec![25, 1, 150]),
            ("b", vec![25, 1, 150]),
            ("c", vec![25, 1, 150]),
            ("d", vec![150]),
            ("e", vec![150]),
        ];
        for (client, ids) in reports {
            let captures: Vec<_> = ids.iter().map(|id| ActiveCapture::new(*id, "x")).collect();
            store.update_client_captures(client, &captures).await;
        }
        (dir, store)
    }

    #[tokio::test]
    async fn recompute_persists_tie_broken_ranking() {
        let (_dir, store) = seeded().await;
        let computer = RankingComputer::new(store, Database::Memory(MemoryDatabase::new()));

        let stats = computer.recompute(3).await.unwrap();
        assert_eq!(stats.inserted_count, 3);
        assert_eq!(stats.top_pokemon_id, Some(150));
        assert_eq!(stats.top_pokemon_count, Some(5));

        let rows = computer.persisted(10).await.unwrap();
        let pairs: Vec<_> = rows.iter().map(|r| (r.pokemon_id, r.favorite_count)).collect();
        assert_eq!(pairs, vec![(150, 5), (1, 3), (25, 3)]);
        assert_eq!(rows[0].pokemon_name, "mewtwo");
    }

    #[tokio::test]
    async fn failed_rebuild_keeps_previous_ranking() {
        let (_dir, store) = seeded().await;
        let mem = MemoryDatabase::new();
        let computer = RankingComputer::new(store.clone(), Database::Memory(mem.clone()));
        computer.recompute(10).await.unwrap();
        let before = computer.persisted(10).await.unwrap();

        store
            .update_client_captures("f", &[ActiveCapture::new(7, "squirtle")])
            .await;
        mem.abort_next_write_after(2);

        assert!(computer.recompute(10).await.is_err());
        assert_eq!(computer.persisted(10).await.unwrap(), before);

        let stats = computer.recompute(10).await.unwrap();
        assert_eq!(stats.inserted_count, 4);
    }

    #[tokio::test]
    async fn oversized_id_fails_rebuild_instead_of_wrapping() {
        let (_dir, store) = seeded().await;
        let computer = RankingComputer::new(store.clone(), Database::Memory(MemoryDatabase::new()));
        computer.recompute(10).await.unwrap();
        let before = computer.persisted(10).await.unwrap();

        let huge = 3_000_000_000;
        for client in ["f", "g", "h", "i", "j", "k"] {
            store
                .update_client_captures(client, &[ActiveCapture::new(huge, "x")])
                .await;
        }

        let err = computer.recompute(10).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::OutOfRange {
                column: "pokemon_id",
                value: 3_000_000_000
            }
        ));
        assert_eq!(computer.persisted(10).await.unwrap(), before);
        assert!(computer
            .persisted(10)
            .await
            .unwrap()
            .iter()
            .all(|row| row.pokemon_id > 0));
    }

    #[tokio::test]
    async fn rebuild_uses_the_given_snapshot() {
        let (_dir, store) = seeded().await;
        let computer = RankingComputer::new(store.clone(), Database::Memory(MemoryDatabase::new()));

        let snapshot = store.pokemon_counts().await;
        store.clear().await;
        computer.rebuild_from(&snapshot, 10).await.unwrap();

        let rows = computer.persisted(10).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].pokemon_id, 150);
    }
}
