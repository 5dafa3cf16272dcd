//! In-memory relational backend.
//!
//! Used when no `DATABASE_URL` is configured. Each replace call stages the
//! new rows and swaps them in only when every row was written, which gives
//! the same all-or-nothing visibility as the Postgres transactions.

use std::sync::{Arc, Mutex, MutexGuard};

use super::{DbError, StoredFavorite, StoredRanking};

#[derive(Debug, Default)]
struct Tables {
    rankings: Vec<StoredRanking>,
    favorites: Vec<StoredFavorite>,
    /// Abort the next write after this many rows have been staged
    abort_after: Option<usize>,
}

/// Shared in-memory tables. Cloning shares the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryDatabase {
    /// Create empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: make the next write abort once `rows` rows have been staged.
    ///
    /// The aborted write leaves the tables exactly as they were. Nothing in
    /// the server calls this; it exists so tests can exercise failed
    /// rebuilds without a Postgres instance.
    #[doc(hidden)]
    pub fn abort_next_write_after(&self, rows: usize) {
        self.lock().abort_after = Some(rows);
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn replace_rankings(&self, rows: &[StoredRanking]) -> Result<usize, DbError> {
        let mut tables = self.lock();
        let staged = stage(rows, tables.abort_after.take())?;
        tables.rankings = staged;
        Ok(rows.len())
    }

    pub(crate) fn get_rankings(&self, limit: i64) -> Vec<StoredRanking> {
        let mut rows = self.lock().rankings.clone();
        rows.sort_by_key(|r| r.rank);
        rows.truncate(limit.max(0) as usize);
        rows
    }

    pub(crate) fn replace_favorites(
        &self,
        user_id: i64,
        rows: &[StoredFavorite],
    ) -> Result<(u64, usize), DbError> {
        let mut tables = self.lock();
        let staged = stage(rows, tables.abort_after.take())?;

        let before = tables.favorites.len();
        tables.favorites.retain(|f| f.user_id != user_id);
        let deleted = (before - tables.favorites.len()) as u64;
        tables.favorites.extend(staged.into_iter().map(|mut f| {
            f.user_id = user_id;
            f
        }));

        Ok((deleted, rows.len()))
    }

    pub(crate) fn get_favorites(&self, user_id: i64) -> Vec<StoredFavorite> {
        let mut rows: Vec<_> = self
            .lock()
            .favorites
            .iter()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|f| f.pokemon_id);
        rows
    }
}

fn stage<T: Clone>(rows: &[T], abort_after: Option<usize>) -> Result<Vec<T>, DbError> {
    let mut staged = Vec::with_capacity(rows.len());
    for row in rows {
        if abort_after == Some(staged.len()) {
            return Err(DbError::WriteAborted(format!(
                "aborted after {} of {} rows",
                staged.len(),
                rows.len()
            )));
        }
        staged.push(row.clone());
    }
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ranking(rank: i32, pokemon_id: i32) -> StoredRanking {
        StoredRanking {
            rank,
            pokemon_id,
            pokemon_name: format!("pokemon_{}", pokemon_id),
            favorite_count: 1,
            last_updated: Utc::now(),
        }
    }

    fn favorite(user_id: i64, pokemon_id: i32) -> StoredFavorite {
        StoredFavorite {
            user_id,
            pokemon_id,
            pokemon_name: format!("pokemon_{}", pokemon_id),
            capture_count: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn aborted_ranking_write_keeps_previous_rows() {
        let db = MemoryDatabase::new();
        db.replace_rankings(&[ranking(1, 25), ranking(2, 6)]).unwrap();

        db.abort_next_write_after(1);
        let err = db
            .replace_rankings(&[ranking(1, 150), ranking(2, 1), ranking(3, 25)])
            .unwrap_err();
        assert!(matches!(err, DbError::WriteAborted(_)));

        let ids: Vec<_> = db.get_rankings(10).iter().map(|r| r.pokemon_id).collect();
        assert_eq!(ids, vec![25, 6]);

        // the abort is one-shot
        db.replace_rankings(&[ranking(1, 150)]).unwrap();
        assert_eq!(db.get_rankings(10).len(), 1);
    }

    #[test]
    fn favorites_replace_only_touches_one_bucket() {
        let db = MemoryDatabase::new();
        db.replace_favorites(2, &[favorite(2, 4)]).unwrap();
        db.replace_favorites(1, &[favorite(1, 25), favorite(1, 6)]).unwrap();

        let (deleted, inserted) = db.replace_favorites(1, &[favorite(1, 25)]).unwrap();
        assert_eq!((deleted, inserted), (2, 1));
        assert_eq!(db.get_favorites(1).len(), 1);
        assert_eq!(db.get_favorites(2).len(), 1);
    }
}
