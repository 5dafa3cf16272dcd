//! Relational persistence for the ranking and legacy favorites tables.
//!
//! Both tables are only ever rewritten in full, each rewrite being a single
//! commit/rollback unit.

mod favorites;
mod memory;
mod pool;
mod rankings;

pub use favorites::*;
pub use memory::MemoryDatabase;
pub use pool::*;
pub use rankings::*;

/// Relational store errors.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Write aborted: {0}")]
    WriteAborted(String),

    #[error("{column} value {value} does not fit the column type")]
    OutOfRange { column: &'static str, value: u64 },
}

/// Convert a count or id into a signed 32-bit column value.
pub fn to_column(column: &'static str, value: u32) -> Result<i32, DbError> {
    i32::try_from(value).map_err(|_| DbError::OutOfRange {
        column,
        value: value.into(),
    })
}

/// The relational backend in use.
#[derive(Debug, Clone)]
pub enum Database {
    Postgres(Pool),
    Memory(MemoryDatabase),
}

impl Database {
    /// Replace the whole ranking table.
    pub async fn replace_rankings(&self, rows: &[StoredRanking]) -> Result<usize, DbError> {
        match self {
            Database::Postgres(pool) => Ok(rankings::replace_rankings(pool, rows).await?),
            Database::Memory(mem) => mem.replace_rankings(rows),
        }
    }

    /// Read the persisted ranking.
    pub async fn get_rankings(&self, limit: i64) -> Result<Vec<StoredRanking>, DbError> {
        match self {
            Database::Postgres(pool) => Ok(rankings::get_rankings(pool, limit).await?),
            Database::Memory(mem) => Ok(mem.get_rankings(limit)),
        }
    }

    /// Replace one user's favorites. Returns `(deleted, inserted)`.
    pub async fn replace_favorites(
        &self,
        user_id: i64,
        rows: &[StoredFavorite],
    ) -> Result<(u64, usize), DbError> {
        match self {
            Database::Postgres(pool) => {
                Ok(favorites::replace_favorites(pool, user_id, rows).await?)
            }
            Database::Memory(mem) => mem.replace_favorites(user_id, rows),
        }
    }

    /// Read one user's favorites.
    pub async fn get_favorites(&self, user_id: i64) -> Result<Vec<StoredFavorite>, DbError> {
        match self {
            Database::Postgres(pool) => Ok(favorites::get_favorites(pool, user_id).await?),
            Database::Memory(mem) => Ok(mem.get_favorites(user_id)),
        }
    }

    /// Short backend name for logs and status output.
    pub fn backend_name(&self) -> &'static str {
        match self {
            Database::Postgres(_) => "postgres",
            Database::Memory(_) => "memory",
        }
    }
}
