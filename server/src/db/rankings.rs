//! Database operations for the pokemon_rankings table.

use chrono::{DateTime, Utc};
use pokesync_engine::RankingEntry;
use serde::Serialize;
use sqlx::{PgPool, Postgres, Row, Transaction};

use super::{to_column, DbError};

/// A stored ranking row from the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRanking {
    pub rank: i32,
    pub pokemon_id: i32,
    pub pokemon_name: String,
    pub favorite_count: i32,
    pub last_updated: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredRanking {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredRanking {
            rank: row.try_get("rank")?,
            pokemon_id: row.try_get("pokemon_id")?,
            pokemon_name: row.try_get("pokemon_name")?,
            favorite_count: row.try_get("favorite_count")?,
            last_updated: row.try_get("last_updated")?,
        })
    }
}

impl StoredRanking {
    /// Build the row persisted for a ranking entry.
    pub fn from_entry(entry: &RankingEntry, last_updated: DateTime<Utc>) -> Result<Self, DbError> {
        Ok(Self {
            rank: to_column("rank", entry.rank)?,
            pokemon_id: to_column("pokemon_id", entry.pokemon_id)?,
            pokemon_name: entry.pokemon_name.clone(),
            favorite_count: to_column("favorite_count", entry.favorite_count)?,
            last_updated,
        })
    }
}

/// Replace the whole ranking table inside one transaction.
///
/// The transaction is rolled back before the error is returned, so readers
/// keep seeing the previous full ranking.
pub async fn replace_rankings(pool: &PgPool, rows: &[StoredRanking]) -> Result<usize, sqlx::Error> {
    let mut tx = pool.begin().await?;

    match write_rankings(&mut tx, rows).await {
        Ok(inserted) => {
            tx.commit().await?;
            Ok(inserted)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!("Ranking rollback failed: {:?}", rollback_err);
            }
            Err(e)
        }
    }
}

async fn write_rankings(
    tx: &mut Transaction<'_, Postgres>,
    rows: &[StoredRanking],
) -> Result<usize, sqlx::Error> {
    sqlx::query("DELETE FROM pokemon_rankings")
        .execute(&mut **tx)
        .await?;

    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO pokemon_rankings (
                pokemon_id, pokemon_name, favorite_count, rank, last_updated
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(row.pokemon_id)
        .bind(&row.pokemon_name)
        .bind(row.favorite_count)
        .bind(row.rank)
        .bind(row.last_updated)
        .execute(&mut **tx)
        .await?;
    }

    Ok(rows.len())
}

/// Get the persisted ranking ordered by rank.
pub async fn get_rankings(pool: &PgPool, limit: i64) -> Result<Vec<StoredRanking>, sqlx::Error> {
    sqlx::query_as::<_, StoredRanking>(
        r#"
        SELECT rank, pokemon_id, pokemon_name, favorite_count, last_updated
        FROM pokemon_rankings
        ORDER BY rank ASC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
