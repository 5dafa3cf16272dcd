//! Database operations for the legacy favorite_pokemons table.
//!
//! Every pokemon held by any client is mirrored under one fixed user bucket
//! for older read endpoints. Per-user buckets are not derived.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Row, Transaction};

/// User bucket that receives the mirrored favorites.
pub const LEGACY_BUCKET_USER_ID: i64 = 1;

/// A stored legacy favorite row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredFavorite {
    pub user_id: i64,
    pub pokemon_id: i32,
    pub pokemon_name: String,
    pub capture_count: i32,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredFavorite {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredFavorite {
            user_id: row.try_get("user_id")?,
            pokemon_id: row.try_get("pokemon_id")?,
            pokemon_name: row.try_get("pokemon_name")?,
            capture_count: row.try_get("capture_count")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Delete a user's favorites and insert `rows`, as one transaction.
///
/// Returns `(deleted, inserted)`.
pub async fn replace_favorites(
    pool: &PgPool,
    user_id: i64,
    rows: &[StoredFavorite],
) -> Result<(u64, usize), sqlx::Error> {
    let mut tx = pool.begin().await?;

    match write_favorites(&mut tx, user_id, rows).await {
        Ok(counts) => {
            tx.commit().await?;
            Ok(counts)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!("Favorites rollback failed: {:?}", rollback_err);
            }
            Err(e)
        }
    }
}

async fn write_favorites(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    rows: &[StoredFavorite],
) -> Result<(u64, usize), sqlx::Error> {
    let deleted = sqlx::query("DELETE FROM favorite_pokemons WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO favorite_pokemons (
                user_id, pokemon_id, pokemon_name, capture_count, created_at
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user_id)
        .bind(row.pokemon_id)
        .bind(&row.pokemon_name)
        .bind(row.capture_count)
        .bind(row.created_at)
        .execute(&mut **tx)
        .await?;
    }

    Ok((deleted, rows.len()))
}

/// Get a user's favorites ordered by pokemon id.
pub async fn get_favorites(pool: &PgPool, user_id: i64) -> Result<Vec<StoredFavorite>, sqlx::Error> {
    sqlx::query_as::<_, StoredFavorite>(
        r#"
        SELECT user_id, pokemon_id, pokemon_name, capture_count, created_at
        FROM favorite_pokemons
        WHERE user_id = $1
        ORDER BY pokemon_id ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}
