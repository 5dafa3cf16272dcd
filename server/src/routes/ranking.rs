//! Ranking and legacy favorites read endpoints.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use pokesync_engine::{RankingEntry, RankingStats};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::db::{StoredFavorite, StoredRanking, LEGACY_BUCKET_USER_ID};
use crate::error::Result;
use crate::AppState;

/// Maximum rows returned by ranking reads.
const MAX_LIMIT: usize = 1000;

/// Create ranking routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/ranking", get(persisted_ranking))
        .route("/api/ranking/storage", get(storage_ranking))
        .route("/api/ranking/rebuild", post(rebuild_ranking))
        .route("/api/favorites/legacy", get(legacy_favorites))
}

/// Query parameters for ranking reads.
#[derive(Debug, Deserialize)]
pub struct RankingQuery {
    pub limit: Option<usize>,
}

impl RankingQuery {
    fn limit_or(&self, default: usize) -> usize {
        self.limit.map(|l| l.clamp(1, MAX_LIMIT)).unwrap_or(default)
    }
}

#[derive(Debug, Serialize)]
pub struct RankingResponse<T> {
    pub ranking: Vec<T>,
    pub count: usize,
}

impl<T> From<Vec<T>> for RankingResponse<T> {
    fn from(ranking: Vec<T>) -> Self {
        Self {
            count: ranking.len(),
            ranking,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FavoritesResponse {
    pub user_id: i64,
    pub favorites: Vec<StoredFavorite>,
}

/// GET /api/ranking - Ranking as persisted by the last rebuild.
async fn persisted_ranking(
    State(state): State<AppState>,
    Query(query): Query<RankingQuery>,
) -> Result<Json<RankingResponse<StoredRanking>>> {
    let limit = query.limit_or(state.config.ranking_limit);
    let rows = state.ranking.persisted(limit as i64).await?;
    Ok(Json(rows.into()))
}

/// GET /api/ranking/storage - Ranking derived live from the store.
async fn storage_ranking(
    State(state): State<AppState>,
    Query(query): Query<RankingQuery>,
) -> Json<RankingResponse<RankingEntry>> {
    let limit = query.limit_or(state.config.ranking_limit);
    Json(state.ranking.live(limit).await.into())
}

/// POST /api/ranking/rebuild - Rebuild the persisted ranking now.
async fn rebuild_ranking(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<RankingQuery>,
) -> Result<Json<RankingStats>> {
    let limit = query.limit_or(state.config.ranking_limit);
    Ok(Json(state.engine.rebuild_ranking(limit).await?))
}

/// GET /api/favorites/legacy - Mirrored favorites for older consumers.
async fn legacy_favorites(State(state): State<AppState>) -> Result<Json<FavoritesResponse>> {
    let favorites = state.db.get_favorites(LEGACY_BUCKET_USER_ID).await?;
    Ok(Json(FavoritesResponse {
        user_id: LEGACY_BUCKET_USER_ID,
        favorites,
    }))
}
