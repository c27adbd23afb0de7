use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::models::LeaderboardEntry;
use crate::game::{Category, Difficulty, GameMode, PartitionKey};
use crate::shared::{AppError, AppState};

/// Query string for the public leaderboard
#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub mode: Option<String>,
    pub difficulty: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub mode: GameMode,
    pub difficulty: Difficulty,
    pub category: Category,
    pub entries: Vec<LeaderboardEntry>,
}

/// HTTP handler for reading a leaderboard partition
///
/// GET /api/games/leaderboard?mode=&difficulty=&category=
/// Missing parameters default to standard / easy / all
#[instrument(name = "get_leaderboard", skip(state))]
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let key = PartitionKey::parse(
        query.mode.as_deref(),
        query.difficulty.as_deref(),
        query.category.as_deref(),
    )?;

    let entries = state.leaderboard_service.query(&key).await?;
    info!(partition = %key, entries = entries.len(), "Leaderboard served");

    Ok(Json(LeaderboardResponse {
        mode: key.mode,
        difficulty: key.difficulty,
        category: key.category,
        entries,
    }))
}
