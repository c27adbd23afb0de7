use axum::{extract::State, Extension, Json};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use super::models::UserStats;
use crate::auth::Caller;
use crate::game::GameSessionModel;
use crate::shared::{AppError, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct UserStatsResponse {
    pub stats: UserStats,
    pub recent_games: Vec<GameSessionModel>,
}

/// HTTP handler for the caller's statistics and recent games
///
/// GET /api/users/stats
#[instrument(name = "get_user_stats", skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn get_user_stats(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<UserStatsResponse>, AppError> {
    let stats = state.stats_aggregator.get(&caller.user_id).await?;

    let lookups = stats
        .recent_sessions
        .iter()
        .map(|session_id| state.session_manager.get(session_id, &caller));

    let mut recent_games = Vec::with_capacity(stats.recent_sessions.len());
    for result in join_all(lookups).await {
        match result {
            Ok(session) => recent_games.push(session),
            // Sessions are owned by external retention; a missing one is skipped
            Err(AppError::NotFound(_)) => {}
            Err(e) => {
                warn!(error = %e, "Failed to load recent game");
                return Err(e);
            }
        }
    }

    Ok(Json(UserStatsResponse {
        stats,
        recent_games,
    }))
}
