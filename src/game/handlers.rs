use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::{info, instrument};

use super::{
    models::GameSessionModel,
    requests::{CompleteSessionRequest, CreateSessionRequest, RecordAnswerRequest},
};
use crate::auth::Caller;
use crate::shared::{AppError, AppState};

/// HTTP handler for starting a game session
///
/// POST /api/games
/// Returns the new open session
#[instrument(name = "create_game_session", skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn create_session(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<GameSessionModel>), AppError> {
    let session = state
        .session_manager
        .create(
            &caller.user_id,
            &request.mode,
            &request.difficulty,
            request.category.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(session)))
}

/// HTTP handler for recording an answered movie
///
/// PUT /api/games/:id/movie
#[instrument(name = "record_answer", skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn record_answer(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(session_id): Path<String>,
    Json(request): Json<RecordAnswerRequest>,
) -> Result<Json<GameSessionModel>, AppError> {
    let session = state
        .session_manager
        .record_answer(
            &session_id,
            &caller.user_id,
            &request.item_id,
            request.correct,
            request.time_to_answer,
        )
        .await?;

    Ok(Json(session))
}

/// HTTP handler for completing a session
///
/// PUT /api/games/:id/complete
/// Returns the completed session once stats and leaderboard are updated
#[instrument(name = "complete_game_session", skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn complete_session(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(session_id): Path<String>,
    Json(request): Json<CompleteSessionRequest>,
) -> Result<Json<GameSessionModel>, AppError> {
    let session = state
        .session_manager
        .complete(&session_id, &caller.user_id, request.duration)
        .await?;

    info!(session_id = %session.id, score = session.score, "Game session completed via API");
    Ok(Json(session))
}

/// HTTP handler for reading a session
///
/// GET /api/games/:id
#[instrument(name = "get_game_session", skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn get_session(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(session_id): Path<String>,
) -> Result<Json<GameSessionModel>, AppError> {
    let session = state.session_manager.get(&session_id, &caller).await?;
    Ok(Json(session))
}

/// HTTP handler for replaying the aggregates of a completed session
///
/// POST /api/games/:id/reconcile
/// Admin only; used after a completion returned an aggregate update failure
#[instrument(name = "reconcile_game_session", skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn reconcile_session(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(session_id): Path<String>,
) -> Result<Json<GameSessionModel>, AppError> {
    let session = state.session_manager.reconcile(&session_id, &caller).await?;
    Ok(Json(session))
}
