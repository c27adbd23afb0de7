use axum::{
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth;
use crate::game;
use crate::leaderboard;
use crate::shared::AppState;
use crate::stats;

/// Builds the HTTP router.
///
/// Health and leaderboard reads are public; everything touching a session or a
/// user's stats requires a bearer token.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/games", post(game::create_session))
        .route("/api/games/:id", get(game::get_session))
        .route("/api/games/:id/movie", put(game::record_answer))
        .route("/api/games/:id/complete", put(game::complete_session))
        .route("/api/games/:id/reconcile", post(game::reconcile_session))
        .route("/api/users/stats", get(stats::get_user_stats))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::jwt_auth,
        ));

    Router::new()
        .route("/api/health", get(health))
        .route("/api/games/leaderboard", get(leaderboard::get_leaderboard))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "OK" }))
}
