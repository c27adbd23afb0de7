use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::auth::TokenConfig;
use crate::config::AppConfig;
use crate::game::{GameOrchestrator, GameSessionModel, SessionManager};
use crate::leaderboard::{LeaderboardPartition, LeaderboardService};
use crate::stats::{StatsAggregator, UserStats};
use crate::store::VersionedRepository;

pub type SessionStore = Arc<dyn VersionedRepository<GameSessionModel>>;
pub type PartitionStore = Arc<dyn VersionedRepository<LeaderboardPartition>>;
pub type StatsStore = Arc<dyn VersionedRepository<UserStats>>;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub session_manager: Arc<SessionManager>,
    pub leaderboard_service: Arc<LeaderboardService>,
    pub stats_aggregator: Arc<StatsAggregator>,
    pub token_config: TokenConfig,
}

impl AppState {
    /// Wires the core services on top of the given stores.
    ///
    /// The orchestrator is the only completion listener: every session that
    /// transitions to Completed is forwarded to stats and the leaderboard.
    pub fn new(
        config: &AppConfig,
        sessions: SessionStore,
        partitions: PartitionStore,
        stats: StatsStore,
    ) -> Self {
        let leaderboard_service = Arc::new(LeaderboardService::new(
            partitions,
            config.cas_max_attempts,
        ));
        let stats_aggregator = Arc::new(StatsAggregator::new(stats, config.cas_max_attempts));

        let orchestrator = Arc::new(
            GameOrchestrator::new(stats_aggregator.clone(), leaderboard_service.clone())
                .with_max_retries(config.completion_max_retries)
                .with_retry_backoff(config.completion_retry_backoff),
        );

        let session_manager = Arc::new(SessionManager::new(
            sessions,
            orchestrator,
            config.cas_max_attempts,
        ));

        Self {
            session_manager,
            leaderboard_service,
            stats_aggregator,
            token_config: config.token.clone(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("JWT error: {0}")]
    JwtError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Concurrent update conflict on {0}")]
    ConcurrencyConflict(String),

    #[error("Aggregate update failed: {0}")]
    AggregateUpdate(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    /// Whether the failed operation may succeed if attempted again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::ConcurrencyConflict(_) | AppError::DatabaseError(_)
        )
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::JwtError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidState(msg) => (StatusCode::CONFLICT, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::ConcurrencyConflict(key) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Too many concurrent updates to {}, please retry", key),
            ),
            AppError::AggregateUpdate(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Session completed but aggregates were not updated: {}", msg),
            ),
            AppError::DatabaseError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", msg),
            ),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::*;
    use crate::store::InMemoryVersionedRepository;

    /// Builder for creating AppState with overrides for testing
    pub struct AppStateBuilder {
        config: AppConfig,
        sessions: Option<SessionStore>,
        partitions: Option<PartitionStore>,
        stats: Option<StatsStore>,
    }

    impl AppStateBuilder {
        pub fn new() -> Self {
            Self {
                config: AppConfig::default(),
                sessions: None,
                partitions: None,
                stats: None,
            }
        }

        pub fn with_config(mut self, config: AppConfig) -> Self {
            self.config = config;
            self
        }

        pub fn with_stats_store(mut self, stats: StatsStore) -> Self {
            self.stats = Some(stats);
            self
        }

        pub fn with_partition_store(mut self, partitions: PartitionStore) -> Self {
            self.partitions = Some(partitions);
            self
        }

        pub fn build(self) -> AppState {
            AppState::new(
                &self.config,
                self.sessions
                    .unwrap_or_else(|| Arc::new(InMemoryVersionedRepository::new())),
                self.partitions
                    .unwrap_or_else(|| Arc::new(InMemoryVersionedRepository::new())),
                self.stats
                    .unwrap_or_else(|| Arc::new(InMemoryVersionedRepository::new())),
            )
        }
    }

    impl Default for AppStateBuilder {
        fn default() -> Self {
            Self::new()
        }
    }
}
