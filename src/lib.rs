// Library crate for the trivia game backend
// This file exposes the public API for the binary and integration tests

pub mod app;
pub mod auth;
pub mod config;
pub mod game;
pub mod leaderboard;
pub mod shared;
pub mod stats;
pub mod store;

// Re-export commonly used types for easier access in tests
pub use app::router;
pub use config::AppConfig;
pub use game::{GameOrchestrator, GameSessionModel, ScoreCalculator, SessionManager};
pub use leaderboard::{LeaderboardEntry, LeaderboardService};
pub use shared::{AppError, AppState};
pub use stats::{StatsAggregator, UserStats};
