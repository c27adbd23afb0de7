// Public API - what other modules can use
pub use handlers::get_leaderboard;
pub use models::{LeaderboardEntry, LeaderboardPartition, LEADERBOARD_CAPACITY};
pub use service::LeaderboardService;

// Internal modules
mod handlers;
pub mod models;
mod service;
