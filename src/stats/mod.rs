// Public API - what other modules can use
pub use handlers::get_user_stats;
pub use models::{StatsDelta, UserStats, RECENT_SESSIONS};
pub use service::StatsAggregator;

// Internal modules
mod handlers;
pub mod models;
mod service;
