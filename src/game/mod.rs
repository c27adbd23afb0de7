// Public API - what other modules can use
pub use handlers::{
    complete_session, create_session, get_session, reconcile_session, record_answer,
};
pub use models::{AnswerRecord, CompletedSession, GameSessionModel, SessionState};
pub use orchestrator::{CompletionListener, GameOrchestrator};
pub use scoring::ScoreCalculator;
pub use service::SessionManager;
pub use types::{Category, Difficulty, GameMode, PartitionKey};

// Internal modules
mod handlers;
pub mod models;
mod orchestrator;
pub mod requests;
pub mod scoring;
mod service;
pub mod types;
