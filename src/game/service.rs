use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{
    models::{CompletedSession, GameSessionModel},
    orchestrator::CompletionListener,
    types::{Category, Difficulty, GameMode},
};
use crate::auth::Caller;
use crate::shared::{AppError, SessionStore};
use crate::store::{update_with_retry, KeyedLocks};

/// Owns the lifecycle of game sessions.
///
/// All writes to one session are serialized through a per-session lock, and every
/// write is a compare-and-swap against the stored version. The Open -> Completed
/// swap is the single gate that lets a session reach the completion listener.
pub struct SessionManager {
    repository: SessionStore,
    listener: Arc<dyn CompletionListener>,
    session_locks: KeyedLocks,
    cas_max_attempts: u32,
}

impl SessionManager {
    pub fn new(
        repository: SessionStore,
        listener: Arc<dyn CompletionListener>,
        cas_max_attempts: u32,
    ) -> Self {
        Self {
            repository,
            listener,
            session_locks: KeyedLocks::new(),
            cas_max_attempts,
        }
    }

    /// Starts a new open session for `user_id`
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        user_id: &str,
        mode: &str,
        difficulty: &str,
        category: Option<&str>,
    ) -> Result<GameSessionModel, AppError> {
        let mode = GameMode::parse(mode)?;
        let difficulty = Difficulty::parse(difficulty)?;
        let category = Category::parse_optional(category)?;

        let session = GameSessionModel::new(user_id.to_string(), mode, difficulty, category);
        let stored = self
            .repository
            .create_or_get(&session.id, session.clone())
            .await?;

        info!(
            session_id = %stored.value.id,
            user_id,
            mode = %stored.value.mode,
            difficulty = %stored.value.difficulty,
            category = %stored.value.category,
            "Game session created"
        );
        Ok(stored.value)
    }

    /// Reads a session; only its owner or an admin may see it
    #[instrument(skip(self, caller), fields(caller_id = %caller.user_id))]
    pub async fn get(&self, session_id: &str, caller: &Caller) -> Result<GameSessionModel, AppError> {
        let session = self.load(session_id).await?;
        if !caller.is_admin {
            session.ensure_owner(&caller.user_id)?;
        }
        Ok(session)
    }

    /// Records one answer and returns the updated session
    #[instrument(skip(self))]
    pub async fn record_answer(
        &self,
        session_id: &str,
        caller_id: &str,
        item_id: &str,
        correct: bool,
        time_to_answer: f64,
    ) -> Result<GameSessionModel, AppError> {
        if !time_to_answer.is_finite() || time_to_answer < 0.0 {
            return Err(AppError::validation(format!(
                "time_to_answer must be a non-negative number of seconds, got {}",
                time_to_answer
            )));
        }
        if item_id.trim().is_empty() {
            return Err(AppError::validation("item_id cannot be empty"));
        }

        let _guard = self.session_locks.lock(session_id).await;

        let (stored, points) = update_with_retry(
            self.repository.as_ref(),
            session_id,
            None,
            self.cas_max_attempts,
            |session| {
                session.ensure_owner(caller_id)?;
                session.record_answer(item_id.to_string(), correct, time_to_answer)
            },
        )
        .await
        .map_err(|e| not_found_as_session(e, session_id))
        .inspect_err(|e| warn!(session_id, error = %e, "Answer rejected"))?;

        debug!(
            session_id,
            correct,
            points,
            score = stored.value.score,
            answers = stored.value.answers.len(),
            "Answer recorded"
        );
        Ok(stored.value)
    }

    /// Completes a session and forwards its result to the completion listener.
    ///
    /// A second completion fails with `InvalidState` and never reaches the listener.
    /// If the listener fails the session stays Completed with `aggregates_applied`
    /// unset and the error is returned; `reconcile` picks it up from there.
    #[instrument(skip(self))]
    pub async fn complete(
        &self,
        session_id: &str,
        caller_id: &str,
        duration: f64,
    ) -> Result<GameSessionModel, AppError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(AppError::validation(format!(
                "duration must be a non-negative number of seconds, got {}",
                duration
            )));
        }

        let (session, completed) = {
            let _guard = self.session_locks.lock(session_id).await;

            let (stored, completed) = update_with_retry(
                self.repository.as_ref(),
                session_id,
                None,
                self.cas_max_attempts,
                |session| {
                    session.ensure_owner(caller_id)?;
                    session.complete(duration)
                },
            )
            .await
            .map_err(|e| not_found_as_session(e, session_id))
            .inspect_err(|e| warn!(session_id, error = %e, "Completion rejected"))?;

            (stored.value, completed)
        };

        info!(
            session_id,
            user_id = %completed.user_id,
            score = completed.score,
            duration,
            "Game session completed"
        );

        self.notify(&completed).await?;

        let _guard = self.session_locks.lock(session_id).await;
        match self.mark_aggregates_applied(session_id).await {
            Ok(marked) => Ok(marked),
            Err(e) => {
                // Aggregates are idempotent per session, so a later reconcile is harmless
                warn!(session_id, error = %e, "Failed to flag session as applied");
                Ok(session)
            }
        }
    }

    /// Re-runs the completion listener for a Completed session whose aggregates
    /// were never confirmed. Admin only; a session already applied is returned as is.
    #[instrument(skip(self, caller), fields(caller_id = %caller.user_id))]
    pub async fn reconcile(
        &self,
        session_id: &str,
        caller: &Caller,
    ) -> Result<GameSessionModel, AppError> {
        if !caller.is_admin {
            return Err(AppError::Unauthorized(
                "Only administrators may reconcile game sessions".to_string(),
            ));
        }

        let _guard = self.session_locks.lock(session_id).await;
        let session = self.load(session_id).await?;
        let completed = session.completion_record()?;

        if session.aggregates_applied {
            debug!(session_id, "Aggregates already applied, nothing to reconcile");
            return Ok(session);
        }

        info!(session_id, user_id = %completed.user_id, "Reconciling completed session");
        self.notify(&completed).await?;
        self.mark_aggregates_applied(session_id).await
    }

    /// Caller must hold the session lock
    async fn mark_aggregates_applied(&self, session_id: &str) -> Result<GameSessionModel, AppError> {
        let (stored, ()) = update_with_retry(
            self.repository.as_ref(),
            session_id,
            None,
            self.cas_max_attempts,
            |session| {
                session.aggregates_applied = true;
                Ok(())
            },
        )
        .await?;
        Ok(stored.value)
    }

    async fn notify(&self, completed: &CompletedSession) -> Result<(), AppError> {
        self.listener
            .on_session_completed(completed)
            .await
            .inspect_err(|e| {
                warn!(
                    listener = self.listener.name(),
                    session_id = %completed.session_id,
                    error = %e,
                    "Completion listener failed; session remains completed"
                )
            })
    }

    async fn load(&self, session_id: &str) -> Result<GameSessionModel, AppError> {
        self.repository
            .get(session_id)
            .await?
            .map(|stored| stored.value)
            .ok_or_else(|| AppError::NotFound("Game session not found".to_string()))
    }
}

fn not_found_as_session(error: AppError, session_id: &str) -> AppError {
    match error {
        AppError::NotFound(_) => {
            debug!(session_id, "Game session not found");
            AppError::NotFound("Game session not found".to_string())
        }
        other => other,
    }
}
