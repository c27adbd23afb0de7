use tracing::{debug, info, instrument};

use super::models::{StatsDelta, UserStats};
use crate::shared::{AppError, StatsStore};
use crate::store::{update_with_retry, KeyedLocks};

/// Maintains per-user cumulative statistics.
///
/// Applies for one user are serialized by a per-user lock plus compare-and-swap,
/// so two sessions finishing at once both count.
pub struct StatsAggregator {
    repository: StatsStore,
    user_locks: KeyedLocks,
    cas_max_attempts: u32,
}

impl StatsAggregator {
    pub fn new(repository: StatsStore, cas_max_attempts: u32) -> Self {
        Self {
            repository,
            user_locks: KeyedLocks::new(),
            cas_max_attempts,
        }
    }

    /// Adds one completed session to the user's totals.
    /// Applying the same session id twice leaves the stats unchanged.
    #[instrument(skip(self, delta), fields(session_id = %delta.session_id, score = delta.score))]
    pub async fn apply(&self, user_id: &str, delta: &StatsDelta) -> Result<UserStats, AppError> {
        let seed = UserStats::new(user_id);
        let _guard = self.user_locks.lock(user_id).await;

        let (stored, applied) = update_with_retry(
            self.repository.as_ref(),
            user_id,
            Some(&seed),
            self.cas_max_attempts,
            |stats| Ok(stats.apply(delta)),
        )
        .await?;

        if applied {
            info!(
                games_played = stored.value.games_played,
                high_score = stored.value.high_score,
                "User stats updated"
            );
        } else {
            debug!("Session already applied to user stats, skipping");
        }

        Ok(stored.value)
    }

    /// Current statistics; a user with no completed sessions has all-zero stats
    #[instrument(skip(self))]
    pub async fn get(&self, user_id: &str) -> Result<UserStats, AppError> {
        Ok(self
            .repository
            .get(user_id)
            .await?
            .map(|stored| stored.value)
            .unwrap_or_else(|| UserStats::new(user_id)))
    }
}
