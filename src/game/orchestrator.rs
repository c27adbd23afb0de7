use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use super::models::CompletedSession;
use crate::leaderboard::{LeaderboardEntry, LeaderboardService};
use crate::shared::AppError;
use crate::stats::{StatsAggregator, StatsDelta};

/// Receives every session that has just transitioned to Completed.
///
/// Called exactly once per session, after the transition is durable and with no
/// session lock held.
#[async_trait]
pub trait CompletionListener: Send + Sync {
    async fn on_session_completed(&self, completed: &CompletedSession) -> Result<(), AppError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Fans a completed session out to user statistics and the leaderboard
pub struct GameOrchestrator {
    stats: Arc<StatsAggregator>,
    leaderboard: Arc<LeaderboardService>,
    max_retries: u32,
    retry_backoff: Duration,
}

impl GameOrchestrator {
    pub fn new(stats: Arc<StatsAggregator>, leaderboard: Arc<LeaderboardService>) -> Self {
        Self {
            stats,
            leaderboard,
            max_retries: 3,
            retry_backoff: Duration::from_millis(50),
        }
    }

    /// Set the maximum number of retries for each aggregate update
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay between retries (doubled on each attempt)
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    async fn apply_stats(&self, completed: &CompletedSession) -> Result<(), AppError> {
        let delta = StatsDelta::from(completed);
        self.with_retry("user_stats", &completed.session_id, || {
            let delta = delta.clone();
            async move {
                self.stats.apply(&completed.user_id, &delta).await?;
                Ok(())
            }
        })
        .await
    }

    async fn submit_score(&self, completed: &CompletedSession) -> Result<(), AppError> {
        let key = completed.partition_key();
        let entry = LeaderboardEntry::for_session(completed);
        self.with_retry("leaderboard", &completed.session_id, || {
            let key = key.clone();
            let entry = entry.clone();
            async move {
                self.leaderboard.submit(&key, entry).await?;
                Ok(())
            }
        })
        .await
    }

    /// Runs one aggregate update, retrying transient failures with exponential backoff
    async fn with_retry<F, Fut>(
        &self,
        step: &'static str,
        session_id: &str,
        mut operation: F,
    ) -> Result<(), AppError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<(), AppError>> + Send,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(()) => {
                    if attempt > 0 {
                        info!(
                            step,
                            session_id,
                            attempt = attempt + 1,
                            "Aggregate update succeeded after retry"
                        );
                    }
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    warn!(
                        step,
                        session_id,
                        attempt = attempt + 1,
                        error = %e,
                        "Aggregate update failed, will retry"
                    );
                    tokio::time::sleep(backoff_delay(self.retry_backoff, attempt)).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        step,
                        session_id,
                        attempt = attempt + 1,
                        error = %e,
                        "Aggregate update failed permanently"
                    );
                    return Err(e);
                }
            }
        }
    }
}

/// `base * 2^attempt`, capped at ten doublings and saturating at `Duration::MAX`
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2_u32.pow(attempt.min(10)))
}

#[async_trait]
impl CompletionListener for GameOrchestrator {
    #[instrument(skip(self, completed), fields(session_id = %completed.session_id, user_id = %completed.user_id))]
    async fn on_session_completed(&self, completed: &CompletedSession) -> Result<(), AppError> {
        // The two aggregates are disjoint, so one failing must not stop the other
        let stats_result = self.apply_stats(completed).await;
        let leaderboard_result = self.submit_score(completed).await;

        let failures: Vec<String> = [("user stats", stats_result), ("leaderboard", leaderboard_result)]
            .into_iter()
            .filter_map(|(step, result)| result.err().map(|e| format!("{}: {}", step, e)))
            .collect();

        if failures.is_empty() {
            info!(score = completed.score, "Session results applied to aggregates");
            Ok(())
        } else {
            Err(AppError::AggregateUpdate(format!(
                "session {}: {}",
                completed.session_id,
                failures.join("; ")
            )))
        }
    }

    fn name(&self) -> &'static str {
        "GameOrchestrator"
    }
}
