use tracing::{debug, info, instrument};

use super::models::{LeaderboardEntry, LeaderboardPartition};
use crate::game::PartitionKey;
use crate::shared::{AppError, PartitionStore};
use crate::store::{update_with_retry, KeyedLocks};

/// Maintains ranked, capped leaderboard partitions.
///
/// Each submit holds the partition's lock for the whole read, insert, sort,
/// truncate and compare-and-swap, so two simultaneous scores cannot overwrite
/// each other. Different partitions never contend.
pub struct LeaderboardService {
    repository: PartitionStore,
    partition_locks: KeyedLocks,
    cas_max_attempts: u32,
}

impl LeaderboardService {
    pub fn new(repository: PartitionStore, cas_max_attempts: u32) -> Self {
        Self {
            repository,
            partition_locks: KeyedLocks::new(),
            cas_max_attempts,
        }
    }

    /// Adds a score to a partition, creating the partition on first use.
    /// Returns the partition's entries after the update.
    #[instrument(skip(self, entry), fields(partition = %key, user_id = %entry.user_id, score = entry.score))]
    pub async fn submit(
        &self,
        key: &PartitionKey,
        entry: LeaderboardEntry,
    ) -> Result<Vec<LeaderboardEntry>, AppError> {
        let storage_key = key.storage_key();
        let seed = LeaderboardPartition::new(key.clone());

        let _guard = self.partition_locks.lock(&storage_key).await;

        let (stored, inserted) = update_with_retry(
            self.repository.as_ref(),
            &storage_key,
            Some(&seed),
            self.cas_max_attempts,
            |partition| Ok(partition.insert(entry.clone())),
        )
        .await?;

        if inserted {
            info!(
                rank = ?stored.value.rank_of(&entry.user_id),
                entries = stored.value.entries.len(),
                "Score submitted to leaderboard"
            );
        } else {
            debug!(session_id = ?entry.session_id, "Session already on leaderboard, skipping");
        }

        Ok(stored.value.entries)
    }

    /// Current ranking of a partition; empty if nothing was ever submitted
    #[instrument(skip(self), fields(partition = %key))]
    pub async fn query(&self, key: &PartitionKey) -> Result<Vec<LeaderboardEntry>, AppError> {
        let entries = self
            .repository
            .get(&key.storage_key())
            .await?
            .map(|stored| stored.value.entries)
            .unwrap_or_default();

        debug!(entries = entries.len(), "Leaderboard queried");
        Ok(entries)
    }
}
