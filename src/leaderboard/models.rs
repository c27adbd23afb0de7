use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::game::{CompletedSession, PartitionKey};

/// Maximum number of entries a partition keeps
pub const LEADERBOARD_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub score: u64,
    pub timestamp: DateTime<Utc>,
    /// Session the score came from; resubmissions for the same session are ignored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl LeaderboardEntry {
    pub fn new(user_id: impl Into<String>, score: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            score,
            timestamp,
            session_id: None,
        }
    }

    pub fn for_session(completed: &CompletedSession) -> Self {
        Self {
            user_id: completed.user_id.clone(),
            score: completed.score,
            timestamp: completed.completed_at,
            session_id: Some(completed.session_id.clone()),
        }
    }

    /// Leaderboard order: higher score first, earlier timestamp wins ties
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.timestamp.cmp(&other.timestamp))
    }
}

/// Ranked, capped list of scores for one (mode, difficulty, category)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardPartition {
    pub key: PartitionKey,
    pub entries: Vec<LeaderboardEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeaderboardPartition {
    pub fn new(key: PartitionKey) -> Self {
        let now = Utc::now();
        Self {
            key,
            entries: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Inserts an entry, re-sorts and truncates to capacity.
    /// Returns false when the entry's session was already recorded.
    pub fn insert(&mut self, entry: LeaderboardEntry) -> bool {
        if let Some(session_id) = &entry.session_id {
            let already_recorded = self
                .entries
                .iter()
                .any(|existing| existing.session_id.as_ref() == Some(session_id));
            if already_recorded {
                return false;
            }
        }

        self.entries.push(entry);
        // Stable sort keeps arrival order for identical score and timestamp
        self.entries.sort_by(LeaderboardEntry::rank_cmp);
        self.entries.truncate(LEADERBOARD_CAPACITY);
        self.updated_at = Utc::now();
        true
    }

    /// Position of the first entry for `user_id`, 1-based
    pub fn rank_of(&self, user_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.user_id == user_id)
            .map(|index| index + 1)
    }
}
