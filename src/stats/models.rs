use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::game::{CompletedSession, Difficulty, GameMode};

/// Number of recently completed sessions remembered per user
pub const RECENT_SESSIONS: usize = 10;

/// Cumulative statistics for one user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: String,
    pub games_played: u64,
    pub total_score: u64,
    pub correct_answers: u64,
    pub wrong_answers: u64,
    pub high_score: u64,
    /// Best score per `mode/difficulty` bracket, e.g. `timeAttack/hard`
    #[serde(default)]
    pub bracket_high_scores: BTreeMap<String, u64>,
    /// Most recently applied session ids, newest first
    #[serde(default)]
    pub recent_sessions: VecDeque<String>,
    /// Every session id ever applied; makes `apply` idempotent for replays of any age
    #[serde(default)]
    pub applied_sessions: BTreeSet<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// The contribution of one completed session to its owner's statistics
#[derive(Debug, Clone, PartialEq)]
pub struct StatsDelta {
    pub session_id: String,
    pub mode: GameMode,
    pub difficulty: Difficulty,
    pub score: u64,
    pub correct_answers: u32,
    pub wrong_answers: u32,
}

impl From<&CompletedSession> for StatsDelta {
    fn from(completed: &CompletedSession) -> Self {
        Self {
            session_id: completed.session_id.clone(),
            mode: completed.mode,
            difficulty: completed.difficulty,
            score: completed.score,
            correct_answers: completed.correct_answers,
            wrong_answers: completed.wrong_answers,
        }
    }
}

pub fn bracket(mode: GameMode, difficulty: Difficulty) -> String {
    format!("{}/{}", mode, difficulty)
}

impl UserStats {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn has_applied(&self, session_id: &str) -> bool {
        self.applied_sessions.contains(session_id)
            || self.recent_sessions.iter().any(|id| id == session_id)
    }

    /// Folds a completed session in. Returns false if that session was already applied.
    pub fn apply(&mut self, delta: &StatsDelta) -> bool {
        if self.has_applied(&delta.session_id) {
            return false;
        }

        self.games_played += 1;
        self.total_score = self.total_score.saturating_add(delta.score);
        self.correct_answers += u64::from(delta.correct_answers);
        self.wrong_answers += u64::from(delta.wrong_answers);
        self.high_score = self.high_score.max(delta.score);

        let best = self
            .bracket_high_scores
            .entry(bracket(delta.mode, delta.difficulty))
            .or_insert(0);
        *best = (*best).max(delta.score);

        self.applied_sessions.insert(delta.session_id.clone());
        self.recent_sessions.push_front(delta.session_id.clone());
        self.recent_sessions.truncate(RECENT_SESSIONS);
        self.updated_at = Some(Utc::now());
        true
    }
}
