use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    scoring::ScoreCalculator,
    types::{Category, Difficulty, GameMode, PartitionKey},
};
use crate::shared::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Open,
    Completed,
}

/// One answered movie within a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub item_id: String,
    pub correct: bool,
    pub time_to_answer: f64, // Seconds
}

/// A single playthrough
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSessionModel {
    pub id: String,      // UUID v4 as string
    pub user_id: String, // Owner, the only caller allowed to mutate
    pub mode: GameMode,
    pub difficulty: Difficulty,
    pub category: Category,
    pub score: u64,
    pub correct_answers: u32,
    pub wrong_answers: u32,
    pub duration: f64, // Seconds, set on completion
    pub state: SessionState,
    pub answers: Vec<AnswerRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set once stats and leaderboard hold this session's result.
    /// A completed session with this unset needs reconciling.
    #[serde(default)]
    pub aggregates_applied: bool,
}

/// Final figures of a session, handed to the aggregates once it completes
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedSession {
    pub session_id: String,
    pub user_id: String,
    pub mode: GameMode,
    pub difficulty: Difficulty,
    pub category: Category,
    pub score: u64,
    pub correct_answers: u32,
    pub wrong_answers: u32,
    pub completed_at: DateTime<Utc>,
}

impl CompletedSession {
    pub fn partition_key(&self) -> PartitionKey {
        PartitionKey::new(self.mode, self.difficulty, self.category.clone())
    }
}

impl GameSessionModel {
    /// Creates an open session with zeroed counters and a fresh id
    pub fn new(user_id: String, mode: GameMode, difficulty: Difficulty, category: Category) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            mode,
            difficulty,
            category,
            score: 0,
            correct_answers: 0,
            wrong_answers: 0,
            duration: 0.0,
            state: SessionState::Open,
            answers: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            aggregates_applied: false,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state == SessionState::Completed
    }

    pub fn ensure_owner(&self, caller_id: &str) -> Result<(), AppError> {
        if self.user_id != caller_id {
            return Err(AppError::Unauthorized(
                "Not authorized to modify this game session".to_string(),
            ));
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), AppError> {
        if self.is_completed() {
            return Err(AppError::InvalidState(format!(
                "Game session {} is already completed",
                self.id
            )));
        }
        Ok(())
    }

    /// Appends an answer and folds it into the running totals.
    /// Returns the points awarded for it.
    pub fn record_answer(
        &mut self,
        item_id: String,
        correct: bool,
        time_to_answer: f64,
    ) -> Result<u64, AppError> {
        self.ensure_open()?;

        let points = if correct {
            self.correct_answers += 1;
            ScoreCalculator::score(self.mode, time_to_answer)
        } else {
            self.wrong_answers += 1;
            0
        };
        self.score = self.score.saturating_add(points);
        self.answers.push(AnswerRecord {
            item_id,
            correct,
            time_to_answer,
        });
        self.updated_at = Utc::now();

        Ok(points)
    }

    /// Open -> Completed; the only transition a session ever makes
    pub fn complete(&mut self, duration: f64) -> Result<CompletedSession, AppError> {
        self.ensure_open()?;

        let now = Utc::now();
        self.duration = duration;
        self.state = SessionState::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;

        self.completion_record()
    }

    /// Rebuilds the figures handed to the aggregates; fails while the session is open
    pub fn completion_record(&self) -> Result<CompletedSession, AppError> {
        let completed_at = match (self.state, self.completed_at) {
            (SessionState::Completed, Some(at)) => at,
            _ => {
                return Err(AppError::InvalidState(format!(
                    "Game session {} is not completed",
                    self.id
                )))
            }
        };

        Ok(CompletedSession {
            session_id: self.id.clone(),
            user_id: self.user_id.clone(),
            mode: self.mode,
            difficulty: self.difficulty,
            category: self.category.clone(),
            score: self.score,
            correct_answers: self.correct_answers,
            wrong_answers: self.wrong_answers,
            completed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_session(mode: GameMode) -> GameSessionModel {
        GameSessionModel::new(
            "user-1".to_string(),
            mode,
            Difficulty::Easy,
            Category::default(),
        )
    }

    #[test]
    fn test_new_session_is_open_and_zeroed() {
        let session = open_session(GameMode::Standard);

        assert!(!session.id.is_empty());
        assert_eq!(session.state, SessionState::Open);
        assert_eq!(session.score, 0);
        assert_eq!(session.correct_answers + session.wrong_answers, 0);
        assert!(session.answers.is_empty());
        assert_eq!(session.category.as_str(), "all");
        assert!(session.completed_at.is_none());
    }

    #[test]
    fn test_counters_track_answers() {
        let mut session = open_session(GameMode::TimeAttack);

        assert_eq!(session.record_answer("m1".into(), true, 0.5).unwrap(), 2000);
        assert_eq!(session.record_answer("m2".into(), false, 0.1).unwrap(), 0);
        assert_eq!(session.record_answer("m3".into(), true, 2.0).unwrap(), 500);

        assert_eq!(session.correct_answers, 2);
        assert_eq!(session.wrong_answers, 1);
        assert_eq!(
            (session.correct_answers + session.wrong_answers) as usize,
            session.answers.len()
        );
        assert_eq!(session.score, 2500);
        assert_eq!(session.answers[1].item_id, "m2");
    }

    #[test]
    fn test_complete_is_terminal() {
        let mut session = open_session(GameMode::Endless);
        session.record_answer("m1".into(), true, 3.0).unwrap();

        let completed = session.complete(42.0).unwrap();
        assert_eq!(completed.score, 100);
        assert_eq!(completed.correct_answers, 1);
        assert_eq!(session.duration, 42.0);
        assert!(session.is_completed());
        assert!(session.completed_at.is_some());

        let snapshot = session.clone();
        assert!(matches!(
            session.record_answer("m2".into(), true, 1.0),
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(session.complete(99.0), Err(AppError::InvalidState(_))));
        assert_eq!(session, snapshot);
    }

    #[test]
    fn test_ensure_owner() {
        let session = open_session(GameMode::Standard);
        assert!(session.ensure_owner("user-1").is_ok());
        assert!(matches!(
            session.ensure_owner("intruder"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_completed_session_partition_key() {
        let mut session = GameSessionModel::new(
            "user-1".to_string(),
            GameMode::TimeAttack,
            Difficulty::Hard,
            Category::parse("horror").unwrap(),
        );
        let completed = session.complete(10.0).unwrap();
        assert_eq!(completed.partition_key().storage_key(), "timeAttack:hard:horror");
    }

    #[test]
    fn test_completion_record_matches_completion() {
        let mut session = open_session(GameMode::Standard);
        assert!(matches!(
            session.completion_record(),
            Err(AppError::InvalidState(_))
        ));

        session.record_answer("m1".into(), true, 1.0).unwrap();
        let completed = session.complete(20.0).unwrap();
        assert_eq!(session.completion_record().unwrap(), completed);
        assert!(!session.aggregates_applied);
    }

    #[test]
    fn test_stored_sessions_without_flag_deserialize() {
        let session = open_session(GameMode::Standard);
        let mut json = serde_json::to_value(&session).unwrap();
        json.as_object_mut().unwrap().remove("aggregates_applied");

        let back: GameSessionModel = serde_json::from_value(json).unwrap();
        assert!(!back.aggregates_applied);
    }

    #[test]
    fn test_session_serialization() {
        let session = open_session(GameMode::TimeAttack);
        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"mode\":\"timeAttack\""));
        assert!(json.contains("\"state\":\"open\""));

        let back: GameSessionModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }
}
