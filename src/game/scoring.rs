use super::types::GameMode;

/// Points for a correct answer in untimed modes
pub const FLAT_ANSWER_POINTS: u64 = 100;

/// Numerator of the time-attack curve: a one second answer is worth this much
pub const TIME_ATTACK_POINTS: f64 = 1000.0;

/// Pure scoring of a single correct answer
pub struct ScoreCalculator;

impl ScoreCalculator {
    /// Points awarded for a correct answer given in `time_to_answer` seconds.
    ///
    /// Time attack pays inversely to answer time. A zero, negative or non-finite
    /// time counts as one second.
    pub fn score(mode: GameMode, time_to_answer: f64) -> u64 {
        match mode {
            GameMode::TimeAttack => {
                let seconds = if time_to_answer.is_finite() && time_to_answer > 0.0 {
                    time_to_answer
                } else {
                    1.0
                };
                // `as` saturates for answers so fast the quotient exceeds u64
                (TIME_ATTACK_POINTS / seconds).round() as u64
            }
            GameMode::Standard | GameMode::Endless => FLAT_ANSWER_POINTS,
        }
    }
}
