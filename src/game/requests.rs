use serde::{Deserialize, Serialize};

/// Request payload for starting a game session
#[derive(Debug, Deserialize, Serialize)]
pub struct CreateSessionRequest {
    pub mode: String,
    pub difficulty: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// Request payload for recording one answered movie
#[derive(Debug, Deserialize, Serialize)]
pub struct RecordAnswerRequest {
    #[serde(alias = "movieId", alias = "movie_id")]
    pub item_id: String,
    pub correct: bool,
    /// Seconds; omitted counts as zero
    #[serde(default, alias = "timeToAnswer")]
    pub time_to_answer: f64,
}

/// Request payload for completing a session
#[derive(Debug, Deserialize, Serialize)]
pub struct CompleteSessionRequest {
    #[serde(default)]
    pub duration: f64,
}
