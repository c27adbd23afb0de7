use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use barcode_trivia::{
    auth::TokenConfig,
    config::AppConfig,
    game::GameSessionModel,
    leaderboard::LeaderboardPartition,
    shared::AppState,
    stats::UserStats,
    store::InMemoryVersionedRepository,
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub state: AppState,
    pub app: Router,
    pub token_config: TokenConfig,
}

pub struct TestSetupBuilder {
    config: AppConfig,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.token = TokenConfig::with_secret("integration-test-secret");
        config.completion_retry_backoff = Duration::from_millis(1);
        Self { config }
    }

    #[allow(dead_code)]
    pub fn with_cas_max_attempts(mut self, attempts: u32) -> Self {
        self.config.cas_max_attempts = attempts;
        self
    }

    pub fn build(self) -> TestSetup {
        let state = AppState::new(
            &self.config,
            Arc::new(InMemoryVersionedRepository::<GameSessionModel>::new()),
            Arc::new(InMemoryVersionedRepository::<LeaderboardPartition>::new()),
            Arc::new(InMemoryVersionedRepository::<UserStats>::new()),
        );

        TestSetup {
            app: barcode_trivia::router(state.clone()),
            token_config: self.config.token.clone(),
            state,
        }
    }
}

impl Default for TestSetupBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestSetup {
    pub fn token_for(&self, user_id: &str) -> String {
        self.token_config.create_token(user_id, false).unwrap()
    }

    #[allow(dead_code)]
    pub fn admin_token(&self, user_id: &str) -> String {
        self.token_config.create_token(user_id, true).unwrap()
    }

    /// Sends one request through the router and returns the status with the parsed JSON body
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// Creates a session over HTTP and returns its id
    pub async fn start_game(&self, token: &str, mode: &str, difficulty: &str) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/api/games",
                Some(token),
                Some(serde_json::json!({ "mode": mode, "difficulty": difficulty })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn answer(
        &self,
        token: &str,
        session_id: &str,
        item_id: &str,
        correct: bool,
        time_to_answer: f64,
    ) -> (StatusCode, Value) {
        self.send(
            "PUT",
            &format!("/api/games/{}/movie", session_id),
            Some(token),
            Some(serde_json::json!({
                "movieId": item_id,
                "correct": correct,
                "timeToAnswer": time_to_answer,
            })),
        )
        .await
    }

    pub async fn finish(&self, token: &str, session_id: &str, duration: f64) -> (StatusCode, Value) {
        self.send(
            "PUT",
            &format!("/api/games/{}/complete", session_id),
            Some(token),
            Some(serde_json::json!({ "duration": duration })),
        )
        .await
    }
}
