use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use barcode_trivia::{
    config::AppConfig,
    game::GameSessionModel,
    leaderboard::LeaderboardPartition,
    shared::{AppError, AppState},
    stats::UserStats,
    store::{InMemoryVersionedRepository, PostgresVersionedRepository},
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "barcode_trivia=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting trivia game server");

    if let Err(e) = run(AppConfig::from_env()).await {
        error!(error = %e, "Server exited with error");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    let app_state = match &config.database_url {
        Some(database_url) => {
            info!("Using PostgreSQL stores");
            let pool = sqlx::PgPool::connect(database_url)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;

            let sessions: PostgresVersionedRepository<GameSessionModel> =
                PostgresVersionedRepository::new(pool.clone(), "game_sessions");
            let partitions: PostgresVersionedRepository<LeaderboardPartition> =
                PostgresVersionedRepository::new(pool.clone(), "leaderboard_partitions");
            let stats: PostgresVersionedRepository<UserStats> =
                PostgresVersionedRepository::new(pool, "user_stats");
            sessions.init().await?;
            partitions.init().await?;
            stats.init().await?;

            AppState::new(
                &config,
                Arc::new(sessions),
                Arc::new(partitions),
                Arc::new(stats),
            )
        }
        None => {
            info!("DATABASE_URL not set, using in-memory stores");
            AppState::new(
                &config,
                Arc::new(InMemoryVersionedRepository::<GameSessionModel>::new()),
                Arc::new(InMemoryVersionedRepository::<LeaderboardPartition>::new()),
                Arc::new(InMemoryVersionedRepository::<UserStats>::new()),
            )
        }
    };

    let app = barcode_trivia::router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|e| {
            error!(addr = %config.bind_addr, error = %e, "Failed to bind");
            AppError::Internal
        })?;
    info!("Server running on http://{}", config.bind_addr);

    axum::serve(listener, app).await.map_err(|e| {
        error!(error = %e, "Server error");
        AppError::Internal
    })
}
