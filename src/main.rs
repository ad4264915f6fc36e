//! Rentdesk Server - Equipment Rental Reservation & Pricing
//!
//! REST API server for reservations, quotes and the rental workflow.

use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use rentdesk_server::{
    api,
    config::{AppConfig, LoggingConfig},
    repository::{memory::MemoryRepository, Repository, ReservationStore},
    services::{payments::RecordingGateway, redis::RedisService, Services},
    AppState,
};

/// Console output plus an optional daily rolling file; keep the guard alive
fn init_tracing(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("rentdesk_server={},tower_http=debug", logging.level).into());

    let console = if logging.format == "json" {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    let (file, guard) = match &logging.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "rentdesk.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();

    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    let _log_guard = init_tracing(&config.logging);

    tracing::info!("Starting Rentdesk Server v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn ReservationStore> = if config.database.in_memory {
        tracing::warn!("Using the in-memory store; data is lost on restart");
        Arc::new(MemoryRepository::new())
    } else {
        // Create database connection pool
        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .connect(&config.database.url)
            .await?;

        tracing::info!("Connected to database");

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("Database migrations completed");
        Arc::new(Repository::new(pool))
    };

    // Redis only mirrors change notifications; run without it if absent
    let redis = match &config.redis.url {
        Some(url) => match RedisService::new(url, &config.redis.channel).await {
            Ok(service) => {
                tracing::info!("Connected to Redis, publishing on {}", service.channel());
                Some(service)
            }
            Err(e) => {
                tracing::warn!("Redis unavailable, notifications stay in-process: {}", e);
                None
            }
        },
        None => None,
    };

    // Save server address before moving config
    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    let services = Services::new(store, Arc::new(RecordingGateway::new()), &config, redis);

    // Create application state
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    // Build router
    let app = api::create_router(state);

    // Start server
    let addr = SocketAddr::new(server_host.parse()?, server_port);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
