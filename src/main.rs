//! Libtwin Server - digital library management
//!
//! REST API and real-time channel for the library dashboards and gate devices.

use std::net::SocketAddr;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use libtwin_server::{
    config::{AppConfig, StoreBackend},
    create_router,
    realtime::{relay, RealtimeHub},
    repository::Repository,
    services::{notifications, Services},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("libtwin_server={},tower_http=debug", config.logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Libtwin Server v{}", env!("CARGO_PKG_VERSION"));

    let repository = match config.database.backend {
        StoreBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .connect(&config.database.url)
                .await
                .context("Failed to connect to database")?;

            tracing::info!("Connected to database");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run database migrations")?;

            tracing::info!("Database migrations completed");
            Repository::new(pool)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on shutdown");
            Repository::in_memory()
        }
    };

    // Cross-instance fan-out is optional
    let hub = match config.realtime.redis_url.as_deref() {
        Some(url) => {
            let (tx, rx) = mpsc::unbounded_channel();
            let hub = RealtimeHub::with_relay(tx);
            relay::start(hub.clone(), rx, url, &config.realtime.relay_channel)
                .await
                .context("Failed to start the realtime relay")?;
            hub
        }
        None => RealtimeHub::new(),
    };

    let notifier = notifications::from_config(&config.email);
    let services = Services::new(repository, &config, notifier);

    let _sweeper = services.fines.clone().spawn_scheduler();
    tracing::info!(
        interval_hours = config.fines.sweep_interval_hours,
        "Fine sweep scheduled"
    );

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let state = AppState::new(config, services, hub);
    let app = create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
