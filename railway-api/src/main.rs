use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use railway_api::{app, worker, AuthConfig};
use railway_core::{BookingStore, SeatLock};
use railway_store::{
    Config, DbClient, InMemorySeatLock, InMemoryStore, RedisSeatLock, StorageBackend,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "railway_api=debug,railway_order=info,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Railway API on port {}", config.server.port);

    let (store, locks, rules) =
        match config.storage.backend {
            StorageBackend::Postgres => {
                let db = DbClient::new(&config.database.url)
                    .await
                    .context("Failed to connect to Postgres")?;
                db.migrate().await.context("Failed to run migrations")?;
                let rules = db
                    .fetch_booking_rules(config.booking.clone())
                    .await
                    .context("Failed to load business rules")?;

                let redis = RedisSeatLock::new(&config.redis.url)
                    .context("Invalid Redis URL")?;
                redis.ping().await.context("Failed to connect to Redis")?;

                let store: Arc<dyn BookingStore> = Arc::new(db);
                let locks: Arc<dyn SeatLock> = Arc::new(redis);
                (store, locks, rules)
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on exit");
                let store: Arc<dyn BookingStore> = Arc::new(InMemoryStore::new());
                let locks: Arc<dyn SeatLock> = Arc::new(InMemorySeatLock::new());
                (store, locks, config.booking.clone())
            }
        };
    rules.validate().context("Invalid booking rules")?;

    let (state, ctx) = worker::build_state(
        store,
        locks,
        worker::gateway_from_rules(&rules),
        &rules,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    );

    let sweepers = worker::start_expiration_workers(&ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweepers.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
