//! Server binary.
//!
//! Wires the `PostgreSQL` stores, the coordinator and the notification hub
//! into the Axum router and serves it with graceful shutdown.

use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use upkeep_core::{Coordinator, QueryViews};
use upkeep_postgres::{PostgresAssignmentLedger, PostgresDirectory, PostgresRequestStore};
use upkeep_web::{AppState, Config, NotificationHub, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "upkeep=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.max_db_connections)
        .connect(&config.database_url)
        .await?;
    upkeep_postgres::migrate(&pool).await?;
    tracing::info!("Database migrations applied");

    let store = Arc::new(PostgresRequestStore::new(pool.clone()));
    let ledger = Arc::new(PostgresAssignmentLedger::new(pool.clone()));
    let directory = Arc::new(PostgresDirectory::new(pool.clone()));
    let hub = Arc::new(NotificationHub::new());

    let coordinator = Arc::new(Coordinator::new(
        store.clone(),
        ledger.clone(),
        directory.clone(),
        hub.clone(),
    ));
    let views = QueryViews::new(store, ledger, directory);

    let app = build_router(AppState::new(coordinator, views, hub));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
