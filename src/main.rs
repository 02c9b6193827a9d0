//! loyalty-server entry point
//!
//! Bootstraps configuration, logging, the database pool, the accrual
//! pipeline and the HTTP server; shuts everything down in reverse order on
//! SIGINT/SIGTERM.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use loyalty_server::accrual::{AccrualClient, HttpAccrualClient};
use loyalty_server::api;
use loyalty_server::config::Config;
use loyalty_server::pipeline::{Pipeline, PipelineConfig};
use loyalty_server::state::AppState;
use loyalty_server::store::pg::{PgLedgerStore, PgOrderStore, PgUserStore};
use loyalty_server::store::{LedgerStore, OrderStore, UserStore};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let _ = dotenvy::dotenv();

    let config = Config::load()?;
    init_tracing(&config.log_level);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting loyalty-server");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&config.database_uri)
        .await?;
    tracing::info!("connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("migrations completed");

    let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool.clone()));
    let orders: Arc<dyn OrderStore> = Arc::new(PgOrderStore::new(pool.clone()));
    let ledger: Arc<dyn LedgerStore> = Arc::new(PgLedgerStore::new(pool.clone()));
    let client: Arc<dyn AccrualClient> = Arc::new(HttpAccrualClient::new(&config.accrual_address)?);

    let pipeline = Pipeline::spawn(
        orders.clone(),
        ledger.clone(),
        client,
        PipelineConfig {
            workers: config.worker_pool_size,
            queue_capacity: config.worker_queue_size,
            scan_interval: config.worker_scan_interval,
        },
    );

    let state = AppState::new(
        Some(pool.clone()),
        users,
        orders,
        ledger,
        config.jwt_secret.clone(),
        config.min_password_len,
    );
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(address = %config.bind_addr(), "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The server has stopped accepting requests; drain the pipeline, then
    // release the pool.
    pipeline.shutdown().await;
    pool.close().await;
    tracing::info!("server stopped gracefully");

    Ok(())
}

fn init_tracing(log_level: &str) {
    let default_filter = if log_level == "production" {
        "loyalty_server=info,tower_http=info"
    } else {
        "loyalty_server=debug,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if log_level == "production" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
