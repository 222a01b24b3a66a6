mod accounts;
mod config;
mod entities;
mod http;
mod lifecycle;
mod models;
mod rpc;
mod state;
mod store;
mod validation;

use std::sync::Arc;

use crate::accounts::AccountDirectory;
use crate::config::{ApiConfig, DatabaseConfig, StorageBackend};
use crate::lifecycle::{LifecyclePolicy, SellRequestManager, SystemClock};
use crate::rpc::RpcClient;
use crate::state::AppState;
use crate::store::Storage;
use anyhow::{Context, Result};
use axum::Router;
use migration::MigratorTrait;
use sea_orm::ConnectOptions;
use sea_orm::Database;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = ApiConfig::load().context("Failed to load configuration")?;

    let storage = match (config.storage.backend, config.database.as_ref()) {
        (StorageBackend::Postgres, Some(database_config)) => {
            let database = connect_database(database_config).await?;
            run_migrations(&database).await?;
            Storage::postgres(database)
        }
        (StorageBackend::Postgres, None) => {
            anyhow::bail!("PostgreSQL storage selected without a [database] section")
        }
        (StorageBackend::Memory, _) => {
            warn!("Using in-memory storage; sell requests will not survive a restart");
            Storage::memory()
        }
    };

    let rpc_client = RpcClient::new(&config.chain.rpc_url, config.chain.request_timeout())
        .context("Failed to initialize RPC client")?;

    let clock = Arc::new(SystemClock);
    let accounts = Arc::new(AccountDirectory::new(
        storage.accounts,
        clock.clone(),
        &config.cache,
    ));
    let requests = Arc::new(SellRequestManager::new(
        storage.requests,
        accounts.clone(),
        clock,
        LifecyclePolicy::from_config(&config.lifecycle),
    ));
    let policy = requests.policy();
    info!(
        max_documents = policy.max_documents,
        max_query_limit = policy.max_query_limit,
        stale_approval_hours = policy.stale_approval_after.num_hours(),
        "Sell request lifecycle configured"
    );

    let app_state = AppState::new(requests, accounts, rpc_client);

    let listener = TcpListener::bind(config.server.address())
        .await
        .context("Failed to bind HTTP listener")?;
    let local_addr = listener
        .local_addr()
        .context("Failed to obtain listener address")?;
    info!("Credit desk API listening on {local_addr}");

    let router: Router = http::router(app_state);
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server exited with error")?;

    Ok(())
}

fn init_tracing() {
    let default_filter = "info";
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    assert!(!filter.is_empty(), "Tracing filter must not be empty");
    assert!(filter.len() < 256, "Tracing filter length exceeds bounds");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .compact()
        .init();
}

async fn connect_database(config: &DatabaseConfig) -> Result<sea_orm::DatabaseConnection> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug)
        .acquire_timeout(config.acquire_timeout());

    if let Some(min) = config.min_connections {
        options.min_connections(min);
    }

    assert!(
        config.max_connections >= config.min_connections.unwrap_or(1),
        "Max connections must be >= min connections"
    );
    assert!(config.max_connections <= 128, "Connection pool oversized");

    Database::connect(options)
        .await
        .context("Failed to connect to PostgreSQL")
}

async fn run_migrations(database: &sea_orm::DatabaseConnection) -> Result<()> {
    migration::Migrator::up(database, None)
        .await
        .context("Database migrations failed")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
        return;
    }
    info!("Shutdown signal received");
}
