//! # BranchPOS API
//!
//! HTTP server for sales, transfers and stock queries across branches.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          BranchPOS API Server                           │
//! │                                                                         │
//! │  Storefront / POS ───► HTTP (8080) ───► Engine services ───► SQLite    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use branchpos_api::{router, AppConfig, AppState};
use branchpos_db::{Database, DbConfig};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "branchpos-api")]
#[command(about = "Multi-branch point-of-sale backend")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, env = "BRANCHPOS_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting BranchPOS API server...");

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config).context("Failed to load configuration")?;
    info!(
        bind = %config.server.bind_address(),
        db_path = %config.database.path.display(),
        tax_rate_bps = config.pricing.default_tax_rate_bps,
        payment_plans = config.pricing.payment_plans.len(),
        "Configuration loaded"
    );

    let db = Database::new(db_config(&config)?)
        .await
        .context("Failed to open database")?;
    info!("Database ready");

    let state = AppState::new(db.clone(), &config).context("Invalid pricing configuration")?;
    let app = router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(config.server.bind_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address()))?;
    info!(addr = %config.server.bind_address(), "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,branchpos=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn db_config(config: &AppConfig) -> anyhow::Result<DbConfig> {
    let path = &config.database.path;
    if path.as_os_str() == ":memory:" {
        return Ok(DbConfig::in_memory());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    Ok(DbConfig::new(path.clone()).max_connections(config.database.max_connections))
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
