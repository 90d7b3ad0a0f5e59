//! Forge server — agent build orchestration with live event streaming.
//!
//! A standalone binary: accepts a natural-language build prompt, drives the
//! multi-phase build workflow, streams typed events to the caller over SSE,
//! keeps build history in memory for the process lifetime, and anchors
//! per-phase content fingerprints in an external verification ledger on a
//! best-effort basis.

mod config;
mod dashboard;
mod events;
mod metrics;
mod models;
mod routes;
mod seeder;
mod services;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;

use crate::routes::AppState;
use crate::services::generator::{AnthropicGenerator, ContentGenerator};
use crate::services::ledger::{HttpLedgerClient, LedgerClient};
use crate::store::BuildStore;

#[derive(Parser)]
#[command(name = "forge-server", about = "Agent build orchestration server")]
struct Cli {
    /// Server port
    #[arg(short, long, env = "FORGE_PORT", default_value = "8080")]
    port: u16,

    /// Seed demo builds into the history on startup
    #[arg(long)]
    seed_demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    }

    let cli = Cli::parse();

    tracing::info!("Starting Forge server...");

    let config = config::ForgeConfig::from_env();
    let store = BuildStore::new();

    if cli.seed_demo {
        let seeded = seeder::seed_demo_builds(&store).await?;
        tracing::info!(seeded, total = store.count().await, "Demo builds seeded");
    }

    let generator: Arc<dyn ContentGenerator> = Arc::new(AnthropicGenerator::new(&config)?);
    let ledger: Arc<dyn LedgerClient> = Arc::new(HttpLedgerClient::new(&config)?);

    let state = AppState {
        store,
        generator,
        ledger,
        config,
    };
    let app = routes::forge_router(state);

    // Initialize metrics
    metrics::init_metrics();

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    tracing::info!("Forge server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");

    Ok(())
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
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
