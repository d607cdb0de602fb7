//! upwatch - HTTP endpoint health monitor
//!
//! Periodically probes a configurable set of URLs, keeps a bounded history
//! per endpoint and serves aggregate status over a small JSON API.

mod config;
mod db;
mod probe;
mod scheduler;
mod targets;
mod web;

use config::ServerConfig;
use db::Store;
use probe::HttpProber;
use scheduler::{RefreshManager, RunSettings, Scheduler};
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("upwatch=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting upwatch on port {}...", cfg.http_port);
    tracing::info!("Using data directory {}", cfg.data_dir.display());

    // Restore persisted targets and history
    let store = Store::new(cfg.targets_path(), cfg.history_path());
    let prober = HttpProber::new()?;
    let scheduler = Arc::new(Scheduler::new(prober, store, RunSettings::from(&cfg)));

    let refresh = cfg
        .refresh_interval
        .map(|interval| RefreshManager::start(scheduler.clone(), interval));

    // Start web server
    let server = Server::new(cfg, scheduler.clone());
    let served = server.start(shutdown_signal()).await;

    if let Some(refresh) = refresh {
        refresh.stop().await;
    }
    scheduler.shutdown().await;

    served
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown requested"),
        Err(e) => {
            tracing::error!("Unable to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
