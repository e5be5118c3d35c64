mod archive;
mod config;
mod drive;
mod replicator;
mod store;
mod token;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::sync::{mpsc, watch as tokio_watch};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cachesync_core::{
    build_ignore_set, BootstrapLoader, ChangeDetector, SyncOrchestrator, SyncSettings,
};

use config::Config;
use drive::DriveClient;
use replicator::DriveReplicator;
use store::DriveStore;
use token::{ServiceAccountKey, TokenProvider};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();

    info!("Starting cachesync-drive");
    info!("  Drive folder: {}", config.folder);

    let settings = SyncSettings::resolve(
        &config.cache_path,
        &config.public_path,
        config.ignore.clone(),
        Duration::from_secs(config.quiet_secs),
    )?;
    let targets = settings.watch_targets(&config.folder);

    // Authenticate once up front so bad credentials fail before any local
    // state is touched.
    let key = ServiceAccountKey::load(&config.key_file).await?;
    let tokens = TokenProvider::new(key);
    tokens.get_token().await?;

    let store = Arc::new(DriveStore::new(DriveClient::new(), tokens));
    let staging_dir = std::env::temp_dir().join("cachesync-drive-staging");
    let replicator = Arc::new(DriveReplicator::new(store, staging_dir));

    // Seed local directories from the remote before watching starts.
    BootstrapLoader::new(replicator.as_ref())
        .pull_all(&targets)
        .await?;

    let ignore = build_ignore_set(&settings.ignore)?;
    let (watch_tx, watch_rx) = mpsc::unbounded_channel();
    let roots: Vec<_> = targets.iter().map(|t| t.local_path.clone()).collect();
    let _detector = ChangeDetector::start(&roots, ignore, watch_tx)?;

    let orchestrator = SyncOrchestrator::new(targets, replicator, settings.quiet_period, watch_rx);
    let handle = orchestrator.handle();
    handle.bootstrap_finished();

    let mut shutdown_rx = create_shutdown_signal();
    tokio::select! {
        result = orchestrator.run() => result?,
        _ = shutdown_rx.wait_for(|&v| v) => {}
    }

    info!("Shutdown complete");
    Ok(())
}

/// Create a shutdown signal that triggers on Ctrl+C or SIGTERM.
fn create_shutdown_signal() -> tokio_watch::Receiver<bool> {
    let (tx, rx) = tokio_watch::channel(false);

    tokio::spawn(async move {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
            info!("Received Ctrl+C, initiating shutdown");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
            info!("Received SIGTERM, initiating shutdown");
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }

        let _ = tx.send(true);
    });

    rx
}
