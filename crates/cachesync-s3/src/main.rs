mod config;
mod plan;
mod replicator;
mod store;

use std::sync::Arc;
use std::time::Duration;

use aws_config::Region;
use aws_sdk_s3::config::{BehaviorVersion, Credentials};
use clap::Parser;
use tokio::signal;
use tokio::sync::{mpsc, watch as tokio_watch};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cachesync_core::{
    build_ignore_set, BootstrapLoader, ChangeDetector, SyncOrchestrator, SyncSettings,
};

use config::Config;
use replicator::BucketReplicator;
use store::BucketStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();

    info!("Starting cachesync-s3");
    info!("  S3 bucket: {}", config.bucket);

    let settings = SyncSettings::resolve(
        &config.cache_path,
        &config.public_path,
        config.ignore.clone(),
        Duration::from_secs(config.quiet_secs),
    )?;
    let targets = settings.watch_targets(&config.prefix);

    let credentials = Credentials::new(
        &config.access_key_id,
        &config.secret_access_key,
        None,
        None,
        "cachesync",
    );
    let mut s3_config = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .credentials_provider(credentials)
        .region(Region::new(config.region.clone()));
    if let Some(endpoint) = &config.endpoint {
        s3_config = s3_config.endpoint_url(endpoint).force_path_style(true);
    }
    let s3_client = aws_sdk_s3::Client::from_conf(s3_config.build());

    let store = Arc::new(BucketStore::new(s3_client, config.bucket.clone()));
    let ignore = build_ignore_set(&settings.ignore)?;
    let replicator = Arc::new(BucketReplicator::new(
        store,
        targets.clone(),
        ignore.clone(),
    ));

    // Seed local directories from the remote before watching starts.
    BootstrapLoader::new(replicator.as_ref())
        .pull_all(&targets)
        .await?;

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
