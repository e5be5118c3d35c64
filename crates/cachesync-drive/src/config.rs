use std::path::PathBuf;

use clap::Parser;

/// Configuration for the cachesync-drive daemon.
#[derive(Parser, Debug, Clone)]
#[command(name = "cachesync-drive")]
#[command(about = "Replicates build cache directories to a Google Drive folder as tar.gz snapshots")]
pub struct Config {
    /// Local cache directory to replicate
    #[arg(long, default_value = ".cache", env = "CACHESYNC_CACHE_PATH")]
    pub cache_path: PathBuf,

    /// Local public directory to replicate
    #[arg(long, default_value = "public", env = "CACHESYNC_PUBLIC_PATH")]
    pub public_path: PathBuf,

    /// Name of the Drive folder (or shortcut) holding the snapshots
    #[arg(long, env = "CACHESYNC_DRIVE_FOLDER")]
    pub folder: String,

    /// Path to the service account key JSON file
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    pub key_file: PathBuf,

    /// Extra ignore globs on top of the built-in list (comma separated)
    #[arg(long, env = "CACHESYNC_IGNORE", value_delimiter = ',')]
    pub ignore: Vec<String>,

    /// Seconds of quiet after the last change before a snapshot is pushed
    #[arg(long, default_value = "5", env = "CACHESYNC_QUIET_SECS")]
    pub quiet_secs: u64,
}
