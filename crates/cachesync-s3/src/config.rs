use std::path::PathBuf;

use clap::Parser;

/// Configuration for the cachesync-s3 daemon.
#[derive(Parser, Debug, Clone)]
#[command(name = "cachesync-s3")]
#[command(about = "Replicates build cache directories to an S3 bucket with per-directory diff sync")]
pub struct Config {
    /// Local cache directory to replicate
    #[arg(long, default_value = ".cache", env = "CACHESYNC_CACHE_PATH")]
    pub cache_path: PathBuf,

    /// Local public directory to replicate
    #[arg(long, default_value = "public", env = "CACHESYNC_PUBLIC_PATH")]
    pub public_path: PathBuf,

    /// S3 bucket holding the replicated objects
    #[arg(long, env = "CACHESYNC_S3_BUCKET")]
    pub bucket: String,

    /// Key prefix inside the bucket (e.g. the site name)
    #[arg(long, default_value = "", env = "CACHESYNC_S3_PREFIX")]
    pub prefix: String,

    /// AWS region
    #[arg(long, default_value = "us-east-1", env = "AWS_REGION")]
    pub region: String,

    /// Access key id
    #[arg(long, env = "AWS_ACCESS_KEY_ID")]
    pub access_key_id: String,

    /// Secret access key
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY")]
    pub secret_access_key: String,

    /// Custom endpoint URL for S3-compatible stores
    #[arg(long, env = "CACHESYNC_S3_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Extra ignore globs on top of the built-in list (comma separated)
    #[arg(long, env = "CACHESYNC_IGNORE", value_delimiter = ',')]
    pub ignore: Vec<String>,

    /// Seconds of quiet after the last change before pending directories drain
    #[arg(long, default_value = "10", env = "CACHESYNC_QUIET_SECS")]
    pub quiet_secs: u64,
}
