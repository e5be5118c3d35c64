use thiserror::Error;

/// Error taxonomy for the sync engine.
///
/// Configuration and authentication errors are fatal at startup. Remote
/// lookup failures are reported unless they block bootstrap. Transfer errors
/// are retried with the full payload before escalating.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("remote lookup failed: {0}")]
    RemoteLookup(String),

    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("watch error: {0}")]
    Watch(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}
