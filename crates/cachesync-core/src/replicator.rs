use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::target::WatchTarget;

/// Granularity at which a backend coalesces change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalesceMode {
    /// Rebuild and push the whole target (archive backend).
    WholeTarget,
    /// Queue containing directories and drain them as diff syncs (object
    /// backend).
    DirectoryGranular,
}

/// One coalesced unit of push work handed to a backend.
#[derive(Debug, Clone)]
pub enum PushUnit {
    Target(WatchTarget),
    Directories(Vec<PathBuf>),
}

/// Backend seam consumed by the bootstrap loader and the orchestrator.
///
/// Implementations express their work through [`crate::RemoteStore`]; callers
/// never branch on which backend they hold.
#[async_trait]
pub trait Replicator: Send + Sync {
    fn coalesce_mode(&self) -> CoalesceMode;

    /// One-shot bootstrap pull: populate the target's local directory from
    /// the remote container. Idempotent; an empty remote is a valid start.
    async fn pull(&self, target: &WatchTarget) -> Result<(), SyncError>;

    /// Push one coalesced unit. Must be idempotent for a given unit so that
    /// coalescing and full-payload retries lose no required work.
    async fn push(&self, unit: &PushUnit) -> Result<(), SyncError>;
}
