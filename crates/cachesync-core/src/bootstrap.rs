use tracing::info;

use crate::error::SyncError;
use crate::replicator::Replicator;
use crate::retry::with_retry;
use crate::target::WatchTarget;

/// One-shot pull of remote state into the local directories before watching
/// starts. A consistent starting state is a precondition for safe watching,
/// so any failure here aborts startup.
pub struct BootstrapLoader<'a> {
    replicator: &'a dyn Replicator,
}

impl<'a> BootstrapLoader<'a> {
    pub fn new(replicator: &'a dyn Replicator) -> Self {
        Self { replicator }
    }

    /// Seed one target. Retries the transfer; exhaustion is fatal here.
    pub async fn pull(&self, target: &WatchTarget) -> Result<(), SyncError> {
        let what = format!(
            "bootstrap pull of {} into {}",
            target.remote_name,
            target.local_path.display()
        );
        with_retry(&what, || self.replicator.pull(target)).await?;
        info!(
            "seeded {} from remote {}",
            target.local_path.display(),
            target.remote_name
        );
        Ok(())
    }

    /// Seed every target in order.
    pub async fn pull_all(&self, targets: &[WatchTarget]) -> Result<(), SyncError> {
        for target in targets {
            self.pull(target).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replicator::{CoalesceMode, PushUnit};
    use crate::target::TargetRole;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyReplicator {
        pulls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl Replicator for FlakyReplicator {
        fn coalesce_mode(&self) -> CoalesceMode {
            CoalesceMode::WholeTarget
        }

        async fn pull(&self, _target: &WatchTarget) -> Result<(), SyncError> {
            let n = self.pulls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_first {
                Err(SyncError::Transfer(format!("pull attempt {n} failed")))
            } else {
                Ok(())
            }
        }

        async fn push(&self, _unit: &PushUnit) -> Result<(), SyncError> {
            Ok(())
        }
    }

    fn target() -> WatchTarget {
        WatchTarget::new(PathBuf::from("/tmp/cache"), "site-cache", TargetRole::Cache)
    }

    #[tokio::test(start_paused = true)]
    async fn pull_retries_then_succeeds() {
        let replicator = FlakyReplicator {
            pulls: AtomicU32::new(0),
            fail_first: 2,
        };
        let loader = BootstrapLoader::new(&replicator);
        loader.pull(&target()).await.unwrap();
        assert_eq!(replicator.pulls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_abort_bootstrap() {
        let replicator = FlakyReplicator {
            pulls: AtomicU32::new(0),
            fail_first: u32::MAX,
        };
        let loader = BootstrapLoader::new(&replicator);
        let err = loader.pull_all(&[target()]).await.unwrap_err();
        assert!(matches!(err, SyncError::Transfer(_)));
        assert_eq!(replicator.pulls.load(Ordering::SeqCst), 3);
    }
}
