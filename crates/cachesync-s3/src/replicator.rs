//! Directory-granular replication: drained directories are diff-synced
//! against their mapped key prefix, one at a time, uploading the full local
//! contents and deleting remote objects that no longer exist locally.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use globset::GlobSet;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use cachesync_core::{
    CoalesceMode, PushUnit, RemoteHandle, RemoteStore, Replicator, SyncError, WatchTarget,
};

use crate::plan::{key_for, plan_directory_sync};

pub struct BucketReplicator {
    store: Arc<dyn RemoteStore>,
    targets: Vec<WatchTarget>,
    ignore: GlobSet,
}

impl BucketReplicator {
    pub fn new(store: Arc<dyn RemoteStore>, targets: Vec<WatchTarget>, ignore: GlobSet) -> Self {
        Self {
            store,
            targets,
            ignore,
        }
    }

    /// The key prefix a whole target maps to: `{root_prefix}/{role}`.
    fn target_prefix(target: &WatchTarget) -> String {
        if target.remote_name.is_empty() {
            target.role.as_str().to_string()
        } else {
            format!("{}/{}", target.remote_name, target.role.as_str())
        }
    }

    /// The key prefix a directory inside a target maps to.
    fn dir_prefix(target: &WatchTarget, dir: &Path) -> Option<String> {
        let base = Self::target_prefix(target);
        let rel = dir.strip_prefix(&target.local_path).ok()?;
        if rel.as_os_str().is_empty() {
            Some(base)
        } else {
            Some(format!("{base}/{}", rel.to_str()?))
        }
    }

    /// Local files under `dir`, paired with their remote keys. A directory
    /// deleted between the event and the drain enumerates as empty, which
    /// drains its remote prefix.
    fn local_files(&self, target: &WatchTarget, dir: &Path) -> Vec<(std::path::PathBuf, String)> {
        let base = Self::target_prefix(target);
        let mut files = Vec::new();
        if !dir.is_dir() {
            return files;
        }
        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if self.ignore.is_match(&path) {
                continue;
            }
            match key_for(&target.local_path, &base, &path) {
                Some(key) => files.push((path, key)),
                None => warn!("skipping non-UTF-8 path {}", path.display()),
            }
        }
        files
    }

    async fn sync_directory(&self, target: &WatchTarget, dir: &Path) -> Result<(), SyncError> {
        let Some(prefix) = Self::dir_prefix(target, dir) else {
            return Err(SyncError::Config(format!(
                "directory {} is outside target {}",
                dir.display(),
                target.local_path.display()
            )));
        };

        let container = RemoteHandle::new(prefix.clone(), None, prefix.clone());
        let remote = self.store.list_container(&container).await?;
        let remote_keys: Vec<String> = remote.iter().map(|h| h.id.clone()).collect();

        let diff = plan_directory_sync(&prefix, self.local_files(target, dir), &remote_keys);
        if diff.is_empty() {
            debug!("nothing to sync under {prefix}");
            return Ok(());
        }

        let uploads = diff.uploads.len();
        let deletions = diff.deletions.len();

        for (path, key) in &diff.uploads {
            let existing = remote.iter().find(|h| &h.id == key);
            let name = key.strip_prefix(&format!("{prefix}/")).unwrap_or(key);
            self.store.put(path, name, &container, existing).await?;
        }
        for key in &diff.deletions {
            let name = key.rsplit('/').next().unwrap_or(key);
            let handle = RemoteHandle::new(key.clone(), Some(prefix.clone()), name);
            self.store.delete(&handle).await?;
        }

        info!("synced {prefix}: {uploads} uploaded, {deletions} deleted");
        Ok(())
    }
}

#[async_trait]
impl Replicator for BucketReplicator {
    fn coalesce_mode(&self) -> CoalesceMode {
        CoalesceMode::DirectoryGranular
    }

    async fn pull(&self, target: &WatchTarget) -> Result<(), SyncError> {
        let prefix = Self::target_prefix(target);
        let container = RemoteHandle::new(prefix.clone(), None, prefix.clone());
        let entries = self.store.list_container(&container).await?;
        if entries.is_empty() {
            warn!("no remote objects under {prefix}; starting from an empty remote");
            return Ok(());
        }

        for entry in &entries {
            let dest = target.local_path.join(&entry.name);
            self.store.get(entry, &dest).await?;
        }
        info!(
            "seeded {} object(s) from {prefix} into {}",
            entries.len(),
            target.local_path.display()
        );
        Ok(())
    }

    async fn push(&self, unit: &PushUnit) -> Result<(), SyncError> {
        let PushUnit::Directories(dirs) = unit else {
            return Err(SyncError::Transfer(
                "object backend drains directories only".into(),
            ));
        };

        for dir in dirs {
            let Some(target) = self.targets.iter().find(|t| t.owns(dir)) else {
                warn!("ignoring directory outside every target: {}", dir.display());
                continue;
            };
            self.sync_directory(target, dir).await?;
        }
        Ok(())
    }
}
