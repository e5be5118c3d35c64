//! Archive-granular replication: every push rebuilds the target's whole
//! tar.gz snapshot and upserts it into the remote folder under a fixed name,
//! so the folder only ever holds one payload per target.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use cachesync_core::{
    CoalesceMode, HandleCache, PushUnit, RemoteHandle, RemoteStore, Replicator, SyncError,
    TargetRole, WatchTarget,
};

use crate::archive;

#[derive(Default)]
struct State {
    container: Option<RemoteHandle>,
    handles: HandleCache,
}

pub struct DriveReplicator {
    store: Arc<dyn RemoteStore>,
    /// Scratch directory for tarballs; must live outside the watched roots.
    staging_dir: PathBuf,
    state: Mutex<State>,
}

impl DriveReplicator {
    pub fn new(store: Arc<dyn RemoteStore>, staging_dir: PathBuf) -> Self {
        Self {
            store,
            staging_dir,
            state: Mutex::new(State::default()),
        }
    }

    /// Find or create the remote folder, caching the handle for the process
    /// lifetime.
    async fn resolve_container(&self, name: &str) -> Result<RemoteHandle, SyncError> {
        if let Some(container) = self.state.lock().await.container.clone() {
            return Ok(container);
        }
        let container = match self.store.find_by_name(None, name).await? {
            Some(found) => found,
            None => {
                info!("remote folder {name} not found, creating it");
                self.store.create_container(name, None).await?
            }
        };
        self.state.lock().await.container = Some(container.clone());
        Ok(container)
    }

    fn staging_path(&self, role: TargetRole) -> PathBuf {
        self.staging_dir.join(role.archive_name())
    }
}

#[async_trait]
impl Replicator for DriveReplicator {
    fn coalesce_mode(&self) -> CoalesceMode {
        CoalesceMode::WholeTarget
    }

    async fn pull(&self, target: &WatchTarget) -> Result<(), SyncError> {
        let container = self.resolve_container(&target.remote_name).await?;
        let archive_name = target.role.archive_name();

        let Some(handle) = self.store.find_by_name(Some(&container), archive_name).await? else {
            warn!(
                "no {archive_name} in remote folder {}; starting from an empty remote",
                target.remote_name
            );
            return Ok(());
        };

        tokio::fs::create_dir_all(&self.staging_dir).await?;
        let staging = self.staging_path(target.role);
        let bytes = self.store.get(&handle, &staging).await?;
        info!("downloaded {archive_name} ({bytes} bytes)");

        let tarball = staging.clone();
        let dest = target.local_path.clone();
        tokio::task::spawn_blocking(move || archive::unpack(&tarball, &dest))
            .await
            .map_err(|e| SyncError::Archive(format!("unpack task failed: {e}")))??;

        self.state.lock().await.handles.insert(archive_name, handle);
        Ok(())
    }

    async fn push(&self, unit: &PushUnit) -> Result<(), SyncError> {
        let PushUnit::Target(target) = unit else {
            return Err(SyncError::Transfer(
                "archive backend pushes whole targets only".into(),
            ));
        };

        let container = self.resolve_container(&target.remote_name).await?;
        let archive_name = target.role.archive_name();

        tokio::fs::create_dir_all(&self.staging_dir).await?;
        let staging = self.staging_path(target.role);
        let src = target.local_path.clone();
        let tarball = staging.clone();
        tokio::task::spawn_blocking(move || archive::pack(&src, &tarball))
            .await
            .map_err(|e| SyncError::Archive(format!("pack task failed: {e}")))??;

        // Reuse the resolved handle so repeated pushes update in place.
        let existing = match self.state.lock().await.handles.get(archive_name) {
            Some(handle) => Some(handle.clone()),
            None => {
                self.store
                    .find_by_name(Some(&container), archive_name)
                    .await?
            }
        };

        let handle = self
            .store
            .put(&staging, archive_name, &container, existing.as_ref())
            .await?;
        self.state.lock().await.handles.insert(archive_name, handle);
        info!(
            "pushed {archive_name} to remote folder {}",
            target.remote_name
        );
        Ok(())
    }
}
