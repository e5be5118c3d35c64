use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::error::SyncError;

/// Reference to a remote object or container.
///
/// For the Drive backend `id` is the file/folder id; for the S3 backend it is
/// the full object key and `parent_id` the containing prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteHandle {
    pub id: String,
    pub parent_id: Option<String>,
    pub name: String,
}

impl RemoteHandle {
    pub fn new(id: impl Into<String>, parent_id: Option<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id,
            name: name.into(),
        }
    }
}

/// Remote store abstraction implemented by the archive (Drive) and object
/// (S3) backends. Authentication is established once per process and reused
/// for all calls.
///
/// The remote container is assumed exclusively owned by one running
/// instance; concurrent writers are last-write-wins with no detection.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Look up a single entry by name. `Ok(None)` means genuinely absent;
    /// any other failure is an error.
    async fn find_by_name(
        &self,
        parent: Option<&RemoteHandle>,
        name: &str,
    ) -> Result<Option<RemoteHandle>, SyncError>;

    /// Create a container (Drive folder, S3 prefix) under `parent`.
    async fn create_container(
        &self,
        name: &str,
        parent: Option<&RemoteHandle>,
    ) -> Result<RemoteHandle, SyncError>;

    /// Upsert a local file to the remote. Creates a new object when
    /// `existing` is `None`, otherwise updates that object in place so
    /// repeated pushes never duplicate it.
    async fn put(
        &self,
        local_path: &Path,
        remote_name: &str,
        parent: &RemoteHandle,
        existing: Option<&RemoteHandle>,
    ) -> Result<RemoteHandle, SyncError>;

    /// Stream a remote object's content to `dest`. Returns bytes written.
    async fn get(&self, handle: &RemoteHandle, dest: &Path) -> Result<u64, SyncError>;

    async fn delete(&self, handle: &RemoteHandle) -> Result<(), SyncError>;

    /// List the entries of a container. The archive backend lists a folder's
    /// direct children; the object backend lists every key under the prefix,
    /// with names relative to it.
    async fn list_container(
        &self,
        container: &RemoteHandle,
    ) -> Result<Vec<RemoteHandle>, SyncError>;
}

/// Cache of resolved handles keyed by logical path, so repeated pushes of the
/// same resource update in place instead of creating duplicates.
#[derive(Debug, Default)]
pub struct HandleCache {
    entries: HashMap<String, RemoteHandle>,
}

impl HandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, logical_path: &str) -> Option<&RemoteHandle> {
        self.entries.get(logical_path)
    }

    pub fn insert(&mut self, logical_path: impl Into<String>, handle: RemoteHandle) {
        self.entries.insert(logical_path.into(), handle);
    }
}
