//! `RemoteStore` over an S3 bucket: containers are key prefixes, objects are
//! plain keys. Prefixes have no remote existence of their own, so creating a
//! container just synthesizes a handle.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use cachesync_core::{ProgressReporter, RemoteHandle, RemoteStore, SyncError};

#[derive(Clone)]
pub struct BucketStore {
    s3_client: S3Client,
    bucket_name: String,
}

impl BucketStore {
    pub fn new(s3_client: S3Client, bucket_name: String) -> Self {
        Self {
            s3_client,
            bucket_name,
        }
    }

    fn join_key(parent: Option<&RemoteHandle>, name: &str) -> String {
        match parent {
            Some(p) if !p.id.is_empty() => format!("{}/{}", p.id, name),
            _ => name.to_string(),
        }
    }

    /// List every key under a prefix, following continuation tokens.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, SyncError> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .s3_client
                .list_objects_v2()
                .bucket(&self.bucket_name)
                .prefix(prefix);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let output = request.send().await.map_err(|e| {
                SyncError::RemoteLookup(format!("S3 list error under {prefix}: {e}"))
            })?;

            for object in output.contents() {
                if let Some(key) = object.key() {
                    keys.push(key.to_string());
                }
            }

            match output.next_continuation_token {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        debug!("listed {} key(s) under {prefix}", keys.len());
        Ok(keys)
    }
}

#[async_trait]
impl RemoteStore for BucketStore {
    #[instrument(skip(self), level = "debug")]
    async fn find_by_name(
        &self,
        parent: Option<&RemoteHandle>,
        name: &str,
    ) -> Result<Option<RemoteHandle>, SyncError> {
        let key = Self::join_key(parent, name);

        let head = self
            .s3_client
            .head_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await;
        match head {
            Ok(_) => {
                return Ok(Some(RemoteHandle::new(
                    key,
                    parent.map(|p| p.id.clone()),
                    name,
                )))
            }
            Err(e) => {
                let service_error = e.into_service_error();
                if !service_error.is_not_found() {
                    return Err(SyncError::RemoteLookup(format!(
                        "S3 head error for {key}: {service_error}"
                    )));
                }
            }
        }

        // No object with that exact key; it may still exist as a prefix.
        let probe = format!("{key}/");
        let output = self
            .s3_client
            .list_objects_v2()
            .bucket(&self.bucket_name)
            .prefix(&probe)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| SyncError::RemoteLookup(format!("S3 list error under {probe}: {e}")))?;

        if output.key_count().unwrap_or(0) > 0 {
            Ok(Some(RemoteHandle::new(
                key,
                parent.map(|p| p.id.clone()),
                name,
            )))
        } else {
            Ok(None)
        }
    }

    async fn create_container(
        &self,
        name: &str,
        parent: Option<&RemoteHandle>,
    ) -> Result<RemoteHandle, SyncError> {
        // Prefixes spring into existence with their first object.
        Ok(RemoteHandle::new(
            Self::join_key(parent, name),
            parent.map(|p| p.id.clone()),
            name,
        ))
    }

    #[instrument(skip(self, local_path, existing), level = "debug")]
    async fn put(
        &self,
        local_path: &Path,
        remote_name: &str,
        parent: &RemoteHandle,
        existing: Option<&RemoteHandle>,
    ) -> Result<RemoteHandle, SyncError> {
        // put_object upserts, so an existing handle just pins the key.
        let key = match existing {
            Some(handle) => handle.id.clone(),
            None => Self::join_key(Some(parent), remote_name),
        };

        let len = tokio::fs::metadata(local_path).await?.len();
        let body = ByteStream::from_path(local_path).await.map_err(|e| {
            SyncError::Io(format!("cannot read {}: {e}", local_path.display()))
        })?;

        self.s3_client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .body(body)
            .send()
            .await
            .map_err(|e| SyncError::Transfer(format!("S3 put error for {key}: {e}")))?;

        let mut progress = ProgressReporter::new(format!("uploading {key}"), Some(len));
        progress.record(len);

        Ok(RemoteHandle::new(
            key,
            Some(parent.id.clone()),
            remote_name,
        ))
    }

    #[instrument(skip(self, dest), level = "debug")]
    async fn get(&self, handle: &RemoteHandle, dest: &Path) -> Result<u64, SyncError> {
        let output = self
            .s3_client
            .get_object()
            .bucket(&self.bucket_name)
            .key(&handle.id)
            .send()
            .await
            .map_err(|e| SyncError::Transfer(format!("S3 get error for {}: {e}", handle.id)))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;
        let total = output.content_length().and_then(|n| u64::try_from(n).ok());
        let mut progress = ProgressReporter::new(format!("downloading {}", handle.id), total);

        let mut body = output.body;
        while let Some(chunk) = body.try_next().await.map_err(|e| {
            SyncError::Transfer(format!("S3 body stream error for {}: {e}", handle.id))
        })? {
            file.write_all(&chunk).await?;
            progress.record(chunk.len() as u64);
        }
        file.flush().await?;
        progress.finish();
        Ok(progress.transferred())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, handle: &RemoteHandle) -> Result<(), SyncError> {
        self.s3_client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(&handle.id)
            .send()
            .await
            .map_err(|e| SyncError::Transfer(format!("S3 delete error for {}: {e}", handle.id)))?;
        Ok(())
    }

    async fn list_container(
        &self,
        container: &RemoteHandle,
    ) -> Result<Vec<RemoteHandle>, SyncError> {
        let prefix = if container.id.is_empty() {
            String::new()
        } else {
            format!("{}/", container.id)
        };
        let keys = self.list_keys(&prefix).await?;
        Ok(keys
            .into_iter()
            .map(|key| {
                let name = key.strip_prefix(&prefix).unwrap_or(&key).to_string();
                RemoteHandle::new(key, Some(container.id.clone()), name)
            })
            .collect())
    }
}
