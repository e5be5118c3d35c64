//! `RemoteStore` over the Drive API: folders are containers, files are
//! objects. Name lookups resolve shortcuts to the entry they point at, so a
//! shared folder linked into the service account's Drive works transparently.

use std::path::Path;

use async_trait::async_trait;

use cachesync_core::{RemoteHandle, RemoteStore, SyncError};

use crate::drive::DriveClient;
use crate::token::TokenProvider;

pub struct DriveStore {
    client: DriveClient,
    tokens: TokenProvider,
}

impl DriveStore {
    pub fn new(client: DriveClient, tokens: TokenProvider) -> Self {
        Self { client, tokens }
    }
}

/// Escape a name for embedding in a `files.list` query literal.
fn escape_query_name(name: &str) -> String {
    name.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
impl RemoteStore for DriveStore {
    async fn find_by_name(
        &self,
        parent: Option<&RemoteHandle>,
        name: &str,
    ) -> Result<Option<RemoteHandle>, SyncError> {
        let token = self.tokens.get_token().await?;
        let mut query = format!(
            "name = '{}' and trashed = false",
            escape_query_name(name)
        );
        if let Some(parent) = parent {
            query.push_str(&format!(" and '{}' in parents", parent.id));
        }

        let files = self.client.list(&token, &query).await?;
        Ok(files.into_iter().next().map(|file| {
            let id = file.effective_id().to_string();
            RemoteHandle::new(id, parent.map(|p| p.id.clone()), file.name)
        }))
    }

    async fn create_container(
        &self,
        name: &str,
        parent: Option<&RemoteHandle>,
    ) -> Result<RemoteHandle, SyncError> {
        let token = self.tokens.get_token().await?;
        let folder = self
            .client
            .create_folder(&token, name, parent.map(|p| p.id.as_str()))
            .await?;
        Ok(RemoteHandle::new(
            folder.id,
            parent.map(|p| p.id.clone()),
            folder.name,
        ))
    }

    async fn put(
        &self,
        local_path: &Path,
        remote_name: &str,
        parent: &RemoteHandle,
        existing: Option<&RemoteHandle>,
    ) -> Result<RemoteHandle, SyncError> {
        let token = self.tokens.get_token().await?;
        let mime = mime_guess::from_path(local_path).first_or_octet_stream();
        match existing {
            Some(handle) => {
                self.client
                    .update_file(&token, &handle.id, mime.essence_str(), local_path)
                    .await?;
                Ok(handle.clone())
            }
            None => {
                let file = self
                    .client
                    .create_file(&token, remote_name, &parent.id, mime.essence_str(), local_path)
                    .await?;
                Ok(RemoteHandle::new(
                    file.id,
                    Some(parent.id.clone()),
                    file.name,
                ))
            }
        }
    }

    async fn get(&self, handle: &RemoteHandle, dest: &Path) -> Result<u64, SyncError> {
        let token = self.tokens.get_token().await?;
        self.client.download(&token, &handle.id, dest).await
    }

    async fn delete(&self, handle: &RemoteHandle) -> Result<(), SyncError> {
        let token = self.tokens.get_token().await?;
        self.client.delete(&token, &handle.id).await
    }

    async fn list_container(
        &self,
        container: &RemoteHandle,
    ) -> Result<Vec<RemoteHandle>, SyncError> {
        let token = self.tokens.get_token().await?;
        let query = format!("'{}' in parents and trashed = false", container.id);
        let files = self.client.list(&token, &query).await?;
        Ok(files
            .into_iter()
            .map(|file| {
                let id = file.effective_id().to_string();
                RemoteHandle::new(id, Some(container.id.clone()), file.name)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::DriveClient;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> DriveStore {
        DriveStore::new(
            DriveClient::with_base_urls(&server.uri(), &server.uri()),
            TokenProvider::with_static_token("tok"),
        )
    }

    #[test]
    fn names_are_escaped_for_queries() {
        assert_eq!(escape_query_name("cache.tar.gz"), "cache.tar.gz");
        assert_eq!(escape_query_name("it's"), "it\\'s");
    }

    #[tokio::test]
    async fn absent_name_is_none_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "files": [] })),
            )
            .mount(&server)
            .await;

        let found = store_for(&server).find_by_name(None, "missing").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn find_by_name_resolves_shortcuts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [{
                    "id": "shortcut-1",
                    "name": "site-cache",
                    "shortcutDetails": { "targetId": "folder-1" }
                }]
            })))
            .mount(&server)
            .await;

        let found = store_for(&server)
            .find_by_name(None, "site-cache")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, "folder-1");
        assert_eq!(found.name, "site-cache");
    }

    #[tokio::test]
    async fn put_with_existing_handle_updates_in_place() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/files/file-1"))
            .and(query_param("uploadType", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let payload = dir.path().join("cache.tar.gz");
        std::fs::write(&payload, b"bytes").unwrap();

        let folder = RemoteHandle::new("folder-1", None, "site-cache");
        let existing = RemoteHandle::new("file-1", Some("folder-1".into()), "cache.tar.gz");
        let handle = store_for(&server)
            .put(&payload, "cache.tar.gz", &folder, Some(&existing))
            .await
            .unwrap();
        // The handle is stable across updates, so no duplicate is created.
        assert_eq!(handle, existing);
    }

    #[tokio::test]
    async fn put_without_existing_creates_a_new_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files"))
            .and(query_param("uploadType", "multipart"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "file-2",
                "name": "cache.tar.gz"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let payload = dir.path().join("cache.tar.gz");
        std::fs::write(&payload, b"bytes").unwrap();

        let folder = RemoteHandle::new("folder-1", None, "site-cache");
        let handle = store_for(&server)
            .put(&payload, "cache.tar.gz", &folder, None)
            .await
            .unwrap();
        assert_eq!(handle.id, "file-2");
        assert_eq!(handle.parent_id.as_deref(), Some("folder-1"));
    }
}
