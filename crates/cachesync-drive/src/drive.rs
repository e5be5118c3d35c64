//! Google Drive API v3 client wrapper.
//!
//! Token is passed per-call by the caller (`TokenProvider` resolves it).
//! Uploads and downloads stream file content with periodic progress logging.

use std::path::Path;

use reqwest::Client;
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, instrument};

use cachesync_core::{ProgressReporter, SyncError};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/drive/v3";
const DEFAULT_UPLOAD_BASE_URL: &str = "https://www.googleapis.com/upload/drive/v3";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

const UPLOAD_CHUNK: usize = 64 * 1024;

/// Cache archives can be large; transfers get minutes, not the default.
const TRANSFER_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(300);

/// Metadata returned by the Drive API. Shortcuts carry the id of the entry
/// they point at.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub shortcut_details: Option<ShortcutDetails>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortcutDetails {
    pub target_id: String,
}

impl DriveFile {
    /// The id to operate on: a shortcut resolves to its target.
    pub fn effective_id(&self) -> &str {
        match &self.shortcut_details {
            Some(details) => &details.target_id,
            None => &self.id,
        }
    }
}

/// Google Drive API client (stateless, token provided per-call).
pub struct DriveClient {
    http: Client,
    base_url: String,
    upload_base_url: String,
}

impl DriveClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            upload_base_url: DEFAULT_UPLOAD_BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_urls(base_url: &str, upload_base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.to_string(),
            upload_base_url: upload_base_url.to_string(),
        }
    }

    /// Run a `files.list` query, following page tokens.
    #[instrument(skip(self, token), level = "debug")]
    pub async fn list(&self, token: &str, query: &str) -> Result<Vec<DriveFile>, SyncError> {
        let url = format!("{}/files", self.base_url);
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http.get(&url).bearer_auth(token).query(&[
                ("q", query),
                ("fields", "nextPageToken,files(id,name,shortcutDetails)"),
                ("pageSize", "1000"),
            ]);
            if let Some(t) = &page_token {
                request = request.query(&[("pageToken", t.as_str())]);
            }

            let resp = request
                .send()
                .await
                .map_err(|e| SyncError::RemoteLookup(format!("list request failed: {e}")))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(SyncError::RemoteLookup(format!(
                    "Drive list error {status}: {body}"
                )));
            }

            #[derive(Deserialize)]
            #[serde(rename_all = "camelCase")]
            struct FileList {
                #[serde(default)]
                next_page_token: Option<String>,
                #[serde(default)]
                files: Vec<DriveFile>,
            }

            let page: FileList = resp
                .json()
                .await
                .map_err(|e| SyncError::RemoteLookup(format!("malformed list response: {e}")))?;
            files.extend(page.files);
            match page.next_page_token {
                Some(t) => page_token = Some(t),
                None => break,
            }
        }

        debug!("query matched {} file(s)", files.len());
        Ok(files)
    }

    /// Create a folder, optionally under a parent folder.
    #[instrument(skip(self, token), level = "debug")]
    pub async fn create_folder(
        &self,
        token: &str,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<DriveFile, SyncError> {
        let mut metadata = serde_json::json!({ "name": name, "mimeType": FOLDER_MIME });
        if let Some(parent) = parent_id {
            metadata["parents"] = serde_json::json!([parent]);
        }

        let url = format!("{}/files?fields=id,name", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&metadata)
            .send()
            .await
            .map_err(|e| SyncError::Transfer(format!("folder create request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Transfer(format!(
                "Drive folder create error {status}: {body}"
            )));
        }

        resp.json()
            .await
            .map_err(|e| SyncError::Transfer(format!("malformed folder create response: {e}")))
    }

    /// Upload a new file under `parent_id`, streaming the content.
    #[instrument(skip(self, token, local_path), level = "debug")]
    pub async fn create_file(
        &self,
        token: &str,
        name: &str,
        parent_id: &str,
        mime: &str,
        local_path: &Path,
    ) -> Result<DriveFile, SyncError> {
        let metadata = serde_json::json!({ "name": name, "parents": [parent_id] });
        let (body, len) = streamed_body(local_path, format!("uploading {name}")).await?;

        let metadata_part = reqwest::multipart::Part::text(metadata.to_string())
            .mime_str("application/json")
            .map_err(|e| SyncError::Transfer(format!("bad metadata part: {e}")))?;
        let media_part = reqwest::multipart::Part::stream_with_length(body, len)
            .mime_str(mime)
            .map_err(|e| SyncError::Transfer(format!("bad media part: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .part("metadata", metadata_part)
            .part("media", media_part);

        let url = format!(
            "{}/files?uploadType=multipart&fields=id,name",
            self.upload_base_url
        );
        let resp = self
            .http
            .post(&url)
            .timeout(TRANSFER_TIMEOUT)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SyncError::Transfer(format!("upload request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Transfer(format!(
                "Drive upload error {status}: {body}"
            )));
        }

        let file: DriveFile = resp
            .json()
            .await
            .map_err(|e| SyncError::Transfer(format!("malformed upload response: {e}")))?;
        debug!("uploaded {} as file {}", name, file.id);
        Ok(file)
    }

    /// Replace an existing file's content in place, streaming the upload.
    #[instrument(skip(self, token, local_path), level = "debug")]
    pub async fn update_file(
        &self,
        token: &str,
        file_id: &str,
        mime: &str,
        local_path: &Path,
    ) -> Result<(), SyncError> {
        let (body, len) = streamed_body(local_path, format!("uploading {file_id}")).await?;

        let url = format!(
            "{}/files/{}?uploadType=media",
            self.upload_base_url, file_id
        );
        let resp = self
            .http
            .patch(&url)
            .timeout(TRANSFER_TIMEOUT)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, mime)
            .body(body)
            .send()
            .await
            .map_err(|e| SyncError::Transfer(format!("update request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Transfer(format!(
                "Drive update error {status}: {body}"
            )));
        }

        debug!("updated file {} ({} bytes)", file_id, len);
        Ok(())
    }

    /// Stream a file's content to `dest`. Returns the bytes written.
    #[instrument(skip(self, token, dest), level = "debug")]
    pub async fn download(
        &self,
        token: &str,
        file_id: &str,
        dest: &Path,
    ) -> Result<u64, SyncError> {
        let url = format!("{}/files/{}?alt=media", self.base_url, file_id);
        let mut resp = self
            .http
            .get(&url)
            .timeout(TRANSFER_TIMEOUT)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SyncError::Transfer(format!("download request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Transfer(format!(
                "Drive download error {status}: {body}"
            )));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;
        let mut progress =
            ProgressReporter::new(format!("downloading {file_id}"), resp.content_length());
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| SyncError::Transfer(format!("download stream failed: {e}")))?
        {
            file.write_all(&chunk).await?;
            progress.record(chunk.len() as u64);
        }
        file.flush().await?;
        progress.finish();
        Ok(progress.transferred())
    }

    /// Delete a file. An already-absent file is not an error.
    #[instrument(skip(self, token), level = "debug")]
    pub async fn delete(&self, token: &str, file_id: &str) -> Result<(), SyncError> {
        let url = format!("{}/files/{}", self.base_url, file_id);
        let resp = self
            .http
            .delete(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SyncError::Transfer(format!("delete request failed: {e}")))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Transfer(format!(
                "Drive delete error {status}: {body}"
            )));
        }
        Ok(())
    }
}

/// Read `path` as a chunked request body, ticking progress per chunk.
async fn streamed_body(path: &Path, label: String) -> Result<(reqwest::Body, u64), SyncError> {
    let file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();
    let progress = ProgressReporter::new(label, Some(len));

    let stream = futures::stream::try_unfold(
        (file, progress),
        |(mut file, mut progress)| async move {
            let mut buf = vec![0u8; UPLOAD_CHUNK];
            let n = file.read(&mut buf).await?;
            if n == 0 {
                progress.finish();
                Ok::<_, std::io::Error>(None)
            } else {
                buf.truncate(n);
                progress.record(n as u64);
                Ok(Some((buf, (file, progress))))
            }
        },
    );
    Ok((reqwest::Body::wrap_stream(stream), len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn shortcut_resolves_to_its_target() {
        let plain = DriveFile {
            id: "f1".into(),
            name: "cache.tar.gz".into(),
            shortcut_details: None,
        };
        assert_eq!(plain.effective_id(), "f1");

        let shortcut = DriveFile {
            id: "sc1".into(),
            name: "cache.tar.gz".into(),
            shortcut_details: Some(ShortcutDetails {
                target_id: "real1".into(),
            }),
        };
        assert_eq!(shortcut.effective_id(), "real1");
    }

    #[tokio::test]
    async fn list_follows_page_tokens() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/files"))
            .and(query_param("pageToken", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [{"id": "f2", "name": "b"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "nextPageToken": "page2",
                "files": [{"id": "f1", "name": "a"}]
            })))
            .mount(&server)
            .await;

        let client = DriveClient::with_base_urls(&server.uri(), &server.uri());
        let files = client.list("tok", "trashed = false").await.unwrap();
        assert_eq!(
            files.iter().map(|f| f.id.as_str()).collect::<Vec<_>>(),
            vec!["f1", "f2"]
        );
    }

    #[tokio::test]
    async fn list_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(403).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = DriveClient::with_base_urls(&server.uri(), &server.uri());
        let err = client.list("tok", "trashed = false").await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteLookup(_)));
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn download_writes_the_body_to_dest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/f9"))
            .and(query_param("alt", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("nested/cache.tar.gz");
        let client = DriveClient::with_base_urls(&server.uri(), &server.uri());
        let written = client.download("tok", "f9", &dest).await.unwrap();
        assert_eq!(written, 7);
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn delete_treats_absent_file_as_done() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/files/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = DriveClient::with_base_urls(&server.uri(), &server.uri());
        client.delete("tok", "gone").await.unwrap();
    }
}
