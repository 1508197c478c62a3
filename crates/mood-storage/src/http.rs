use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use mood_types::remote::{ObjectHandle, ObjectPath, ObjectStorage};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};
use url::Url;

/// Client for a token-based REST object store (`/v0/b/<bucket>/o/...`).
///
/// Uploads stream the staged file straight from disk. Download URLs carry the
/// object's access token, e.g.
/// `<endpoint>/v0/b/<bucket>/o/reactions%2F<owner>%2F<emoji>%2F<name>?alt=media&token=<t>`.
pub struct HttpObjectStorage {
    client: Client,
    endpoint: Url,
    bucket: String,
    auth_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    name: String,
    #[serde(default)]
    download_tokens: Option<String>,
}

impl ObjectMetadata {
    /// The service may return several comma-separated tokens; any works.
    fn first_token(&self) -> Option<String> {
        self.download_tokens
            .as_deref()
            .and_then(|t| t.split(',').map(str::trim).find(|t| !t.is_empty()))
            .map(str::to_string)
    }
}

impl HttpObjectStorage {
    pub fn new(endpoint: Url, bucket: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            bucket: bucket.into(),
            auth_token,
        }
    }

    fn bucket_url(&self, trailing: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Endpoint {} cannot carry a path", self.endpoint))?
            .pop_if_empty()
            .extend(["v0", "b", self.bucket.as_str(), "o"])
            .extend(trailing);
        Ok(url)
    }

    fn upload_url(&self, path: &ObjectPath) -> Result<Url> {
        let mut url = self.bucket_url(&[])?;
        url.query_pairs_mut().append_pair("name", &path.to_string());
        Ok(url)
    }

    /// Metadata URL; the whole object name is a single, escaped segment.
    fn object_url(&self, path: &ObjectPath) -> Result<Url> {
        self.bucket_url(&[path.to_string().as_str()])
    }

    fn media_url(&self, path: &ObjectPath, token: &str) -> Result<Url> {
        let mut url = self.object_url(path)?;
        url.query_pairs_mut()
            .append_pair("alt", "media")
            .append_pair("token", token);
        Ok(url)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => req.header("Authorization", format!("Bearer {}", token)),
            None => req,
        }
    }

    async fn metadata(&self, path: &ObjectPath) -> Result<ObjectMetadata> {
        let resp = self
            .authorize(self.client.get(self.object_url(path)?))
            .send()
            .await
            .map_err(|e| anyhow!("Metadata request failed: {}", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Metadata request failed ({}): {}", status, body);
        }
        Ok(resp.json().await?)
    }
}

fn content_type(name: &str) -> &'static str {
    let ext = name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        _ => "application/octet-stream",
    }
}

impl ObjectStorage for HttpObjectStorage {
    async fn put(&self, path: &ObjectPath, local: &Path) -> Result<ObjectHandle> {
        if !path.is_safe() {
            bail!("Refusing to upload to unsafe path {}", path);
        }

        let file = tokio::fs::File::open(local)
            .await
            .with_context(|| format!("Cannot open {} for upload", local.display()))?;
        let size = file.metadata().await?.len();
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        let resp = self
            .authorize(self.client.post(self.upload_url(path)?))
            .header("Content-Type", content_type(&path.name))
            .header("Content-Length", size.to_string())
            .body(body)
            .send()
            .await
            .map_err(|e| anyhow!("Upload failed: {}", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Upload failed ({}): {}", status, body);
        }

        let meta: ObjectMetadata = resp.json().await?;
        info!("Uploaded {} ({} bytes) as {}", path, size, meta.name);
        Ok(ObjectHandle {
            path: path.clone(),
            token: meta.first_token(),
        })
    }

    async fn download_url(&self, handle: &ObjectHandle) -> Result<String> {
        let token = match &handle.token {
            Some(token) => token.clone(),
            None => {
                debug!("No token on handle for {}, fetching metadata", handle.path);
                self.metadata(&handle.path)
                    .await?
                    .first_token()
                    .ok_or_else(|| anyhow!("Object {} has no download token", handle.path))?
            }
        };
        Ok(self.media_url(&handle.path, &token)?.to_string())
    }
}
