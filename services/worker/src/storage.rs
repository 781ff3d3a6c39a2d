//! Object storage collaborator: the storage REST API in production, a map in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tokio::sync::Mutex;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn download(&self, bucket: &str, path: &str) -> Result<Bytes>;

    async fn upload(&self, bucket: &str, path: &str, body: Bytes, content_type: &str) -> Result<()>;

    async fn create_signed_url(&self, bucket: &str, path: &str, ttl: Duration) -> Result<String>;

    /// Fetches a URL produced by [`ObjectStore::create_signed_url`].
    async fn download_signed(&self, url: &str) -> Result<Bytes>;
}

pub struct HttpObjectStore {
    base_url: String,
    service_key: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

impl HttpObjectStore {
    /// `base_url` points at the storage API root, e.g. `https://<project>/storage/v1`.
    pub fn new(base_url: &str, service_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/object/{}/{}", self.base_url, bucket, path.trim_start_matches('/'))
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn read_body(resp: reqwest::Response, what: &str) -> Result<Bytes> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("{what}: HTTP {status}: {body}");
        }
        resp.bytes().await.with_context(|| format!("{what}: reading body"))
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn download(&self, bucket: &str, path: &str) -> Result<Bytes> {
        let what = format!("storage download {bucket}/{path}");
        let resp = self
            .authed(self.client.get(self.object_url(bucket, path)))
            .send()
            .await
            .with_context(|| what.clone())?;
        Self::read_body(resp, &what).await
    }

    async fn upload(&self, bucket: &str, path: &str, body: Bytes, content_type: &str) -> Result<()> {
        let what = format!("storage upload {bucket}/{path}");
        let resp = self
            .authed(self.client.post(self.object_url(bucket, path)))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(body)
            .send()
            .await
            .with_context(|| what.clone())?;
        Self::read_body(resp, &what).await?;
        Ok(())
    }

    async fn create_signed_url(&self, bucket: &str, path: &str, ttl: Duration) -> Result<String> {
        let what = format!("storage sign {bucket}/{path}");
        let url = format!("{}/object/sign/{}/{}", self.base_url, bucket, path.trim_start_matches('/'));
        let resp = self
            .authed(self.client.post(url))
            .json(&serde_json::json!({ "expiresIn": ttl.as_secs() }))
            .send()
            .await
            .with_context(|| what.clone())?;
        let body = Self::read_body(resp, &what).await?;
        let signed: SignedUrlResponse = serde_json::from_slice(&body).with_context(|| format!("{what}: bad response"))?;

        if signed.signed_url.starts_with("http://") || signed.signed_url.starts_with("https://") {
            Ok(signed.signed_url)
        } else {
            Ok(format!("{}/{}", self.base_url, signed.signed_url.trim_start_matches('/')))
        }
    }

    async fn download_signed(&self, url: &str) -> Result<Bytes> {
        let resp = self.client.get(url).send().await.context("signed download")?;
        Self::read_body(resp, "signed download").await
    }
}

const MEMORY_SCHEME: &str = "memory://";

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
}

/// Map-backed store for tests. Failure switches simulate an unreachable backend.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<HashMap<(String, String), StoredObject>>>,
    fail_uploads: Arc<AtomicBool>,
    fail_direct_downloads: Arc<AtomicBool>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, bucket: &str, path: &str, body: impl Into<Bytes>) {
        self.objects.lock().await.insert(
            (bucket.to_string(), path.to_string()),
            StoredObject {
                body: body.into(),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    pub async fn get(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .await
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    pub fn fail_uploads(&self, on: bool) {
        self.fail_uploads.store(on, Ordering::SeqCst);
    }

    /// Direct downloads fail; signed URLs keep working.
    pub fn fail_direct_downloads(&self, on: bool) {
        self.fail_direct_downloads.store(on, Ordering::SeqCst);
    }

    async fn fetch(&self, bucket: &str, path: &str) -> Result<Bytes> {
        match self.get(bucket, path).await {
            Some(obj) => Ok(obj.body),
            None => bail!("object not found: {bucket}/{path}"),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn download(&self, bucket: &str, path: &str) -> Result<Bytes> {
        if self.fail_direct_downloads.load(Ordering::SeqCst) {
            bail!("storage download {bucket}/{path}: unavailable");
        }
        self.fetch(bucket, path).await
    }

    async fn upload(&self, bucket: &str, path: &str, body: Bytes, content_type: &str) -> Result<()> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            bail!("storage upload {bucket}/{path}: unavailable");
        }
        self.objects.lock().await.insert(
            (bucket.to_string(), path.to_string()),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn create_signed_url(&self, bucket: &str, path: &str, ttl: Duration) -> Result<String> {
        Ok(format!("{MEMORY_SCHEME}{bucket}/{path}?expires_in={}", ttl.as_secs()))
    }

    async fn download_signed(&self, url: &str) -> Result<Bytes> {
        let rest = url
            .strip_prefix(MEMORY_SCHEME)
            .with_context(|| format!("not a memory url: {url}"))?;
        let rest = rest.split('?').next().unwrap_or(rest);
        let (bucket, path) = rest
            .split_once('/')
            .with_context(|| format!("memory url has no object path: {url}"))?;
        self.fetch(bucket, path).await
    }
}
