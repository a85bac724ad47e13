//! Client for the local image-hosting sidecar.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Upload server unavailable at {url} after {attempts} attempts: {details}")]
    Unavailable {
        url: String,
        attempts: u32,
        details: String,
    },

    #[error("Upload server request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Upload server returned {status_code}: {details}")]
    Status { status_code: u16, details: String },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid upload server URL: {0}")]
    InvalidUrl(String),
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedImage {
    pub image_id: String,
    pub link: String,
}

#[async_trait]
pub trait UploadService: Send + Sync + 'static {
    async fn health(&self) -> Result<(), UploadError>;

    async fn upload(&self, path: &Path) -> Result<UploadedImage, UploadError>;

    async fn delete(&self, image_id: &str) -> Result<(), UploadError>;

    /// Base URL under which uploaded files are served.
    fn uploads_prefix(&self) -> String;
}

/// Retry policy for the startup health check.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Probe `service` until it reports healthy or the policy is exhausted.
pub async fn connect_with_retry<S: UploadService + ?Sized>(
    service: &S,
    policy: RetryPolicy,
) -> Result<(), UploadError> {
    let attempts = policy.attempts.max(1);
    let mut last_error = String::new();
    for attempt in 1..=attempts {
        match service.health().await {
            Ok(()) => {
                info!(target: "colloquy::upload", attempt, "Upload server is healthy");
                return Ok(());
            }
            Err(e) => {
                warn!(target: "colloquy::upload", attempt, "Upload server health check failed: {}", e);
                last_error = e.to_string();
                if attempt < attempts {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
        }
    }
    Err(UploadError::Unavailable {
        url: service.uploads_prefix(),
        attempts,
        details: last_error,
    })
}

#[derive(Clone)]
pub struct HttpUploadClient {
    http_client: reqwest::Client,
    base_url: Url,
}

impl HttpUploadClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UploadError> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| UploadError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, UploadError> {
        self.base_url
            .join(path)
            .map_err(|e| UploadError::InvalidUrl(format!("{path}: {e}")))
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, UploadError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let details = response.text().await.unwrap_or_default();
            Err(UploadError::Status {
                status_code: status.as_u16(),
                details,
            })
        }
    }
}

#[async_trait]
impl UploadService for HttpUploadClient {
    async fn health(&self) -> Result<(), UploadError> {
        let response = self.http_client.get(self.endpoint("health")?).send().await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn upload(&self, path: &Path) -> Result<UploadedImage, UploadError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| UploadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str("image/jpeg")?;
        let form = reqwest::multipart::Form::new().part("image", part);

        let response = self
            .http_client
            .post(self.endpoint("upload")?)
            .multipart(form)
            .send()
            .await?;
        let uploaded: UploadedImage = Self::ensure_success(response).await?.json().await?;
        info!(target: "colloquy::upload", file = %file_name, link = %uploaded.link, "Image uploaded");
        Ok(uploaded)
    }

    async fn delete(&self, image_id: &str) -> Result<(), UploadError> {
        let response = self
            .http_client
            .delete(self.endpoint(&format!("delete/{image_id}"))?)
            .send()
            .await?;
        Self::ensure_success(response).await?;
        debug!(target: "colloquy::upload", image_id, "Image deleted");
        Ok(())
    }

    fn uploads_prefix(&self) -> String {
        format!("{}uploads/", self.base_url)
    }
}

/// If `link` points into the sidecar's `/uploads/` directory, return the
/// uploaded file name (which doubles as its image id).
pub fn hosted_image_id(uploads_prefix: &str, link: &str) -> Option<String> {
    let name = link.strip_prefix(uploads_prefix)?;
    (!name.is_empty() && !name.contains('/')).then(|| name.to_string())
}
