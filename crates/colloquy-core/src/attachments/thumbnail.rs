//! Loading message images for display.

use image::{DynamicImage, GenericImageView, ImageReader};
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use crate::error::AttachmentError;
use crate::message::Attachment;

pub const THUMBNAIL_MAX_SIDE: u32 = 200;

/// A decoded image scaled into the thumbnail envelope.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub source: String,
    pub image: DynamicImage,
}

impl Thumbnail {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Resolves an attachment to image bytes and produces a bounded thumbnail.
///
/// Links under the upload sidecar's `/uploads/` prefix are read straight
/// from the local upload directory instead of going over the network.
#[derive(Clone)]
pub struct ThumbnailLoader {
    http_client: reqwest::Client,
    uploads_prefix: String,
    upload_dir: PathBuf,
}

impl ThumbnailLoader {
    pub fn new(
        uploads_prefix: impl Into<String>,
        upload_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, AttachmentError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AttachmentError::Fetch {
                url: String::new(),
                details: e.to_string(),
            })?;
        Ok(Self {
            http_client,
            uploads_prefix: uploads_prefix.into(),
            upload_dir: upload_dir.into(),
        })
    }

    pub async fn load(&self, attachment: &Attachment) -> Result<Thumbnail, AttachmentError> {
        let result = match attachment {
            Attachment::LocalPath(path) => self.load_path(path.clone()).await,
            Attachment::RemoteUrl(url) => self.load_url(url).await,
        };
        if let Err(e) = &result {
            error!(target: "colloquy::attachments", source = %attachment, "Image load failed: {}", e);
        }
        result
    }

    fn resolve_hosted(&self, url: &Url) -> Option<PathBuf> {
        let name = url.as_str().strip_prefix(&self.uploads_prefix)?;
        (!name.is_empty() && !name.contains('/')).then(|| self.upload_dir.join(name))
    }

    async fn load_path(&self, path: PathBuf) -> Result<Thumbnail, AttachmentError> {
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(AttachmentError::Missing(path));
        }
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| AttachmentError::Read {
                path: path.clone(),
                source,
            })?;
        decode_thumbnail(path.display().to_string(), bytes).await
    }

    async fn load_url(&self, url: &Url) -> Result<Thumbnail, AttachmentError> {
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(AttachmentError::InvalidUrl(url.to_string()));
        }
        if let Some(local) = self.resolve_hosted(url) {
            debug!(target: "colloquy::attachments", %url, path = %local.display(), "Resolved hosted image locally");
            return self.load_path(local).await;
        }

        let fetch_err = |details: String| AttachmentError::Fetch {
            url: url.to_string(),
            details,
        };
        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fetch_err(format!("status {}", response.status())));
        }
        let bytes = response.bytes().await.map_err(|e| fetch_err(e.to_string()))?;
        decode_thumbnail(url.to_string(), bytes.to_vec()).await
    }
}

async fn decode_thumbnail(source: String, bytes: Vec<u8>) -> Result<Thumbnail, AttachmentError> {
    tokio::task::spawn_blocking(move || -> Result<Thumbnail, AttachmentError> {
        let image = scale_to_thumbnail(decode(&bytes)?);
        Ok(Thumbnail { source, image })
    })
    .await
    .map_err(|e| AttachmentError::Task(e.to_string()))?
}

fn decode(bytes: &[u8]) -> Result<DynamicImage, AttachmentError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| AttachmentError::Decode(image::ImageError::IoError(e)))?;
    Ok(reader.decode()?)
}

/// Downscale into the thumbnail envelope, preserving aspect ratio. Images
/// already inside the envelope are left untouched.
pub fn scale_to_thumbnail(image: DynamicImage) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= THUMBNAIL_MAX_SIDE && height <= THUMBNAIL_MAX_SIDE {
        image
    } else {
        image.thumbnail(THUMBNAIL_MAX_SIDE, THUMBNAIL_MAX_SIDE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::path::Path;
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::new(width, height);
        img.save(path).unwrap();
    }

    fn loader(dir: &TempDir) -> ThumbnailLoader {
        ThumbnailLoader::new(
            "http://localhost:5000/uploads/",
            dir.path(),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[test]
    fn thumbnails_fit_the_envelope() {
        let wide = scale_to_thumbnail(DynamicImage::new_rgb8(800, 400));
        assert_eq!(wide.dimensions(), (200, 100));
        let small = scale_to_thumbnail(DynamicImage::new_rgb8(50, 80));
        assert_eq!(small.dimensions(), (50, 80));
    }

    #[tokio::test]
    async fn hosted_links_resolve_to_upload_dir() {
        let dir = TempDir::new().unwrap();
        write_png(&dir.path().join("cat.png"), 600, 300);
        let url = Url::parse("http://localhost:5000/uploads/cat.png").unwrap();

        let thumb = loader(&dir)
            .load(&Attachment::RemoteUrl(url))
            .await
            .unwrap();
        assert_eq!(thumb.dimensions(), (200, 100));
    }

    #[tokio::test]
    async fn missing_and_corrupt_files_are_attachment_errors() {
        let dir = TempDir::new().unwrap();
        let missing = loader(&dir)
            .load(&Attachment::LocalPath(dir.path().join("gone.png")))
            .await;
        assert!(matches!(missing, Err(AttachmentError::Missing(_))));

        let garbage = dir.path().join("garbage.png");
        std::fs::write(&garbage, b"definitely not an image").unwrap();
        let corrupt = loader(&dir)
            .load(&Attachment::LocalPath(garbage))
            .await;
        assert!(matches!(corrupt, Err(AttachmentError::Decode(_))));
    }
}
