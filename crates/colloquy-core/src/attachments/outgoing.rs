//! Validation and encoding of images and files attached to an outgoing prompt.

use base64::{Engine, engine::general_purpose::STANDARD};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{AttachmentError, Result, ValidationError};

pub const SUPPORTED_IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];
pub const MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;
pub const MIN_IMAGE_SIDE: u32 = 512;
pub const MAX_IMAGE_SIDE: u32 = 4096;
pub const MAX_IMAGES_PER_REQUEST: usize = 10;

/// An image ready to be embedded in a completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    pub path: PathBuf,
    pub data_url: String,
}

/// A text file whose content is appended to the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    pub path: PathBuf,
    pub language: &'static str,
    pub content: String,
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub fn ensure_image_count(count: usize) -> std::result::Result<(), ValidationError> {
    if count > MAX_IMAGES_PER_REQUEST {
        return Err(ValidationError::TooManyAttachments {
            count,
            max: MAX_IMAGES_PER_REQUEST,
        });
    }
    Ok(())
}

/// Validate one image file (format, size, resolution) and encode it as a
/// base64 data URL. Blocking; run it off the event loop.
pub fn prepare_image(path: &Path) -> Result<PreparedImage> {
    let ext = extension(path);
    if !SUPPORTED_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ValidationError::UnsupportedImageFormat {
            path: path.to_path_buf(),
        }
        .into());
    }

    let size = std::fs::metadata(path)?.len();
    if size > MAX_IMAGE_BYTES {
        return Err(ValidationError::ImageTooLarge {
            path: path.to_path_buf(),
            size,
            max: MAX_IMAGE_BYTES,
        }
        .into());
    }

    let (width, height) = image::image_dimensions(path).map_err(|_| {
        ValidationError::UnsupportedImageFormat {
            path: path.to_path_buf(),
        }
    })?;
    let in_range = |side: u32| (MIN_IMAGE_SIDE..=MAX_IMAGE_SIDE).contains(&side);
    if !in_range(width) || !in_range(height) {
        return Err(ValidationError::ImageResolution {
            path: path.to_path_buf(),
            width,
            height,
            min: MIN_IMAGE_SIDE,
            max: MAX_IMAGE_SIDE,
        }
        .into());
    }

    let bytes = std::fs::read(path)?;
    debug!(
        target: "colloquy::attachments",
        path = %path.display(), width, height, size, "Image prepared"
    );
    Ok(PreparedImage {
        path: path.to_path_buf(),
        data_url: format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes)),
    })
}

/// Prepare a batch of images concurrently. The batch fails on the first
/// invalid image, and the count limit is checked before any file is read.
pub async fn prepare_images(paths: Vec<PathBuf>) -> Result<Vec<PreparedImage>> {
    ensure_image_count(paths.len())?;
    let jobs = paths.into_iter().map(|path| async move {
        tokio::task::spawn_blocking(move || prepare_image(&path))
            .await
            .map_err(|e| AttachmentError::Task(e.to_string()))?
    });
    futures::future::try_join_all(jobs).await
}

/// Map a file extension to the fence language used when the file is
/// inlined into a prompt.
pub fn file_language(path: &Path) -> std::result::Result<&'static str, ValidationError> {
    match extension(path).as_str() {
        "py" => Ok("python"),
        "txt" => Ok("text"),
        "json" => Ok("json"),
        other => Err(ValidationError::UnsupportedFileType {
            extension: other.to_string(),
        }),
    }
}

pub fn read_file_attachment(path: &Path) -> Result<FileAttachment> {
    let language = file_language(path)?;
    let content = std::fs::read_to_string(path)?;
    Ok(FileAttachment {
        path: path.to_path_buf(),
        language,
        content,
    })
}

pub fn fenced_block(language: &str, content: &str) -> String {
    format!("```{language}\n{}\n```", content.trim_end_matches('\n'))
}

/// Accept only absolute http(s) URLs with a host.
pub fn validate_image_url(raw: &str) -> std::result::Result<Url, ValidationError> {
    let url = Url::parse(raw.trim()).map_err(|_| ValidationError::InvalidUrl(raw.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none_or(str::is_empty) {
        return Err(ValidationError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

/// Check that a remote image answers a HEAD request with 200.
pub async fn probe_image_url(url: &Url, timeout: Duration) -> Result<()> {
    let unreachable = |details: String| ValidationError::UnreachableUrl {
        url: url.to_string(),
        details,
    };
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| unreachable(e.to_string()))?;
    let response = client
        .head(url.clone())
        .send()
        .await
        .map_err(|e| unreachable(e.to_string()))?;
    if response.status() != reqwest::StatusCode::OK {
        return Err(unreachable(format!("status {}", response.status())).into());
    }
    Ok(())
}
