use std::path::PathBuf;
use thiserror::Error;

use crate::api::ApiError;
use crate::secrets::SecretError;
use crate::upload::UploadError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Attachment(#[from] AttachmentError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Secret(#[from] SecretError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("A request is already in progress")]
    Busy,
}

/// Input rejected before any network call is made.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message must have text or an attachment")]
    EmptyMessage,

    #[error("Unknown message role: {0}")]
    UnknownRole(String),

    #[error("Model {model} does not accept image-only input")]
    UnsupportedInput { model: String },

    #[error("At most {max} images per request (got {count})")]
    TooManyAttachments { count: usize, max: usize },

    #[error("Unsupported file type: {extension}")]
    UnsupportedFileType { extension: String },

    #[error("Unsupported image format: {}", path.display())]
    UnsupportedImageFormat { path: PathBuf },

    #[error("Image {} is {size} bytes, the limit is {max}", path.display())]
    ImageTooLarge { path: PathBuf, size: u64, max: u64 },

    #[error("Image {} has resolution {width}x{height}, expected between {min}x{min} and {max}x{max}", path.display())]
    ImageResolution {
        path: PathBuf,
        width: u32,
        height: u32,
        min: u32,
        max: u32,
    },

    #[error("Invalid image URL: {0}")]
    InvalidUrl(String),

    #[error("Image URL {url} is not reachable: {details}")]
    UnreachableUrl { url: String, details: String },

    #[error("Enter text to embed")]
    EmptyEmbeddingInput,

    #[error("No model selected")]
    NoModel,
}

/// Failure reading or writing the history document.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to read history from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("History document {} is malformed: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write history to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failure resolving or decoding an image attached to a message.
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("Image not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid image URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to fetch {url}: {details}")]
    Fetch { url: String, details: String },

    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Image worker failed: {0}")]
    Task(String),
}
