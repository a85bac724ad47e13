//! Images and files attached to messages, both outgoing and displayed.

pub mod outgoing;
pub mod thumbnail;

pub use outgoing::{
    FileAttachment, MAX_IMAGES_PER_REQUEST, PreparedImage, fenced_block, file_language,
    prepare_images, probe_image_url, read_file_attachment, validate_image_url,
};
pub use thumbnail::{THUMBNAIL_MAX_SIDE, Thumbnail, ThumbnailLoader};
