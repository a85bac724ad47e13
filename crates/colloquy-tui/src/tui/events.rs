//! Results of background work, delivered to the event loop.

use colloquy_core::api::{ApiError, ModelInfo};
use colloquy_core::attachments::Thumbnail;
use colloquy_core::error::{AttachmentError, PersistenceError};
use colloquy_core::history::PageSlice;
use colloquy_core::message::Message;
use colloquy_core::pipeline::Exchange;
use colloquy_core::upload::UploadError;
use std::path::PathBuf;

use crate::tui::message_view::ViewId;

/// History read at startup: the first page for display and the tail that
/// seeds the conversation window.
#[derive(Debug, Clone)]
pub struct InitialHistory {
    pub total: usize,
    pub page: Vec<Message>,
    pub tail: Vec<Message>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Transcript,
    SaveAs,
}

#[derive(Debug)]
pub enum TaskEvent {
    /// Results tagged with a history generation are dropped when the
    /// history was cleared or replaced after the read started.
    InitialHistory {
        generation: u64,
        result: Result<InitialHistory, PersistenceError>,
    },
    ModelsLoaded(Result<Vec<ModelInfo>, ApiError>),
    UploadServer(Result<(), UploadError>),
    ResponseReady(Box<colloquy_core::Result<Exchange>>),
    ExchangePersisted(Result<(), PersistenceError>),
    PageLoaded {
        generation: u64,
        result: Result<PageSlice, PersistenceError>,
    },
    ThumbnailLoaded {
        view_id: ViewId,
        result: Result<Thumbnail, AttachmentError>,
    },
    /// Ids of sidecar-hosted images that the cleared history referenced.
    HistoryCleared(Result<Vec<String>, PersistenceError>),
    FileWritten {
        operation: FileOperation,
        result: colloquy_core::Result<(PathBuf, usize)>,
    },
    Imported(Result<Vec<Message>, PersistenceError>),
}
