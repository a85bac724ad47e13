//! Persistent chat history stored as a single JSON array.
//!
//! The document is always rewritten whole: every mutation reads the current
//! array, applies the change in memory and replaces the file through a
//! temporary sibling that is renamed over the original. A document that
//! cannot be read or parsed aborts the call; nothing is partially applied.

use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, error, warn};

use crate::error::PersistenceError;
use crate::message::{Message, StoredMessage};

type Result<T> = std::result::Result<T, PersistenceError>;

/// Compute the `[start, end)` slice of a history of `total` messages that
/// holds page `page`, counting pages backwards from the newest message.
pub fn page_bounds(total: usize, page_size: usize, page: usize) -> (usize, usize) {
    let start = total.saturating_sub(page_size.saturating_mul(page + 1));
    let end = total.saturating_sub(page_size.saturating_mul(page));
    (start, end)
}

/// One page read from the store together with its bounds.
#[derive(Debug, Clone)]
pub struct PageSlice {
    pub start: usize,
    pub end: usize,
    pub total: usize,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every message. A missing or blank file is an empty history.
    pub fn load_all(&self) -> Result<Vec<Message>> {
        read_document(&self.path)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.load_all()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn append_and_persist(&self, message: &Message) -> Result<()> {
        self.append_all(std::slice::from_ref(message))
    }

    /// Append several messages with a single rewrite, preserving their order.
    pub fn append_all(&self, messages: &[Message]) -> Result<()> {
        let mut all = self.load_all()?;
        all.extend_from_slice(messages);
        self.write_document(&all)?;
        debug!(
            target: "colloquy::history",
            appended = messages.len(),
            total = all.len(),
            "History appended"
        );
        Ok(())
    }

    /// The last `n` messages in chronological order.
    pub fn read_tail(&self, n: usize) -> Result<Vec<Message>> {
        let mut all = self.load_all()?;
        let start = all.len().saturating_sub(n);
        Ok(all.split_off(start))
    }

    /// Messages in `[start, end)`, clamped to the history length.
    pub fn read_slice(&self, start: usize, end: usize) -> Result<Vec<Message>> {
        let all = self.load_all()?;
        let end = end.min(all.len());
        let start = start.min(end);
        Ok(all[start..end].to_vec())
    }

    pub fn read_page(&self, page_size: usize, page: usize) -> Result<PageSlice> {
        let all = self.load_all()?;
        let total = all.len();
        let (start, end) = page_bounds(total, page_size, page);
        Ok(PageSlice {
            start,
            end,
            total,
            messages: all[start..end].to_vec(),
        })
    }

    /// Replace the whole document. Used by clear and import.
    pub fn overwrite(&self, messages: &[Message]) -> Result<()> {
        self.write_document(messages)
    }

    /// Write the full history to another file ("save as"). Returns the
    /// number of messages written.
    pub fn export_to(&self, destination: &Path) -> Result<usize> {
        let all = self.load_all()?;
        write_document(destination, &all)?;
        Ok(all.len())
    }

    /// Replace this history with the contents of another history document.
    pub fn import_from(&self, source: &Path) -> Result<Vec<Message>> {
        let imported = read_document(source)?;
        self.write_document(&imported)?;
        Ok(imported)
    }

    fn write_document(&self, messages: &[Message]) -> Result<()> {
        write_document(&self.path, messages)
    }
}

fn read_document(path: &Path) -> Result<Vec<Message>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            error!(target: "colloquy::history", "Failed to read {}: {}", path.display(), source);
            return Err(PersistenceError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let records: Vec<StoredMessage> = serde_json::from_str(&raw).map_err(|source| {
        error!(
            target: "colloquy::history",
            "History document {} is malformed: {}", path.display(), source
        );
        PersistenceError::Parse {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let mut messages = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        match Message::try_from(record) {
            Ok(message) => messages.push(message),
            Err(e) => warn!(
                target: "colloquy::history",
                index, "Skipping invalid history record: {}", e
            ),
        }
    }
    Ok(messages)
}

fn write_document(path: &Path, messages: &[Message]) -> Result<()> {
    let write_err = |source: io::Error| {
        error!(target: "colloquy::history", "Failed to write {}: {}", path.display(), source);
        PersistenceError::Write {
            path: path.to_path_buf(),
            source,
        }
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(write_err)?;

    let records: Vec<StoredMessage> = messages.iter().map(StoredMessage::from).collect();
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    records.serialize(&mut serializer)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(&buf).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
