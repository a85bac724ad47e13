//! Error types for the colloquy-tui crate

use std::io;
use thiserror::Error;

/// Result type alias for colloquy-tui operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Terminal I/O errors
    #[error("Terminal I/O error: {0}")]
    Io(#[from] io::Error),

    /// Channel communication errors
    #[error("Channel error: {0}")]
    Channel(String),

    /// Core errors from colloquy-core
    #[error(transparent)]
    Core(#[from] colloquy_core::error::Error),

    /// TUI command parsing errors
    #[error("Command error: {0}")]
    Command(#[from] crate::tui::commands::CommandError),
}
