// Core colloquy functionality without UI dependencies

pub mod api;
pub mod attachments;
pub mod config;
pub mod error;
pub mod history;
pub mod message;
pub mod pipeline;
pub mod secrets;
pub mod transcript;
pub mod upload;
pub mod utils;
pub mod window;

pub use config::Config;
pub use error::{Error, Result};
pub use history::HistoryStore;
pub use message::{Attachment, Message, Role};
pub use pipeline::{Exchange, PromptInput, RequestPipeline, Submission};
pub use window::ConversationWindow;
