pub mod error;
pub mod openai;
pub mod provider;
pub mod types;

pub use error::ApiError;
pub use openai::OpenAiCompatibleClient;
pub use provider::CompletionProvider;
pub use types::{
    ChatContent, ChatMessage, ChatRole, CompletionRequest, ContentPart, ImageUrl, ModelInfo,
    ModelKind,
};
