use async_trait::async_trait;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{CompletionRequest, ModelInfo};

/// Remote model endpoint used by the request pipeline.
#[async_trait]
pub trait CompletionProvider: Send + Sync + 'static {
    /// Get the name of the provider
    fn name(&self) -> &'static str;

    /// Run a chat completion and return the text of the first choice.
    async fn complete(
        &self,
        request: &CompletionRequest,
        request_id: Uuid,
    ) -> Result<String, ApiError>;

    /// List chat and embedding models. Vision models are classified by the
    /// caller from configuration.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ApiError>;

    async fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, ApiError>;
}
