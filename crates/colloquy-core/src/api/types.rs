//! Wire types for the OpenAI-compatible chat completion API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: ChatContent,
}

/// Message content: a plain string, or a list of text and image parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_completion_tokens: u32,
    pub seed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Chat,
    Vision,
    Embedding,
}

impl ModelKind {
    pub fn label(self) -> &'static str {
        match self {
            ModelKind::Chat => "Chat",
            ModelKind::Vision => "Vision",
            ModelKind::Embedding => "Embedding",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub kind: ModelKind,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>, kind: ModelKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionResponseBody {
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionChoice {
    pub message: CompletionChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelListBody {
    #[serde(default)]
    pub data: Vec<ModelListEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelListEntry {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct EmbeddingRequest<'a> {
    pub model: &'a str,
    pub input: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddingResponseBody {
    pub data: Vec<EmbeddingEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddingEntry {
    pub embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_to_provider_shape() {
        let request = CompletionRequest {
            model: "m".into(),
            messages: vec![
                ChatMessage {
                    role: ChatRole::System,
                    content: ChatContent::Text("be brief".into()),
                },
                ChatMessage {
                    role: ChatRole::User,
                    content: ChatContent::Parts(vec![
                        ContentPart::Text {
                            text: "what?".into(),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: "data:image/jpeg;base64,AAAA".into(),
                            },
                        },
                    ]),
                },
            ],
            temperature: 0.5,
            max_completion_tokens: 2000,
            seed: 42,
            user: None,
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "m",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": [
                        {"type": "text", "text": "what?"},
                        {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,AAAA"}}
                    ]}
                ],
                "temperature": 0.5,
                "max_completion_tokens": 2000,
                "seed": 42
            })
        );
    }
}
