use async_trait::async_trait;
use reqwest::{self, header};
use std::time::Duration;
use tracing::{debug, error};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::provider::CompletionProvider;
use crate::api::types::{
    CompletionRequest, CompletionResponseBody, EmbeddingRequest, EmbeddingResponseBody,
    ModelInfo, ModelKind, ModelListBody,
};

const PROVIDER_NAME: &str = "openai-compatible";
const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Client for any endpoint speaking the OpenAI chat completions dialect.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl OpenAiCompatibleClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        let auth = header::HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| ApiError::Configuration(format!("Invalid API key format: {e}")))?;
        headers.insert(header::AUTHORIZATION, auth);

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn read_success_body(response: reqwest::Response) -> Result<String, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(
                target: "openai::chat",
                "API error status={} body={}", status, body
            );
            return Err(ApiError::ServerError {
                provider: PROVIDER_NAME.to_string(),
                status_code: status.as_u16(),
                details: body,
            });
        }
        response
            .text()
            .await
            .map_err(|e| ApiError::from_reqwest(PROVIDER_NAME, e))
    }

    fn parse<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, ApiError> {
        serde_json::from_str(body).map_err(|e| {
            error!(
                target: "openai::chat",
                "Failed to parse response: {} body={}", e, body
            );
            ApiError::ResponseParsingError {
                provider: PROVIDER_NAME.to_string(),
                details: e.to_string(),
            }
        })
    }

    async fn fetch_model_ids(&self, path: &str) -> Result<Vec<String>, ApiError> {
        let response = self
            .http_client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(PROVIDER_NAME, e))?;
        let body = Self::read_success_body(response).await?;
        let parsed: ModelListBody = Self::parse(&body)?;
        Ok(parsed.data.into_iter().map(|entry| entry.id).collect())
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleClient {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        request_id: Uuid,
    ) -> Result<String, ApiError> {
        debug!(
            target: "openai::chat",
            %request_id,
            model = %request.model,
            messages = request.messages.len(),
            "Sending completion request"
        );

        let response = self
            .http_client
            .post(self.url("chat/completions"))
            .header(REQUEST_ID_HEADER, request_id.to_string())
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(PROVIDER_NAME, e))?;

        let body = Self::read_success_body(response).await?;
        let parsed: CompletionResponseBody = Self::parse(&body)?;

        let choice = parsed.choices.into_iter().next().ok_or(ApiError::NoChoices {
            provider: PROVIDER_NAME.to_string(),
        })?;
        let content = choice
            .message
            .content
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ApiError::ResponseParsingError {
                provider: PROVIDER_NAME.to_string(),
                details: "Response message has no content".to_string(),
            })?;

        debug!(target: "openai::chat", %request_id, chars = content.len(), "Completion received");
        Ok(content)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ApiError> {
        let mut models: Vec<ModelInfo> = self
            .fetch_model_ids("models")
            .await?
            .into_iter()
            .map(|id| ModelInfo::new(id, ModelKind::Chat))
            .collect();

        // Not every deployment exposes embedding models.
        match self.fetch_model_ids("embedding-models").await {
            Ok(ids) => models.extend(
                ids.into_iter()
                    .map(|id| ModelInfo::new(id, ModelKind::Embedding)),
            ),
            Err(e) => debug!(target: "openai::models", "Embedding model list unavailable: {}", e),
        }
        Ok(models)
    }

    async fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, ApiError> {
        let response = self
            .http_client
            .post(self.url("embeddings"))
            .json(&EmbeddingRequest { model, input })
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(PROVIDER_NAME, e))?;
        let body = Self::read_success_body(response).await?;
        let parsed: EmbeddingResponseBody = Self::parse(&body)?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .ok_or(ApiError::NoChoices {
                provider: PROVIDER_NAME.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{ChatContent, ChatMessage, ChatRole};
    use axum::Router;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    #[derive(Clone, Default)]
    struct Captured {
        headers: Arc<Mutex<Option<HeaderMap>>>,
        body: Arc<Mutex<Option<Value>>>,
    }

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(base_url: &str) -> OpenAiCompatibleClient {
        OpenAiCompatibleClient::new("sk-test", base_url, Duration::from_secs(5)).unwrap()
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "test-model".into(),
            messages: vec![ChatMessage {
                role: ChatRole::User,
                content: ChatContent::Text("hi".into()),
            }],
            temperature: 0.7,
            max_completion_tokens: 2000,
            seed: 42,
            user: None,
        }
    }

    #[tokio::test]
    async fn complete_sends_auth_and_request_id() {
        let captured = Captured::default();
        let app = Router::new()
            .route(
                "/chat/completions",
                post(
                    |State(c): State<Captured>, headers: HeaderMap, body: axum::Json<Value>| async move {
                        *c.headers.lock().unwrap() = Some(headers);
                        *c.body.lock().unwrap() = Some(body.0);
                        axum::Json(json!({"choices": [{"message": {"role": "assistant", "content": "hello there"}}]}))
                    },
                ),
            )
            .with_state(captured.clone());
        let base = serve(app).await;

        let id = Uuid::new_v4();
        let reply = client(&base).complete(&request(), id).await.unwrap();
        assert_eq!(reply, "hello there");

        let headers = captured.headers.lock().unwrap().clone().unwrap();
        assert_eq!(headers["authorization"], "Bearer sk-test");
        assert_eq!(headers["x-request-id"], id.to_string().as_str());
        let body = captured.body.lock().unwrap().clone().unwrap();
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["max_completion_tokens"], 2000);
        assert_eq!(body["seed"], 42);
    }

    #[tokio::test]
    async fn non_success_status_is_server_error() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let base = serve(app).await;

        let err = client(&base)
            .complete(&request(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::ServerError { status_code: 429, ref details, .. } if details == "slow down"
        ));
    }

    #[tokio::test]
    async fn missing_choices_or_content_is_an_error() {
        let app = Router::new()
            .route(
                "/a/chat/completions",
                post(|| async { axum::Json(json!({"choices": []})) }),
            )
            .route(
                "/b/chat/completions",
                post(|| async { axum::Json(json!({"choices": [{"message": {}}]})) }),
            )
            .route(
                "/c/chat/completions",
                post(|| async { axum::Json(json!({"result": "?"})) }),
            );
        let base = serve(app).await;

        let no_choices = client(&format!("{base}/a"))
            .complete(&request(), Uuid::new_v4())
            .await;
        assert!(matches!(no_choices, Err(ApiError::NoChoices { .. })));

        let no_content = client(&format!("{base}/b"))
            .complete(&request(), Uuid::new_v4())
            .await;
        assert!(matches!(
            no_content,
            Err(ApiError::ResponseParsingError { .. })
        ));

        let wrong_shape = client(&format!("{base}/c"))
            .complete(&request(), Uuid::new_v4())
            .await;
        assert!(matches!(
            wrong_shape,
            Err(ApiError::ResponseParsingError { .. })
        ));
    }

    #[tokio::test]
    async fn list_models_merges_chat_and_embedding_lists() {
        let app = Router::new()
            .route(
                "/models",
                get(|| async { axum::Json(json!({"data": [{"id": "chat-a"}, {"id": "chat-b"}]})) }),
            )
            .route(
                "/embedding-models",
                get(|| async { axum::Json(json!({"data": [{"id": "embed-a"}]})) }),
            );
        let base = serve(app).await;

        let models = client(&base).list_models().await.unwrap();
        assert_eq!(
            models,
            vec![
                ModelInfo::new("chat-a", ModelKind::Chat),
                ModelInfo::new("chat-b", ModelKind::Chat),
                ModelInfo::new("embed-a", ModelKind::Embedding),
            ]
        );
    }

    #[tokio::test]
    async fn embed_returns_first_vector() {
        let app = Router::new().route(
            "/embeddings",
            post(|| async { axum::Json(json!({"data": [{"embedding": [0.5, -1.0, 2.0]}]})) }),
        );
        let base = serve(app).await;

        let vector = client(&base).embed("embed-a", "text").await.unwrap();
        assert_eq!(vector, vec![0.5, -1.0, 2.0]);
    }
}
