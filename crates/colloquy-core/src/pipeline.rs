//! Turning user input into a completion request and applying the reply.
//!
//! The pipeline is driven by the event loop:
//!
//! 1. [`RequestPipeline::submit`] validates input synchronously and returns a
//!    [`PendingRequest`] to run off the loop (phase `Building`).
//! 2. The loop spawns [`PendingRequest::execute`] and calls
//!    [`RequestPipeline::mark_dispatched`] (phase `AwaitingResponse`).
//! 3. The task result goes to [`RequestPipeline::on_response`]. Failures
//!    return the pipeline to `Idle` without touching any state.
//! 4. On success the loop calls [`RequestPipeline::apply`] to extend the
//!    conversation window, persists the exchange with [`persist_exchange`],
//!    and calls [`RequestPipeline::finish`] once the write has completed.

use chrono::NaiveDateTime;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::api::{
    ChatContent, ChatMessage, ChatRole, CompletionProvider, CompletionRequest, ContentPart,
    ImageUrl, ModelInfo, ModelKind,
};
use crate::attachments::{self, FileAttachment};
use crate::config::Config;
use crate::error::{Error, PersistenceError, Result, ValidationError};
use crate::history::HistoryStore;
use crate::message::{Attachment, Message, Role, now_seconds};
use crate::upload::UploadService;
use crate::window::ConversationWindow;

/// Prompt used when the user sends images without any text.
pub const DEFAULT_IMAGE_PROMPT: &str = "What is in this image?";

/// Number of embedding components shown in an embedding reply.
const EMBEDDING_PREVIEW_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Building,
    AwaitingResponse,
    Applying,
    Failed,
}

/// Everything the user has staged for the next request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptInput {
    pub text: String,
    pub images: Vec<PathBuf>,
    pub image_url: Option<String>,
    pub file: Option<PathBuf>,
}

impl PromptInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn has_images(&self) -> bool {
        !self.images.is_empty() || self.image_url.is_some()
    }

    pub fn image_count(&self) -> usize {
        self.images.len() + usize::from(self.image_url.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && !self.has_images() && self.file.is_none()
    }
}

/// Request parameters taken from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSettings {
    pub system_prompt: String,
    pub temperature: f32,
    pub max_completion_tokens: u32,
    pub seed: u64,
    pub timeout: Duration,
}

impl From<&Config> for RequestSettings {
    fn from(config: &Config) -> Self {
        Self {
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
            max_completion_tokens: config.max_completion_tokens,
            seed: config.seed,
            timeout: config.request_timeout(),
        }
    }
}

/// Mark configured vision models in a provider model list.
pub fn classify_models(models: Vec<ModelInfo>, vision_models: &[String]) -> Vec<ModelInfo> {
    models
        .into_iter()
        .map(|mut model| {
            if model.kind == ModelKind::Chat && vision_models.contains(&model.id) {
                model.kind = ModelKind::Vision;
            }
            model
        })
        .collect()
}

#[derive(Debug)]
pub enum Submission {
    /// Nothing to send; no task should be started.
    Nothing,
    Dispatch(PendingRequest),
}

/// A validated request waiting to be executed off the event loop.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub request_id: Uuid,
    pub model: ModelInfo,
    pub prompt: String,
    pub images: Vec<PathBuf>,
    pub image_url: Option<Url>,
    pub file: Option<PathBuf>,
    pub context: Vec<ChatMessage>,
    pub settings: RequestSettings,
    pub submitted_at: NaiveDateTime,
}

/// The user message and the reply it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub request_id: Uuid,
    pub user: Message,
    pub assistant: Message,
}

impl Exchange {
    pub fn messages(&self) -> [Message; 2] {
        [self.user.clone(), self.assistant.clone()]
    }
}

impl PendingRequest {
    /// Prepare attachments, call the provider and build the exchange.
    /// Nothing here touches the conversation window or the history store.
    pub async fn execute(
        self,
        provider: &dyn CompletionProvider,
        uploader: Option<&dyn UploadService>,
    ) -> Result<Exchange> {
        let file = match &self.file {
            Some(path) => {
                let path = path.clone();
                Some(
                    tokio::task::spawn_blocking(move || attachments::read_file_attachment(&path))
                        .await
                        .map_err(|e| crate::error::AttachmentError::Task(e.to_string()))??,
                )
            }
            None => None,
        };

        if let Some(url) = &self.image_url {
            attachments::probe_image_url(url, self.settings.timeout).await?;
        }
        let prepared = attachments::prepare_images(self.images.clone()).await?;

        let attachment = self.message_attachment(uploader).await;
        let display_content = self.display_content(file.as_ref());

        let reply = if self.model.kind == ModelKind::Embedding {
            let vector = provider.embed(&self.model.id, &self.prompt).await?;
            let preview: Vec<f32> = vector.into_iter().take(EMBEDDING_PREVIEW_LEN).collect();
            format!("Embedding: {preview:?}...")
        } else {
            let mut image_urls: Vec<String> = Vec::with_capacity(prepared.len() + 1);
            if let Some(url) = &self.image_url {
                image_urls.push(url.to_string());
            }
            image_urls.extend(prepared.into_iter().map(|image| image.data_url));
            let request = self.completion_request(file.as_ref(), image_urls);
            provider.complete(&request, self.request_id).await?
        };

        let user = Message::new(Role::User, display_content, self.submitted_at, attachment)?;
        let assistant = Message::now(Role::Assistant, reply, None)?;
        info!(
            target: "colloquy::pipeline",
            request_id = %self.request_id,
            model = %self.model.id,
            "Request completed"
        );
        Ok(Exchange {
            request_id: self.request_id,
            user,
            assistant,
        })
    }

    /// Text recorded in history for the user turn.
    pub fn display_content(&self, file: Option<&FileAttachment>) -> String {
        let mut content = self.prompt.clone();
        let images = self.images.len() + usize::from(self.image_url.is_some());
        if images > 0 {
            content.push_str(&format!(" [Images: {images}]"));
        }
        if let Some(file) = file {
            content.push('\n');
            content.push_str(&attachments::fenced_block(file.language, &file.content));
        }
        content
    }

    fn completion_request(
        &self,
        file: Option<&FileAttachment>,
        image_urls: Vec<String>,
    ) -> CompletionRequest {
        let mut text = self.prompt.clone();
        if let Some(file) = file {
            text.push_str("\n\n");
            text.push_str(&attachments::fenced_block(file.language, &file.content));
        }

        let content = if image_urls.is_empty() {
            ChatContent::Text(text)
        } else {
            let mut parts = vec![ContentPart::Text { text }];
            parts.extend(image_urls.into_iter().map(|url| ContentPart::ImageUrl {
                image_url: ImageUrl { url },
            }));
            ChatContent::Parts(parts)
        };

        let mut messages = Vec::with_capacity(self.context.len() + 2);
        messages.push(ChatMessage {
            role: ChatRole::System,
            content: ChatContent::Text(self.settings.system_prompt.clone()),
        });
        messages.extend(self.context.iter().cloned());
        messages.push(ChatMessage {
            role: ChatRole::User,
            content,
        });

        CompletionRequest {
            model: self.model.id.clone(),
            messages,
            temperature: self.settings.temperature,
            max_completion_tokens: self.settings.max_completion_tokens,
            seed: self.settings.seed,
            user: None,
        }
    }

    /// Image reference recorded with the user message: the sidecar link for
    /// an uploaded local image, the local path when upload is unavailable,
    /// or the remote URL the user entered.
    async fn message_attachment(&self, uploader: Option<&dyn UploadService>) -> Option<Attachment> {
        if let Some(first) = self.images.first() {
            if let Some(uploader) = uploader {
                match uploader.upload(first).await {
                    Ok(uploaded) => match Url::parse(&uploaded.link) {
                        Ok(link) => return Some(Attachment::RemoteUrl(link)),
                        Err(e) => warn!(
                            target: "colloquy::pipeline",
                            "Upload server returned an invalid link {:?}: {}", uploaded.link, e
                        ),
                    },
                    Err(e) => warn!(
                        target: "colloquy::pipeline",
                        "Image upload failed, keeping local path: {}", e
                    ),
                }
            }
            return Some(Attachment::LocalPath(first.clone()));
        }
        self.image_url.clone().map(Attachment::RemoteUrl)
    }
}

/// Append both messages of an exchange to the history in one write.
pub fn persist_exchange(
    store: &HistoryStore,
    exchange: &Exchange,
) -> std::result::Result<(), PersistenceError> {
    store.append_all(&exchange.messages())
}

/// Request lifecycle and the busy flag.
#[derive(Debug)]
pub struct RequestPipeline {
    phase: Phase,
    settings: RequestSettings,
}

impl RequestPipeline {
    pub fn new(settings: RequestSettings) -> Self {
        Self {
            phase: Phase::Idle,
            settings,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn settings(&self) -> &RequestSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: RequestSettings) {
        self.settings = settings;
    }

    /// Validate `input` against `model` and build a pending request.
    pub fn submit(
        &mut self,
        input: PromptInput,
        model: Option<&ModelInfo>,
        window: &ConversationWindow,
    ) -> Result<Submission> {
        if self.is_busy() {
            return Err(Error::Busy);
        }
        if input.is_empty() {
            debug!(target: "colloquy::pipeline", "Empty submission ignored");
            return Ok(Submission::Nothing);
        }

        let pending = Self::validate(input, model, window, &self.settings)?;
        self.phase = Phase::Building;
        debug!(
            target: "colloquy::pipeline",
            request_id = %pending.request_id,
            model = %pending.model.id,
            images = pending.images.len(),
            "Request built"
        );
        Ok(Submission::Dispatch(pending))
    }

    fn validate(
        input: PromptInput,
        model: Option<&ModelInfo>,
        window: &ConversationWindow,
        settings: &RequestSettings,
    ) -> std::result::Result<PendingRequest, ValidationError> {
        let model = model.ok_or(ValidationError::NoModel)?.clone();
        attachments::outgoing::ensure_image_count(input.image_count())?;

        if let Some(file) = &input.file {
            attachments::file_language(file)?;
        }
        let image_url = input
            .image_url
            .as_deref()
            .map(attachments::validate_image_url)
            .transpose()?;

        let text = input.text.trim_end().to_string();
        let prompt = if model.kind == ModelKind::Embedding {
            if text.trim().is_empty() {
                return Err(ValidationError::EmptyEmbeddingInput);
            }
            text
        } else if text.trim().is_empty() && input.has_images() {
            if model.kind != ModelKind::Vision {
                return Err(ValidationError::UnsupportedInput { model: model.id });
            }
            DEFAULT_IMAGE_PROMPT.to_string()
        } else {
            text
        };

        Ok(PendingRequest {
            request_id: Uuid::new_v4(),
            model,
            prompt,
            images: input.images,
            image_url,
            file: input.file,
            context: window.to_request_messages(),
            settings: settings.clone(),
            submitted_at: now_seconds(),
        })
    }

    /// The pending request has been handed to a background task.
    pub fn mark_dispatched(&mut self) {
        if self.phase == Phase::Building {
            self.phase = Phase::AwaitingResponse;
        }
    }

    /// Record the task outcome. Errors leave the pipeline idle.
    pub fn on_response(&mut self, result: Result<Exchange>) -> Result<Exchange> {
        match result {
            Ok(exchange) => {
                self.phase = Phase::Applying;
                Ok(exchange)
            }
            Err(e) => {
                self.phase = Phase::Failed;
                warn!(target: "colloquy::pipeline", "Request failed: {}", e);
                self.phase = Phase::Idle;
                Err(e)
            }
        }
    }

    /// Add the exchange to the conversation window, user message first.
    pub fn apply(&mut self, exchange: &Exchange, window: &mut ConversationWindow) {
        window.append(exchange.user.clone());
        window.append(exchange.assistant.clone());
    }

    /// Apply the exchange to the window and write it to the store in one go.
    /// The persistence outcome is returned separately; the window keeps the
    /// messages either way.
    pub fn apply_exchange(
        &mut self,
        exchange: &Exchange,
        window: &mut ConversationWindow,
        store: &HistoryStore,
    ) -> std::result::Result<(), PersistenceError> {
        self.apply(exchange, window);
        persist_exchange(store, exchange)
    }

    /// The exchange has been applied and persisted.
    pub fn finish(&mut self) {
        self.phase = Phase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use async_trait::async_trait;
    use rstest::rstest;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct ScriptedProvider {
        calls: AtomicUsize,
        fail: bool,
        last_request: Mutex<Option<CompletionRequest>>,
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn complete(
            &self,
            request: &CompletionRequest,
            _request_id: Uuid,
        ) -> std::result::Result<String, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            if self.fail {
                Err(ApiError::Timeout {
                    provider: "scripted".into(),
                })
            } else {
                Ok("the reply".into())
            }
        }

        async fn list_models(&self) -> std::result::Result<Vec<ModelInfo>, ApiError> {
            Ok(vec![])
        }

        async fn embed(&self, _model: &str, _input: &str) -> std::result::Result<Vec<f32>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..12).map(|i| i as f32 * 0.5).collect())
        }
    }

    fn settings() -> RequestSettings {
        RequestSettings::from(&Config::default())
    }

    fn chat() -> ModelInfo {
        ModelInfo::new("chat-model", ModelKind::Chat)
    }

    fn vision() -> ModelInfo {
        ModelInfo::new("vision-model", ModelKind::Vision)
    }

    fn images(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("img{i}.png"))).collect()
    }

    fn dispatch(submission: Submission) -> PendingRequest {
        match submission {
            Submission::Dispatch(pending) => pending,
            Submission::Nothing => panic!("expected a dispatch"),
        }
    }

    #[test]
    fn empty_submission_starts_nothing() {
        let mut pipeline = RequestPipeline::new(settings());
        let window = ConversationWindow::default();
        let result = pipeline
            .submit(PromptInput::text("  \n "), Some(&chat()), &window)
            .unwrap();
        assert!(matches!(result, Submission::Nothing));
        assert!(!pipeline.is_busy());
    }

    #[rstest]
    #[case(10, true)]
    #[case(11, false)]
    fn image_limit_is_checked_before_dispatch(#[case] count: usize, #[case] accepted: bool) {
        let mut pipeline = RequestPipeline::new(settings());
        let input = PromptInput {
            text: "compare these".into(),
            images: images(count),
            ..PromptInput::default()
        };
        let result = pipeline.submit(input, Some(&vision()), &ConversationWindow::default());
        if accepted {
            assert!(matches!(result, Ok(Submission::Dispatch(_))));
            assert!(pipeline.is_busy());
        } else {
            assert!(matches!(
                result,
                Err(Error::Validation(ValidationError::TooManyAttachments {
                    count: 11,
                    max: 10
                }))
            ));
            assert!(!pipeline.is_busy());
        }
    }

    #[test]
    fn image_only_input_depends_on_model_kind() {
        let input = PromptInput {
            images: images(1),
            ..PromptInput::default()
        };
        let window = ConversationWindow::default();

        let mut pipeline = RequestPipeline::new(settings());
        let rejected = pipeline.submit(input.clone(), Some(&chat()), &window);
        assert!(matches!(
            rejected,
            Err(Error::Validation(ValidationError::UnsupportedInput { .. }))
        ));
        assert!(!pipeline.is_busy());

        let pending = dispatch(pipeline.submit(input, Some(&vision()), &window).unwrap());
        assert_eq!(pending.prompt, DEFAULT_IMAGE_PROMPT);
    }

    #[test]
    fn unsupported_file_and_bad_url_are_rejected() {
        let mut pipeline = RequestPipeline::new(settings());
        let window = ConversationWindow::default();
        let file = PromptInput {
            text: "look".into(),
            file: Some(PathBuf::from("main.rs")),
            ..PromptInput::default()
        };
        assert!(matches!(
            pipeline.submit(file, Some(&chat()), &window),
            Err(Error::Validation(ValidationError::UnsupportedFileType { .. }))
        ));

        let url = PromptInput {
            text: "look".into(),
            image_url: Some("not a url".into()),
            ..PromptInput::default()
        };
        assert!(matches!(
            pipeline.submit(url, Some(&vision()), &window),
            Err(Error::Validation(ValidationError::InvalidUrl(_)))
        ));
    }

    #[test]
    fn submit_while_busy_is_refused() {
        let mut pipeline = RequestPipeline::new(settings());
        let window = ConversationWindow::default();
        dispatch(
            pipeline
                .submit(PromptInput::text("one"), Some(&chat()), &window)
                .unwrap(),
        );
        pipeline.mark_dispatched();
        assert_eq!(pipeline.phase(), Phase::AwaitingResponse);
        assert!(matches!(
            pipeline.submit(PromptInput::text("two"), Some(&chat()), &window),
            Err(Error::Busy)
        ));
    }

    #[tokio::test]
    async fn successful_exchange_updates_window_then_store() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::open(dir.path().join("history.json"));
        let mut window = ConversationWindow::default();
        window.append(Message::now(Role::User, "earlier", None).unwrap());
        let provider = ScriptedProvider::default();
        let mut pipeline = RequestPipeline::new(settings());

        let pending = dispatch(
            pipeline
                .submit(PromptInput::text("hello"), Some(&chat()), &window)
                .unwrap(),
        );
        pipeline.mark_dispatched();
        let result = pending.execute(&provider, None).await;
        let exchange = pipeline.on_response(result).unwrap();
        assert_eq!(pipeline.phase(), Phase::Applying);

        pipeline
            .apply_exchange(&exchange, &mut window, &store)
            .unwrap();
        pipeline.finish();

        assert!(!pipeline.is_busy());
        let contents: Vec<_> = window.iter().map(|m| m.content().to_string()).collect();
        assert_eq!(contents, vec!["earlier", "hello", "the reply"]);
        let stored = store.load_all().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].role(), Role::User);
        assert_eq!(stored[1].content(), "the reply");

        let request = provider.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.messages[0].role, ChatRole::System);
        assert_eq!(
            request.messages[1].content,
            ChatContent::Text("earlier".into())
        );
        assert_eq!(request.messages.last().unwrap().content, ChatContent::Text("hello".into()));
    }

    #[tokio::test]
    async fn failed_write_keeps_exchange_in_window() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be read as a history document.
        let store = HistoryStore::open(dir.path());
        let mut window = ConversationWindow::default();
        let provider = ScriptedProvider::default();
        let mut pipeline = RequestPipeline::new(settings());

        let pending = dispatch(
            pipeline
                .submit(PromptInput::text("hello"), Some(&chat()), &window)
                .unwrap(),
        );
        let exchange = pipeline
            .on_response(pending.execute(&provider, None).await)
            .unwrap();
        assert!(
            pipeline
                .apply_exchange(&exchange, &mut window, &store)
                .is_err()
        );
        pipeline.finish();
        assert_eq!(window.len(), 2);
        assert!(!pipeline.is_busy());
    }

    #[tokio::test]
    async fn failed_request_mutates_nothing() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::open(dir.path().join("history.json"));
        let mut window = ConversationWindow::default();
        let provider = ScriptedProvider {
            fail: true,
            ..ScriptedProvider::default()
        };
        let mut pipeline = RequestPipeline::new(settings());

        let pending = dispatch(
            pipeline
                .submit(PromptInput::text("hello"), Some(&chat()), &window)
                .unwrap(),
        );
        pipeline.mark_dispatched();
        let result = pending.execute(&provider, None).await;
        assert!(matches!(
            pipeline.on_response(result),
            Err(Error::Api(ApiError::Timeout { .. }))
        ));

        assert_eq!(pipeline.phase(), Phase::Idle);
        assert!(window.is_empty());
        assert!(store.load_all().unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn file_content_is_appended_as_tagged_fence() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("script.py");
        std::fs::write(&script, "print('hi')\n").unwrap();
        let provider = ScriptedProvider::default();
        let mut pipeline = RequestPipeline::new(settings());

        let input = PromptInput {
            text: "explain".into(),
            file: Some(script),
            ..PromptInput::default()
        };
        let pending = dispatch(
            pipeline
                .submit(input, Some(&chat()), &ConversationWindow::default())
                .unwrap(),
        );
        let exchange = pending.execute(&provider, None).await.unwrap();

        assert_eq!(
            exchange.user.content(),
            "explain\n```python\nprint('hi')\n```"
        );
        let request = provider.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(
            request.messages.last().unwrap().content,
            ChatContent::Text("explain\n\n```python\nprint('hi')\n```".into())
        );
    }

    #[tokio::test]
    async fn embedding_models_reply_with_a_preview() {
        let provider = ScriptedProvider::default();
        let mut pipeline = RequestPipeline::new(settings());
        let model = ModelInfo::new("embed", ModelKind::Embedding);
        let pending = dispatch(
            pipeline
                .submit(PromptInput::text("vectorize me"), Some(&model), &ConversationWindow::default())
                .unwrap(),
        );
        let exchange = pending.execute(&provider, None).await.unwrap();
        assert_eq!(
            exchange.assistant.content(),
            "Embedding: [0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 4.5]..."
        );
    }

    #[test]
    fn vision_models_are_classified_from_config() {
        let models = vec![
            ModelInfo::new("a", ModelKind::Chat),
            ModelInfo::new("v", ModelKind::Chat),
            ModelInfo::new("e", ModelKind::Embedding),
        ];
        let classified = classify_models(models, &["v".to_string(), "e".to_string()]);
        let kinds: Vec<_> = classified.iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![ModelKind::Chat, ModelKind::Vision, ModelKind::Embedding]);
    }
}
