use async_trait::async_trait;
use colloquy_core::api::{ApiError, CompletionProvider, CompletionRequest, ModelInfo, ModelKind};
use colloquy_core::config::Config;
use colloquy_core::pipeline::{PromptInput, RequestSettings, Submission};
use colloquy_core::{ConversationWindow, HistoryStore, RequestPipeline, Role};
use std::sync::Mutex;
use tempfile::TempDir;
use uuid::Uuid;

/// Replies with the number of messages it was sent and records each request.
#[derive(Default)]
struct CountingProvider {
    seen: Mutex<Vec<usize>>,
}

#[async_trait]
impl CompletionProvider for CountingProvider {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        _request_id: Uuid,
    ) -> Result<String, ApiError> {
        self.seen.lock().unwrap().push(request.messages.len());
        Ok(format!("reply to {} messages", request.messages.len()))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ApiError> {
        Ok(Vec::new())
    }

    async fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, ApiError> {
        Ok(input.bytes().map(f32::from).collect())
    }
}

async fn send(
    pipeline: &mut RequestPipeline,
    window: &mut ConversationWindow,
    store: &HistoryStore,
    provider: &CountingProvider,
    model: &ModelInfo,
    text: &str,
) {
    let Submission::Dispatch(pending) = pipeline
        .submit(PromptInput::text(text), Some(model), window)
        .unwrap()
    else {
        unreachable!("non-empty text always dispatches");
    };
    pipeline.mark_dispatched();
    let result = pending.execute(provider, None).await;
    let exchange = pipeline.on_response(result).unwrap();
    pipeline.apply_exchange(&exchange, window, store).unwrap();
    pipeline.finish();
}

#[tokio::test]
async fn exchanges_flow_into_window_and_history() {
    let dir = TempDir::new().unwrap();
    let store = HistoryStore::open(dir.path().join("history.json"));
    let config = Config {
        window_capacity: 4,
        ..Config::default()
    };
    let mut window = ConversationWindow::new(config.window_capacity);
    let mut pipeline = RequestPipeline::new(RequestSettings::from(&config));
    let provider = CountingProvider::default();
    let model = ModelInfo::new("chat", ModelKind::Chat);

    for text in ["one", "two", "three"] {
        send(&mut pipeline, &mut window, &store, &provider, &model, text).await;
    }

    // System prompt, the windowed context, then the new user turn.
    assert_eq!(*provider.seen.lock().unwrap(), vec![2, 4, 6]);
    assert_eq!(window.len(), 4);
    assert_eq!(window.iter().next().unwrap().content(), "two");

    let history = store.load_all().unwrap();
    assert_eq!(history.len(), 6);
    assert_eq!(history[4].content(), "three");
    assert_eq!(history[5].role(), Role::Assistant);
    assert!(!pipeline.is_busy());

    // A fresh session seeds its window from the tail of the same history.
    let mut reopened = ConversationWindow::new(config.window_capacity);
    reopened.rebuild(HistoryStore::open(store.path()).read_tail(config.window_capacity).unwrap());
    let contents: Vec<_> = reopened.iter().map(|m| m.content().to_string()).collect();
    assert_eq!(contents[0], "two");
    assert_eq!(contents[2], "three");
}

#[tokio::test]
async fn embedding_models_reply_with_a_vector_preview() {
    let dir = TempDir::new().unwrap();
    let store = HistoryStore::open(dir.path().join("history.json"));
    let config = Config::default();
    let mut window = ConversationWindow::new(config.window_capacity);
    let mut pipeline = RequestPipeline::new(RequestSettings::from(&config));
    let provider = CountingProvider::default();
    let model = ModelInfo::new("bge", ModelKind::Embedding);

    send(&mut pipeline, &mut window, &store, &provider, &model, "AB").await;

    let history = store.load_all().unwrap();
    assert_eq!(history[1].content(), "Embedding: [65.0, 66.0]...");
    assert!(provider.seen.lock().unwrap().is_empty());
}
