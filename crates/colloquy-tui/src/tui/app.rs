//! Application state and the handlers the event loop drives.
//!
//! [`App`] owns every piece of UI state: the chat viewport, pagination, the
//! conversation window, the request pipeline and the composer. Handlers run
//! on the event loop only; anything slow is spawned and reports back through
//! the [`TaskEvent`] channel.

use colloquy_core::api::{CompletionProvider, ModelInfo, ModelKind};
use colloquy_core::attachments::ThumbnailLoader;
use colloquy_core::config::{Config, ThemeName};
use colloquy_core::history::{HistoryStore, page_bounds};
use colloquy_core::message::{Attachment, Message};
use colloquy_core::pipeline::{
    PendingRequest, RequestPipeline, RequestSettings, Submission, classify_models,
    persist_exchange,
};
use colloquy_core::transcript::export_transcript;
use colloquy_core::upload::{RetryPolicy, UploadService, connect_with_retry, hosted_image_id};
use colloquy_core::window::ConversationWindow;
use ratatui::Frame;
use ratatui::crossterm::event::{
    KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::tui::chat_viewport::{ChatViewport, ViewportHit};
use crate::tui::commands::{SlashCommand, ThemeChoice, help_lines};
use crate::tui::events::{FileOperation, InitialHistory, TaskEvent};
use crate::tui::height::FontMetrics;
use crate::tui::input::{InputPanel, InputState};
use crate::tui::message_view::{AttachmentOutcome, MessageView};
use crate::tui::pagination::PaginationController;
use crate::tui::status_bar::{StatusBar, StatusMessage};
use crate::tui::theme::{Component, Theme};

const MOUSE_SCROLL_ROWS: usize = 3;

const KEY_BINDINGS: [&str; 11] = [
    "Enter              send",
    "Alt/Shift+Enter    new line",
    "PgUp/PgDn, wheel   scroll (scrolling past the top loads more)",
    "Ctrl+Home/End      jump to top/bottom",
    "Ctrl+Up/Down       move focus between messages",
    "Ctrl+E, click      expand or collapse message",
    "Ctrl+S             select focused message",
    "Ctrl+A             select all",
    "Esc                clear selection and focus",
    "Ctrl+T             toggle theme",
    "Ctrl+C             quit",
];

/// External services the app talks to.
#[derive(Clone)]
pub struct Services {
    pub provider: Arc<dyn CompletionProvider>,
    pub uploader: Option<Arc<dyn UploadService>>,
    pub thumbnails: Option<ThumbnailLoader>,
    pub store: HistoryStore,
}

struct Overlay {
    title: String,
    lines: Vec<String>,
}

pub struct App {
    services: Services,
    task_tx: mpsc::UnboundedSender<TaskEvent>,

    theme: Theme,
    font: FontMetrics,
    collapsed_line_limit: usize,
    vision_models: Vec<String>,

    viewport: ChatViewport,
    pagination: PaginationController,
    window: ConversationWindow,
    pipeline: RequestPipeline,
    input: InputState,

    models: Vec<ModelInfo>,
    model: Option<ModelInfo>,
    upload_available: bool,
    show_models_when_loaded: bool,

    history_generation: u64,
    status: Option<StatusMessage>,
    overlay: Option<Overlay>,
    chat_area: Rect,
    spinner_tick: usize,
    should_quit: bool,
}

fn build_view(
    message: Message,
    theme: &Theme,
    font: FontMetrics,
    collapsed_line_limit: usize,
    load_thumbnails: bool,
) -> MessageView {
    let outcome = if load_thumbnails {
        AttachmentOutcome::for_message(&message)
    } else {
        AttachmentOutcome::None
    };
    MessageView::new(message, outcome, theme, font, collapsed_line_limit)
}

impl App {
    pub fn new(config: &Config, services: Services) -> (Self, mpsc::UnboundedReceiver<TaskEvent>) {
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        let model = config.model.as_ref().map(|id| {
            let kind = if config.is_vision_model(id) {
                ModelKind::Vision
            } else {
                ModelKind::Chat
            };
            ModelInfo::new(id.clone(), kind)
        });

        let app = Self {
            services,
            task_tx,
            theme: Theme::from_name(config.theme),
            font: FontMetrics::from(config.font),
            collapsed_line_limit: config.collapsed_line_limit.max(1),
            vision_models: config.vision_models.clone(),
            viewport: ChatViewport::new(),
            pagination: PaginationController::new(config.page_size),
            window: ConversationWindow::new(config.window_capacity),
            pipeline: RequestPipeline::new(RequestSettings::from(config)),
            input: InputState::new(),
            models: Vec::new(),
            model,
            upload_available: false,
            show_models_when_loaded: false,
            history_generation: 0,
            status: None,
            overlay: None,
            chat_area: Rect::default(),
            spinner_tick: 0,
            should_quit: false,
        };
        (app, task_rx)
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn viewport(&self) -> &ChatViewport {
        &self.viewport
    }

    pub fn window(&self) -> &ConversationWindow {
        &self.window
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    pub fn pagination(&self) -> &PaginationController {
        &self.pagination
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn model(&self) -> Option<&ModelInfo> {
        self.model.as_ref()
    }

    fn set_status(&mut self, status: StatusMessage) {
        self.status = Some(status);
    }

    fn send(&self, event: TaskEvent) {
        if self.task_tx.send(event).is_err() {
            debug!(target: "colloquy::app", "Event loop is gone, dropping task event");
        }
    }

    /// Kick off the startup loads: history, model list and the upload
    /// server health check.
    pub fn start(&mut self) {
        self.set_status(StatusMessage::info("Loading history..."));
        self.spawn_initial_history();
        self.spawn_model_refresh();
        self.spawn_upload_check();
    }

    fn spawn_initial_history(&mut self) {
        self.history_generation += 1;
        let generation = self.history_generation;
        let store = self.services.store.clone();
        let page_size = self.pagination.page_size();
        let capacity = self.window.capacity();
        let tx = self.task_tx.clone();
        tokio::task::spawn_blocking(move || {
            let result = store.load_all().map(|all| {
                let total = all.len();
                let (start, end) = page_bounds(total, page_size, 0);
                InitialHistory {
                    total,
                    page: all[start..end].to_vec(),
                    tail: all[total.saturating_sub(capacity)..].to_vec(),
                }
            });
            let _ = tx.send(TaskEvent::InitialHistory { generation, result });
        });
    }

    fn spawn_model_refresh(&self) {
        let provider = Arc::clone(&self.services.provider);
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = provider.list_models().await;
            let _ = tx.send(TaskEvent::ModelsLoaded(result));
        });
    }

    fn spawn_upload_check(&self) {
        let Some(uploader) = self.services.uploader.clone() else {
            return;
        };
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = connect_with_retry(uploader.as_ref(), RetryPolicy::default()).await;
            let _ = tx.send(TaskEvent::UploadServer(result));
        });
    }

    fn spawn_thumbnails(&self, first: usize, count: usize) {
        let Some(loader) = self.services.thumbnails.clone() else {
            return;
        };
        let jobs: Vec<_> = self
            .viewport
            .views()
            .iter()
            .skip(first)
            .take(count)
            .filter(|view| *view.attachment() == AttachmentOutcome::Pending)
            .filter_map(|view| Some((view.id(), view.message().attachment()?.clone())))
            .collect();
        for (view_id, attachment) in jobs {
            let loader = loader.clone();
            let tx = self.task_tx.clone();
            tokio::spawn(async move {
                let result = loader.load(&attachment).await;
                let _ = tx.send(TaskEvent::ThumbnailLoaded { view_id, result });
            });
        }
    }

    fn make_view(&self, message: Message) -> MessageView {
        build_view(
            message,
            &self.theme,
            self.font,
            self.collapsed_line_limit,
            self.services.thumbnails.is_some(),
        )
    }

    /// Show `messages` (the newest page of a history of `total` messages)
    /// as the whole chat list.
    fn show_history(&mut self, page: Vec<Message>, total: usize) {
        let views: Vec<MessageView> = page.into_iter().map(|m| self.make_view(m)).collect();
        let count = views.len();
        self.viewport.replace_all(views);
        self.pagination.reset(&mut self.viewport, total);
        self.spawn_thumbnails(0, count);
    }

    fn push_message(&mut self, message: Message) {
        let view = self.make_view(message);
        self.viewport.push(view);
        self.spawn_thumbnails(self.viewport.len() - 1, 1);
    }

    pub fn handle_task_event(&mut self, event: TaskEvent) {
        match event {
            TaskEvent::InitialHistory { generation, result } => {
                if generation != self.history_generation {
                    debug!(target: "colloquy::app", "Dropping stale history load");
                    return;
                }
                match result {
                    Ok(history) => {
                        info!(
                            target: "colloquy::app",
                            total = history.total,
                            shown = history.page.len(),
                            "History loaded"
                        );
                        self.window.rebuild(history.tail);
                        let shown = history.page.len();
                        self.show_history(history.page, history.total);
                        self.set_status(StatusMessage::info(format!(
                            "Showing {shown} of {} messages",
                            history.total
                        )));
                    }
                    Err(e) => {
                        error!(target: "colloquy::app", "Failed to load history: {}", e);
                        self.set_status(StatusMessage::error(format!(
                            "Could not load history: {e}"
                        )));
                    }
                }
            }
            TaskEvent::ModelsLoaded(result) => self.on_models_loaded(result),
            TaskEvent::UploadServer(result) => match result {
                Ok(()) => self.upload_available = true,
                Err(e) => {
                    self.upload_available = false;
                    warn!(target: "colloquy::app", "Upload server unavailable: {}", e);
                    self.set_status(StatusMessage::warn(
                        "Upload server unavailable, images are recorded by local path",
                    ));
                }
            },
            TaskEvent::ResponseReady(result) => match self.pipeline.on_response(*result) {
                Ok(exchange) => {
                    self.pipeline.apply(&exchange, &mut self.window);
                    for message in exchange.messages() {
                        self.push_message(message);
                    }
                    let store = self.services.store.clone();
                    let tx = self.task_tx.clone();
                    tokio::task::spawn_blocking(move || {
                        let result = persist_exchange(&store, &exchange);
                        let _ = tx.send(TaskEvent::ExchangePersisted(result));
                    });
                    self.set_status(StatusMessage::info("Reply received"));
                }
                Err(e) => self.set_status(StatusMessage::error(e.to_string())),
            },
            TaskEvent::ExchangePersisted(result) => {
                self.pipeline.finish();
                if let Err(e) = result {
                    error!(target: "colloquy::app", "Failed to save exchange: {}", e);
                    self.set_status(StatusMessage::warn(format!(
                        "Reply shown but not saved: {e}"
                    )));
                }
            }
            TaskEvent::PageLoaded { generation, result } => {
                if generation != self.history_generation {
                    debug!(target: "colloquy::app", "Dropping stale page");
                    return;
                }
                match result {
                    Ok(slice) => {
                        let theme = &self.theme;
                        let font = self.font;
                        let limit = self.collapsed_line_limit;
                        let load_thumbnails = self.services.thumbnails.is_some();
                        let count = self.pagination.finish_load_more(
                            &mut self.viewport,
                            slice,
                            |message| build_view(message, theme, font, limit, load_thumbnails),
                        );
                        self.spawn_thumbnails(0, count);
                        self.set_status(StatusMessage::info(format!(
                            "Loaded {} messages",
                            self.viewport.len()
                        )));
                    }
                    Err(e) => {
                        self.pagination.abort_load_more();
                        self.set_status(StatusMessage::error(format!(
                            "Could not load earlier messages: {e}"
                        )));
                    }
                }
            }
            TaskEvent::ThumbnailLoaded { view_id, result } => {
                let outcome = AttachmentOutcome::from_thumbnail(&result);
                if !self.viewport.update_attachment(view_id, outcome, &self.theme) {
                    debug!(target: "colloquy::app", "Thumbnail for a view that is gone");
                }
            }
            TaskEvent::HistoryCleared(result) => match result {
                Ok(hosted) => {
                    self.delete_hosted_images(hosted);
                    self.set_status(StatusMessage::info("Chat cleared"));
                }
                Err(e) => {
                    error!(target: "colloquy::app", "Failed to clear history: {}", e);
                    self.set_status(StatusMessage::error(format!("Could not clear history: {e}")));
                }
            },
            TaskEvent::FileWritten { operation, result } => match result {
                Ok((path, count)) => {
                    let what = match operation {
                        FileOperation::Transcript => "Exported",
                        FileOperation::SaveAs => "Saved",
                    };
                    self.set_status(StatusMessage::info(format!(
                        "{what} {count} messages to {}",
                        path.display()
                    )));
                }
                Err(e) => self.set_status(StatusMessage::error(e.to_string())),
            },
            TaskEvent::Imported(result) => match result {
                Ok(messages) => {
                    let total = messages.len();
                    let (start, end) = page_bounds(total, self.pagination.page_size(), 0);
                    let page = messages[start..end].to_vec();
                    self.window.rebuild(messages);
                    self.show_history(page, total);
                    self.set_status(StatusMessage::info(format!("Imported {total} messages")));
                }
                Err(e) => self.set_status(StatusMessage::error(format!("Import failed: {e}"))),
            },
        }
    }

    fn on_models_loaded(&mut self, result: Result<Vec<ModelInfo>, colloquy_core::api::ApiError>) {
        match result {
            Ok(models) => {
                self.models = classify_models(models, &self.vision_models);
                let current = self
                    .model
                    .as_ref()
                    .and_then(|m| self.models.iter().find(|known| known.id == m.id))
                    .or_else(|| self.models.iter().find(|m| m.kind == ModelKind::Chat))
                    .or_else(|| self.models.first())
                    .cloned();
                if current.is_some() {
                    self.model = current;
                }
                info!(target: "colloquy::app", count = self.models.len(), "Models loaded");
                if self.show_models_when_loaded {
                    self.show_models_when_loaded = false;
                    self.show_model_list();
                }
            }
            Err(e) => {
                warn!(target: "colloquy::app", "Failed to load models: {}", e);
                self.set_status(StatusMessage::error(format!("Could not load models: {e}")));
            }
        }
    }

    fn show_model_list(&mut self) {
        let lines = self
            .models
            .iter()
            .map(|m| {
                let marker = if self.model.as_ref().is_some_and(|c| c.id == m.id) {
                    "*"
                } else {
                    " "
                };
                format!("{marker} {} ({})", m.id, m.kind.label())
            })
            .collect();
        self.overlay = Some(Overlay {
            title: " Models ".to_string(),
            lines,
        });
    }

    fn delete_hosted_images(&self, ids: Vec<String>) {
        let Some(uploader) = self.services.uploader.clone() else {
            return;
        };
        if ids.is_empty() {
            return;
        }
        tokio::spawn(async move {
            for id in ids {
                if let Err(e) = uploader.delete(&id).await {
                    warn!(target: "colloquy::app", image_id = %id, "Failed to delete hosted image: {}", e);
                }
            }
        });
    }

    pub fn handle_paste(&mut self, text: &str) {
        self.input.insert_str(text);
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.overlay.is_some() {
            self.overlay = None;
            return;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c' | 'q') if ctrl => self.quit(),
            KeyCode::Enter
                if key.modifiers.intersects(KeyModifiers::ALT | KeyModifiers::SHIFT) =>
            {
                self.input.insert_newline();
            }
            KeyCode::Enter => self.submit_input(),
            KeyCode::PageUp => {
                let step = self.page_step();
                self.scroll_up(step);
            }
            KeyCode::PageDown => {
                let step = self.page_step();
                self.viewport.state_mut().scroll_down(step);
            }
            KeyCode::Home if ctrl => {
                self.viewport.state_mut().scroll_to_top();
                self.request_load_more();
            }
            KeyCode::End if ctrl => self.viewport.state_mut().scroll_to_bottom(),
            KeyCode::Up if ctrl => self.viewport.focus_previous(),
            KeyCode::Down if ctrl => self.viewport.focus_next(),
            KeyCode::Char('e') if ctrl => {
                if let Some(idx) = self.target_index() {
                    if !self.viewport.toggle_expansion(idx) {
                        self.set_status(StatusMessage::info("Message is too short to collapse"));
                    }
                }
            }
            KeyCode::Char('s') if ctrl => {
                if let Some(idx) = self.target_index() {
                    self.viewport.toggle_selected(idx);
                    self.report_selection();
                }
            }
            KeyCode::Char('a') if ctrl => {
                self.viewport.select_all();
                self.report_selection();
            }
            KeyCode::Char('t') if ctrl => self.toggle_theme(),
            KeyCode::Esc => {
                self.viewport.clear_selection();
                self.viewport.clear_focus();
            }
            _ => self.input.handle_input(key),
        }
    }

    pub fn handle_mouse(&mut self, event: MouseEvent) {
        match event.kind {
            MouseEventKind::ScrollUp => self.scroll_up(MOUSE_SCROLL_ROWS),
            MouseEventKind::ScrollDown => {
                self.viewport.state_mut().scroll_down(MOUSE_SCROLL_ROWS);
            }
            MouseEventKind::Down(MouseButton::Left) => {
                let area = self.chat_area;
                let inside = event.column >= area.x
                    && event.column < area.x.saturating_add(area.width)
                    && event.row >= area.y
                    && event.row < area.y.saturating_add(area.height);
                if !inside {
                    return;
                }
                match self.viewport.hit_test(event.row - area.y) {
                    Some(ViewportHit::LoadMore) => self.request_load_more(),
                    Some(ViewportHit::Message(idx))
                        if event.modifiers.contains(KeyModifiers::CONTROL) =>
                    {
                        if self.viewport.toggle_selected(idx) {
                            self.report_selection();
                        }
                    }
                    Some(ViewportHit::Message(idx)) => {
                        self.viewport.toggle_expansion(idx);
                    }
                    None => {}
                }
            }
            _ => {}
        }
    }

    /// Advance the spinner. Returns whether a redraw is needed.
    pub fn on_tick(&mut self) -> bool {
        if self.pipeline.is_busy() {
            self.spinner_tick = self.spinner_tick.wrapping_add(1);
            true
        } else {
            false
        }
    }

    fn page_step(&self) -> usize {
        usize::from(self.viewport.state().last_viewport_height)
            .saturating_sub(1)
            .max(1)
    }

    fn scroll_up(&mut self, rows: usize) {
        self.viewport.state_mut().scroll_up(rows);
        if self.viewport.state().is_at_top() {
            self.request_load_more();
        }
    }

    fn target_index(&self) -> Option<usize> {
        self.viewport
            .focused()
            .or_else(|| self.viewport.len().checked_sub(1))
    }

    fn report_selection(&mut self) {
        let count = self.viewport.selected_count();
        self.set_status(StatusMessage::info(format!("{count} selected")));
    }

    pub fn request_load_more(&mut self) {
        let Some(request) = self.pagination.begin_load_more(&self.viewport) else {
            return;
        };
        let generation = self.history_generation;
        let store = self.services.store.clone();
        let tx = self.task_tx.clone();
        tokio::task::spawn_blocking(move || {
            let result = request.read(&store);
            let _ = tx.send(TaskEvent::PageLoaded { generation, result });
        });
        self.set_status(StatusMessage::info("Loading earlier messages..."));
    }

    fn set_theme(&mut self, name: ThemeName) {
        self.theme = Theme::from_name(name);
        self.viewport
            .rebuild_all(&self.theme, self.font, self.collapsed_line_limit);
        self.set_status(StatusMessage::info(format!("Theme: {name}")));
    }

    fn toggle_theme(&mut self) {
        self.set_theme(self.theme.name.toggled());
    }

    pub fn submit_input(&mut self) {
        let content = self.input.content();
        if let Some(parsed) = SlashCommand::parse(&content) {
            self.input.clear_text();
            match parsed {
                Ok(command) => self.run_command(command),
                Err(e) => self.set_status(StatusMessage::error(e.to_string())),
            }
            return;
        }

        match self
            .pipeline
            .submit(self.input.prompt(), self.model.as_ref(), &self.window)
        {
            Ok(Submission::Nothing) => self.set_status(StatusMessage::info("Nothing to send")),
            Ok(Submission::Dispatch(pending)) => {
                self.input.reset();
                self.dispatch(pending);
            }
            Err(e) => self.set_status(StatusMessage::error(e.to_string())),
        }
    }

    fn dispatch(&mut self, pending: PendingRequest) {
        let provider = Arc::clone(&self.services.provider);
        let uploader = self
            .services
            .uploader
            .clone()
            .filter(|_| self.upload_available);
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = pending.execute(provider.as_ref(), uploader.as_deref()).await;
            let _ = tx.send(TaskEvent::ResponseReady(Box::new(result)));
        });
        self.pipeline.mark_dispatched();
        self.set_status(StatusMessage::info("Waiting for reply..."));
    }

    fn run_command(&mut self, command: SlashCommand) {
        debug!(target: "colloquy::app", ?command, "Running command");
        match command {
            SlashCommand::Image(path) => {
                let count = self.input.stage_image(path);
                self.set_status(StatusMessage::info(format!("{count} image(s) attached")));
            }
            SlashCommand::Url(url) => {
                self.input.stage_image_url(url);
                self.set_status(StatusMessage::info("Image URL attached"));
            }
            SlashCommand::File(path) => {
                self.input.stage_file(path);
                self.set_status(StatusMessage::info("File attached"));
            }
            SlashCommand::Detach => {
                self.input.detach();
                self.set_status(StatusMessage::info("Attachments removed"));
            }
            SlashCommand::Model(None) => {
                let text = match &self.model {
                    Some(model) => format!("Model: {} ({})", model.id, model.kind.label()),
                    None => "No model selected".to_string(),
                };
                self.set_status(StatusMessage::info(text));
            }
            SlashCommand::Model(Some(id)) => {
                match self.models.iter().find(|m| m.id == id).cloned() {
                    Some(model) => {
                        self.set_status(StatusMessage::info(format!("Model: {}", model.id)));
                        self.model = Some(model);
                    }
                    None => self.set_status(StatusMessage::error(format!("Unknown model: {id}"))),
                }
            }
            SlashCommand::Models => {
                self.show_models_when_loaded = true;
                self.spawn_model_refresh();
                self.set_status(StatusMessage::info("Loading models..."));
            }
            SlashCommand::Theme(ThemeChoice::Toggle) => self.toggle_theme(),
            SlashCommand::Theme(ThemeChoice::Named(name)) => self.set_theme(name),
            SlashCommand::Clear => self.clear_chat(),
            SlashCommand::Export(path) => self.export_transcript(path),
            SlashCommand::Save(path) => self.save_history_as(path),
            SlashCommand::Import(path) => self.import_history(path),
            SlashCommand::SelectAll => {
                self.viewport.select_all();
                self.report_selection();
            }
            SlashCommand::Help => {
                let mut lines = help_lines();
                lines.push(String::new());
                lines.extend(KEY_BINDINGS.iter().map(|l| (*l).to_string()));
                self.overlay = Some(Overlay {
                    title: " Help ".to_string(),
                    lines,
                });
            }
        }
    }

    fn refuse_while_busy(&mut self) -> bool {
        if self.pipeline.is_busy() {
            self.set_status(StatusMessage::warn("Wait for the current reply to finish"));
            true
        } else {
            false
        }
    }

    fn clear_chat(&mut self) {
        if self.refuse_while_busy() {
            return;
        }
        self.history_generation += 1;
        self.window.clear();
        self.viewport.clear();
        self.pagination.reset(&mut self.viewport, 0);

        let store = self.services.store.clone();
        let prefix = self.services.uploader.as_ref().map(|u| u.uploads_prefix());
        let tx = self.task_tx.clone();
        tokio::task::spawn_blocking(move || {
            let result = store.load_all().and_then(|all| {
                store.overwrite(&[])?;
                let Some(prefix) = prefix else {
                    return Ok(Vec::new());
                };
                Ok(all
                    .iter()
                    .filter_map(|m| match m.attachment() {
                        Some(Attachment::RemoteUrl(url)) => hosted_image_id(&prefix, url.as_str()),
                        _ => None,
                    })
                    .collect())
            });
            let _ = tx.send(TaskEvent::HistoryCleared(result));
        });
    }

    fn export_transcript(&mut self, path: PathBuf) {
        let tx = self.task_tx.clone();
        let selected = self.viewport.selected_count();
        if selected > 0 {
            let text = self.viewport.selected_text();
            tokio::task::spawn_blocking(move || {
                let result = std::fs::write(&path, text)
                    .map(|()| (path, selected))
                    .map_err(colloquy_core::Error::from);
                let _ = tx.send(TaskEvent::FileWritten {
                    operation: FileOperation::Transcript,
                    result,
                });
            });
            return;
        }

        let store = self.services.store.clone();
        tokio::task::spawn_blocking(move || {
            let result = store
                .load_all()
                .map_err(colloquy_core::Error::from)
                .and_then(|all| {
                    export_transcript(&all, &path)?;
                    Ok((path, all.len()))
                });
            let _ = tx.send(TaskEvent::FileWritten {
                operation: FileOperation::Transcript,
                result,
            });
        });
    }

    fn save_history_as(&mut self, path: PathBuf) {
        let store = self.services.store.clone();
        let tx = self.task_tx.clone();
        tokio::task::spawn_blocking(move || {
            let result = store
                .export_to(&path)
                .map(|count| (path, count))
                .map_err(colloquy_core::Error::from);
            let _ = tx.send(TaskEvent::FileWritten {
                operation: FileOperation::SaveAs,
                result,
            });
        });
    }

    fn import_history(&mut self, path: PathBuf) {
        if self.refuse_while_busy() {
            return;
        }
        self.history_generation += 1;
        let store = self.services.store.clone();
        let tx = self.task_tx.clone();
        tokio::task::spawn_blocking(move || {
            let _ = tx.send(TaskEvent::Imported(store.import_from(&path)));
        });
        self.set_status(StatusMessage::info("Importing..."));
    }

    pub fn draw(&mut self, f: &mut Frame) {
        let area = f.area();
        let input_height = self
            .input
            .required_height()
            .min(area.height.saturating_sub(2));
        let [chat_area, input_area, status_area] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(input_height),
            Constraint::Length(1),
        ])
        .areas(area);

        self.chat_area = chat_area;
        self.viewport.set_width(chat_area.width);
        self.viewport.render(f, chat_area, &self.theme);

        let busy = self.pipeline.is_busy();
        f.render_stateful_widget(
            InputPanel::new(&self.theme, busy),
            input_area,
            &mut self.input,
        );

        f.render_widget(
            StatusBar::new(&self.theme)
                .status(self.status.as_ref())
                .model(self.model.as_ref())
                .busy(busy.then_some(self.spinner_tick))
                .upload_available(self.upload_available),
            status_area,
        );

        if let Some(overlay) = &self.overlay {
            render_overlay(f, chat_area, overlay, &self.theme);
        }
    }
}

fn render_overlay(f: &mut Frame, area: Rect, overlay: &Overlay, theme: &Theme) {
    let width = area.width.saturating_sub(4).min(90);
    let height = (overlay.lines.len() as u16).saturating_add(2).min(area.height);
    let rect = Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    };
    let lines: Vec<Line> = overlay
        .lines
        .iter()
        .map(|l| Line::from(Span::styled(l.as_str(), theme.style(Component::MessageText))))
        .collect();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.style(Component::InputBorder))
        .title(Span::styled(
            overlay.title.as_str(),
            theme.style(Component::InputTitle),
        ));
    f.render_widget(Clear, rect);
    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        rect,
    );
}
