//! Message composer: a text area plus the attachments staged for the next
//! message.

use colloquy_core::pipeline::PromptInput;
use ratatui::layout::Rect;
use ratatui::prelude::{Buffer, StatefulWidget, Widget};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders};
use std::path::{Path, PathBuf};
use tui_textarea::{Input, TextArea};

use crate::tui::theme::{Component, Theme};

const PLACEHOLDER: &str = "Type a message, /help for commands";
const MAX_VISIBLE_LINES: u16 = 8;

#[derive(Debug)]
pub struct InputState {
    textarea: TextArea<'static>,
    images: Vec<PathBuf>,
    image_url: Option<String>,
    file: Option<PathBuf>,
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

fn empty_textarea() -> TextArea<'static> {
    let mut textarea = TextArea::default();
    textarea.set_placeholder_text(PLACEHOLDER);
    textarea.set_cursor_line_style(Style::default());
    textarea.set_cursor_style(Style::default().add_modifier(Modifier::REVERSED));
    textarea
}

impl InputState {
    pub fn new() -> Self {
        Self {
            textarea: empty_textarea(),
            images: Vec::new(),
            image_url: None,
            file: None,
        }
    }

    pub fn content(&self) -> String {
        self.textarea.lines().join("\n")
    }

    pub fn has_text(&self) -> bool {
        !self.content().trim().is_empty()
    }

    pub fn handle_input(&mut self, input: impl Into<Input>) {
        self.textarea.input(input);
    }

    pub fn insert_newline(&mut self) {
        self.textarea.insert_newline();
    }

    /// Insert pasted text, normalizing line endings.
    pub fn insert_str(&mut self, text: &str) {
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        self.textarea.insert_str(normalized);
    }

    pub fn clear_text(&mut self) {
        self.textarea = empty_textarea();
    }

    pub fn stage_image(&mut self, path: PathBuf) -> usize {
        self.images.push(path);
        self.images.len()
    }

    pub fn stage_image_url(&mut self, url: String) {
        self.image_url = Some(url);
    }

    pub fn stage_file(&mut self, path: PathBuf) {
        self.file = Some(path);
    }

    pub fn detach(&mut self) {
        self.images.clear();
        self.image_url = None;
        self.file = None;
    }

    pub fn has_attachments(&self) -> bool {
        !self.images.is_empty() || self.image_url.is_some() || self.file.is_some()
    }

    /// Short description of the staged attachments, if any.
    pub fn staged_summary(&self) -> Option<String> {
        let mut parts = Vec::new();
        match self.images.as_slice() {
            [] => {}
            [one] => parts.push(format!("image {}", file_name(one))),
            many => parts.push(format!("{} images", many.len())),
        }
        if let Some(url) = &self.image_url {
            parts.push(format!("url {url}"));
        }
        if let Some(file) = &self.file {
            parts.push(format!("file {}", file_name(file)));
        }
        (!parts.is_empty()).then(|| parts.join(", "))
    }

    /// Snapshot of the text and attachments as a prompt.
    pub fn prompt(&self) -> PromptInput {
        PromptInput {
            text: self.content(),
            images: self.images.clone(),
            image_url: self.image_url.clone(),
            file: self.file.clone(),
        }
    }

    /// Clear text and attachments after a request was dispatched.
    pub fn reset(&mut self) {
        self.clear_text();
        self.detach();
    }

    /// Rows needed to draw the panel: text lines, staged line and borders.
    pub fn required_height(&self) -> u16 {
        let lines = (self.textarea.lines().len() as u16).clamp(1, MAX_VISIBLE_LINES);
        let staged = u16::from(self.has_attachments());
        lines + staged + 2
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

pub struct InputPanel<'a> {
    theme: &'a Theme,
    busy: bool,
}

impl<'a> InputPanel<'a> {
    pub fn new(theme: &'a Theme, busy: bool) -> Self {
        Self { theme, busy }
    }
}

impl StatefulWidget for InputPanel<'_> {
    type State = InputState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let (border, title) = if self.busy {
            (Component::InputBorderBusy, " Waiting for reply ")
        } else {
            (Component::InputBorder, " Message ")
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.style(border))
            .title(Span::styled(title, self.theme.style(Component::InputTitle)));
        let inner = block.inner(area);
        block.render(area, buf);

        let mut text_area = inner;
        if let Some(summary) = state.staged_summary() {
            if inner.height > 1 {
                text_area.height -= 1;
                let staged = Line::from(Span::styled(
                    format!("+ {summary}"),
                    self.theme.style(Component::StagedAttachment),
                ));
                buf.set_line(inner.x, inner.y + inner.height - 1, &staged, inner.width);
            }
        }

        state.textarea.set_block(Block::default());
        Widget::render(&state.textarea, text_area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_text_and_attachments() {
        let mut state = InputState::new();
        state.insert_str("first\r\nsecond");
        state.stage_image(PathBuf::from("/tmp/a.png"));
        state.stage_file(PathBuf::from("notes.txt"));

        let prompt = state.prompt();
        assert_eq!(prompt.text, "first\nsecond");
        assert_eq!(prompt.images, vec![PathBuf::from("/tmp/a.png")]);
        assert_eq!(prompt.file, Some(PathBuf::from("notes.txt")));
        assert_eq!(
            state.staged_summary().as_deref(),
            Some("image a.png, file notes.txt")
        );

        state.reset();
        assert!(state.prompt().is_empty());
        assert_eq!(state.staged_summary(), None);
    }

    #[test]
    fn height_grows_with_content_up_to_a_cap() {
        let mut state = InputState::new();
        assert_eq!(state.required_height(), 3);
        state.insert_str("1\n2\n3");
        assert_eq!(state.required_height(), 5);
        state.stage_image_url("https://example.com/cat.png".into());
        assert_eq!(state.required_height(), 6);
        state.insert_str(&"\nx".repeat(20));
        assert_eq!(state.required_height(), MAX_VISIBLE_LINES + 3);
    }

    #[test]
    fn renders_staged_line() {
        let theme = Theme::default();
        let mut state = InputState::new();
        state.stage_image(PathBuf::from("a.png"));
        state.stage_image(PathBuf::from("b.png"));
        let area = Rect::new(0, 0, 30, 4);
        let mut buf = Buffer::empty(area);
        InputPanel::new(&theme, false).render(area, &mut buf, &mut state);
        let row: String = (1..29).map(|x| buf[(x, 2)].symbol().to_string()).collect();
        assert_eq!(row.trim_end(), "+ 2 images");
    }
}
