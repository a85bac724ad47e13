//! Status bar widget for the last status message and the current model

use colloquy_core::api::ModelInfo;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

use crate::tui::theme::{Component, Theme};

const SPINNER_FRAMES: [&str; 4] = ["|", "/", "-", "\\"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Info,
            text: text.into(),
        }
    }

    pub fn warn(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Warn,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Error,
            text: text.into(),
        }
    }
}

pub fn spinner_frame(tick: usize) -> &'static str {
    SPINNER_FRAMES[tick % SPINNER_FRAMES.len()]
}

pub struct StatusBar<'a> {
    status: Option<&'a StatusMessage>,
    model: Option<&'a ModelInfo>,
    spinner: Option<usize>,
    upload_available: bool,
    theme: &'a Theme,
}

impl<'a> StatusBar<'a> {
    pub fn new(theme: &'a Theme) -> Self {
        Self {
            status: None,
            model: None,
            spinner: None,
            upload_available: false,
            theme,
        }
    }

    pub fn status(mut self, status: Option<&'a StatusMessage>) -> Self {
        self.status = status;
        self
    }

    pub fn model(mut self, model: Option<&'a ModelInfo>) -> Self {
        self.model = model;
        self
    }

    /// Show a spinner at the given animation tick while a request is in flight.
    pub fn busy(mut self, tick: Option<usize>) -> Self {
        self.spinner = tick;
        self
    }

    pub fn upload_available(mut self, available: bool) -> Self {
        self.upload_available = available;
        self
    }
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let style = self.theme.style(Component::StatusBar);

        let mut left_spans = vec![Span::raw(" ")];
        if let Some(tick) = self.spinner {
            left_spans.push(Span::raw(format!("{} ", spinner_frame(tick))));
        }
        if let Some(status) = self.status {
            let component = match status.level {
                StatusLevel::Info => Component::StatusInfo,
                StatusLevel::Warn => Component::StatusWarn,
                StatusLevel::Error => Component::StatusError,
            };
            left_spans.push(Span::styled(status.text.clone(), self.theme.style(component)));
        }
        Paragraph::new(Line::from(left_spans))
            .style(style)
            .alignment(Alignment::Left)
            .render(area, buf);

        let model_text = match self.model {
            Some(model) => format!("{} ({}) ", model.id, model.kind.label()),
            None => "no model ".to_string(),
        };
        let mut right_spans = Vec::new();
        if !self.upload_available {
            right_spans.push(Span::styled(
                "uploads offline | ",
                self.theme.style(Component::StatusWarn),
            ));
        }
        right_spans.push(Span::styled(model_text, self.theme.style(Component::ModelInfo)));
        Paragraph::new(Line::from(right_spans))
            .style(style)
            .alignment(Alignment::Right)
            .render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_core::api::ModelKind;

    fn row(buf: &Buffer, width: u16) -> String {
        (0..width).map(|x| buf[(x, 0)].symbol().to_string()).collect()
    }

    #[test]
    fn shows_status_and_model() {
        let theme = Theme::default();
        let model = ModelInfo::new("llava", ModelKind::Vision);
        let status = StatusMessage::info("Nothing to send");
        let area = Rect::new(0, 0, 60, 1);
        let mut buf = Buffer::empty(area);
        StatusBar::new(&theme)
            .status(Some(&status))
            .model(Some(&model))
            .upload_available(true)
            .render(area, &mut buf);
        let text = row(&buf, 60);
        assert!(text.starts_with(" Nothing to send"));
        assert!(text.trim_end().ends_with("llava (Vision)"));
    }

    #[test]
    fn marks_missing_upload_server() {
        let theme = Theme::default();
        let area = Rect::new(0, 0, 40, 1);
        let mut buf = Buffer::empty(area);
        StatusBar::new(&theme).busy(Some(1)).render(area, &mut buf);
        let text = row(&buf, 40);
        assert!(text.starts_with(" / "));
        assert!(text.contains("uploads offline"));
        assert!(text.trim_end().ends_with("no model"));
    }
}
