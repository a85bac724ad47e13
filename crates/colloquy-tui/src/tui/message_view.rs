//! Display state for one message.
//!
//! Layout happens in two phases. [`MessageView::new`] builds the intrinsic
//! content (hard lines with highlight spans) and a provisional height from the
//! hard line count. [`MessageView::layout`] wraps those lines once the
//! container width is known and fixes `wrapped_line_count` and
//! `current_height`. The height is only ever produced by
//! [`compute_height`].

use colloquy_core::attachments::Thumbnail;
use colloquy_core::error::AttachmentError;
use colloquy_core::message::Message;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::tui::height::{
    FontMetrics, columns_for_width, compute_height, rows_for_height, wrap_spans,
};
use crate::tui::highlight::{StyledLine, highlight_message};
use crate::tui::theme::{Component, Theme};

static NEXT_VIEW_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(u64);

impl ViewId {
    fn next() -> Self {
        Self(NEXT_VIEW_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// State of a message's image attachment as far as the view is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentOutcome {
    None,
    Pending,
    Loaded {
        source: String,
        width: u32,
        height: u32,
    },
    Failed(String),
}

impl AttachmentOutcome {
    /// `Pending` when the message has an attachment still to be loaded.
    pub fn for_message(message: &Message) -> Self {
        if message.attachment().is_some() {
            AttachmentOutcome::Pending
        } else {
            AttachmentOutcome::None
        }
    }

    pub fn from_thumbnail(result: &Result<Thumbnail, AttachmentError>) -> Self {
        match result {
            Ok(thumbnail) => {
                let (width, height) = thumbnail.dimensions();
                AttachmentOutcome::Loaded {
                    source: thumbnail.source.clone(),
                    width,
                    height,
                }
            }
            Err(e) => AttachmentOutcome::Failed(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ViewStyles {
    header: Style,
    timestamp: Style,
    selected: Style,
    focus: Style,
    marker: Style,
    image_label: Style,
}

impl ViewStyles {
    fn new(message: &Message, theme: &Theme) -> Self {
        Self {
            header: if message.is_user() {
                theme.style(Component::UserHeader)
            } else {
                theme.style(Component::AssistantHeader)
            },
            timestamp: theme.style(Component::Timestamp),
            selected: theme.style(Component::SelectedMessage),
            focus: theme.style(Component::FocusMarker),
            marker: theme.style(Component::CollapsedMarker),
            image_label: theme.style(Component::ImageLabel),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessageView {
    id: ViewId,
    message: Message,
    attachment: AttachmentOutcome,
    lines: Vec<StyledLine>,
    rows: Vec<StyledLine>,
    layout_width: Option<u16>,
    expanded: bool,
    selected: bool,
    wrapped_line_count: usize,
    current_height: f32,
    collapsed_line_limit: usize,
    font: FontMetrics,
    styles: ViewStyles,
}

impl MessageView {
    pub fn new(
        message: Message,
        attachment: AttachmentOutcome,
        theme: &Theme,
        font: FontMetrics,
        collapsed_line_limit: usize,
    ) -> Self {
        let styles = ViewStyles::new(&message, theme);
        let lines = build_lines(&message, &attachment, theme);
        let wrapped_line_count = lines.len().max(1);
        let mut view = Self {
            id: ViewId::next(),
            message,
            attachment,
            rows: lines.clone(),
            lines,
            layout_width: None,
            expanded: true,
            selected: false,
            wrapped_line_count,
            current_height: 0.0,
            collapsed_line_limit,
            font,
            styles,
        };
        view.refresh_height();
        view
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn attachment(&self) -> &AttachmentOutcome {
        &self.attachment
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    pub fn selected_style(&self) -> Style {
        self.styles.selected
    }

    pub fn wrapped_line_count(&self) -> usize {
        self.wrapped_line_count
    }

    pub fn current_height(&self) -> f32 {
        self.current_height
    }

    /// Message text as displayed, including any image error annotation.
    pub fn display_text(&self) -> String {
        match &self.attachment {
            AttachmentOutcome::Failed(error) => {
                format!("{}\n{}", self.message.content(), image_error_annotation(error))
            }
            _ => self.message.content().to_string(),
        }
    }

    /// Wrap to `width` columns and recompute the height.
    pub fn layout(&mut self, width: u16) {
        if self.layout_width == Some(width) {
            return;
        }
        let columns = columns_for_width(f32::from(width), &self.font);
        self.rows = self
            .lines
            .iter()
            .flat_map(|line| {
                let segments: Vec<(Style, &str)> =
                    line.iter().map(|(style, text)| (*style, text.as_str())).collect();
                wrap_spans(&segments, columns)
            })
            .collect();
        self.wrapped_line_count = self.rows.len().max(1);
        self.layout_width = Some(width);
        self.refresh_height();
    }

    fn refresh_height(&mut self) {
        self.current_height = compute_height(
            self.wrapped_line_count,
            self.expanded,
            self.collapsed_line_limit,
            &self.font,
        );
    }

    /// Flip between expanded and collapsed. Messages that fit within the
    /// collapsed line limit never collapse; returns whether anything changed.
    pub fn toggle_expansion(&mut self) -> bool {
        if self.wrapped_line_count <= self.collapsed_line_limit {
            return false;
        }
        self.expanded = !self.expanded;
        self.refresh_height();
        true
    }

    pub fn set_attachment(&mut self, attachment: AttachmentOutcome, theme: &Theme) {
        self.attachment = attachment;
        self.lines = build_lines(&self.message, &self.attachment, theme);
        self.relayout();
    }

    /// Rebuild styled content for a new theme or font, keeping expansion and
    /// selection state.
    pub fn restyle(&mut self, theme: &Theme, font: FontMetrics, collapsed_line_limit: usize) {
        self.styles = ViewStyles::new(&self.message, theme);
        self.lines = build_lines(&self.message, &self.attachment, theme);
        self.font = font;
        self.collapsed_line_limit = collapsed_line_limit;
        self.relayout();
    }

    fn relayout(&mut self) {
        match self.layout_width.take() {
            Some(width) => self.layout(width),
            None => {
                self.rows = self.lines.clone();
                self.wrapped_line_count = self.lines.len().max(1);
                self.refresh_height();
            }
        }
        if self.wrapped_line_count <= self.collapsed_line_limit && !self.expanded {
            self.expanded = true;
            self.refresh_height();
        }
    }

    fn text_rows(&self) -> usize {
        rows_for_height(self.current_height)
    }

    fn image_rows(&self) -> usize {
        usize::from(matches!(self.attachment, AttachmentOutcome::Loaded { .. }))
    }

    /// Terminal rows: header, text block and optional image row.
    pub fn total_rows(&self) -> usize {
        1 + self.text_rows() + self.image_rows()
    }

    /// Render every row of the view.
    pub fn render_lines(&self, focused: bool) -> Vec<Line<'static>> {
        let mut out = Vec::with_capacity(self.total_rows());

        let marker = if focused {
            Span::styled("▌", self.styles.focus)
        } else {
            Span::raw(" ")
        };
        out.push(Line::from(vec![
            marker,
            Span::styled(
                self.message.timestamp().format("%H:%M:%S").to_string(),
                self.styles.timestamp,
            ),
            Span::raw("  "),
            Span::styled(self.message.role().label(), self.styles.header),
        ]));

        let text_rows = self.text_rows();
        let shown = if self.expanded {
            self.rows.len().min(text_rows)
        } else {
            self.collapsed_line_limit.min(self.rows.len()).min(text_rows)
        };
        out.extend(self.rows.iter().take(shown).map(|row| styled_line(row)));

        let hidden = self.rows.len().saturating_sub(shown);
        if out.len() < 1 + text_rows && hidden > 0 {
            out.push(Line::from(Span::styled(
                format!("… {hidden} more lines"),
                self.styles.marker,
            )));
        }
        while out.len() < 1 + text_rows {
            out.push(Line::default());
        }

        if let AttachmentOutcome::Loaded {
            source,
            width,
            height,
        } = &self.attachment
        {
            out.push(Line::from(Span::styled(
                format!("[image {width}x{height}] {source}"),
                self.styles.image_label,
            )));
        }
        out
    }

    /// Rows `start..end` of [`Self::render_lines`].
    pub fn line_slice(&self, focused: bool, start: usize, end: usize) -> Vec<Line<'static>> {
        let lines = self.render_lines(focused);
        let end = end.min(lines.len());
        let start = start.min(end);
        lines[start..end].to_vec()
    }
}

fn image_error_annotation(error: &str) -> String {
    format!("[Image load error: {error}]")
}

fn styled_line(row: &StyledLine) -> Line<'static> {
    Line::from(
        row.iter()
            .map(|(style, text)| Span::styled(text.clone(), *style))
            .collect::<Vec<_>>(),
    )
}

fn build_lines(message: &Message, attachment: &AttachmentOutcome, theme: &Theme) -> Vec<StyledLine> {
    let mut lines = highlight_message(message.content(), theme);
    if let AttachmentOutcome::Failed(error) = attachment {
        lines.push(vec![(
            theme.style(Component::ImageError),
            image_error_annotation(error),
        )]);
    }
    lines
}
