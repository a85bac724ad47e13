//! ChatViewport - ordered message views with a row index for scrolling
//!
//! Views are kept oldest first. Row positions are kept in a segment index
//! that is rebuilt whenever a height changes, so rendering only touches the
//! segments that intersect the viewport.

use colloquy_core::message::Message;
use colloquy_core::transcript::render_transcript;
use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
};
use tracing::debug;

use crate::tui::chat_list_state::{ChatListState, ScrollTarget};
use crate::tui::height::FontMetrics;
use crate::tui::message_view::{AttachmentOutcome, MessageView, ViewId};
use crate::tui::theme::{Component, Theme};

pub const LOAD_MORE_LABEL: &str = "▲ Load earlier messages";

/// Blank rows between consecutive messages.
const MESSAGE_SPACING: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowKind {
    LoadMore,
    Item { idx: usize },
    Gap,
}

/// Metrics for a single row to be rendered
#[derive(Debug, Clone)]
struct RowMetrics {
    kind: RowKind,
    render_h: usize,           // actual height to render in viewport
    first_visible_line: usize, // line offset for partial rendering
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    kind: RowKind,
    start_y: usize,
    height: usize,
}

/// What sits under a viewport row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportHit {
    LoadMore,
    Message(usize),
}

#[derive(Debug, Default)]
pub struct ChatViewport {
    views: Vec<MessageView>,
    segments: Vec<Segment>,
    item_start_y: Vec<usize>,
    total_content_height: usize,
    state: ChatListState,
    width: u16,
    show_load_more: bool,
    focus: Option<usize>,
}

impl ChatViewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ChatListState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ChatListState {
        &mut self.state
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn views(&self) -> &[MessageView] {
        &self.views
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    /// Total rows of content, including the load-more header and gaps.
    pub fn content_height(&self) -> usize {
        self.total_content_height
    }

    /// First row of the view at `idx`. Past the last view this is the
    /// content height.
    pub fn rows_above(&self, idx: usize) -> usize {
        self.item_start_y
            .get(idx)
            .copied()
            .unwrap_or(self.total_content_height)
    }

    pub fn offset(&self) -> usize {
        self.state.offset
    }

    pub fn set_offset(&mut self, offset: usize) {
        self.state.set_offset(offset);
    }

    pub fn load_more_visible(&self) -> bool {
        self.show_load_more
    }

    pub fn set_load_more_visible(&mut self, visible: bool) {
        if self.show_load_more != visible {
            self.show_load_more = visible;
            self.rebuild_segment_index();
        }
    }

    /// Lay every view out for a new container width.
    pub fn set_width(&mut self, width: u16) {
        if width == self.width {
            return;
        }
        debug!(target: "colloquy::viewport", from = self.width, to = width, "Relayout");
        self.width = width;
        for view in &mut self.views {
            view.layout(width);
        }
        self.rebuild_segment_index();
    }

    /// Append a view at the bottom, following the conversation if the user
    /// was already at the bottom.
    pub fn push(&mut self, mut view: MessageView) {
        let follow = self.state.is_at_bottom();
        view.layout(self.width);
        self.views.push(view);
        self.rebuild_segment_index();
        if follow {
            self.state.scroll_to_bottom();
        }
    }

    /// Insert views (oldest first) above the current ones.
    pub fn prepend(&mut self, views: Vec<MessageView>) {
        let count = views.len();
        let width = self.width;
        self.views.splice(
            0..0,
            views.into_iter().map(|mut view| {
                view.layout(width);
                view
            }),
        );
        self.focus = self.focus.map(|idx| idx + count);
        self.rebuild_segment_index();
    }

    /// Replace all views and jump to the bottom.
    pub fn replace_all(&mut self, views: Vec<MessageView>) {
        self.views = views;
        for view in &mut self.views {
            view.layout(self.width);
        }
        self.focus = None;
        self.rebuild_segment_index();
        self.state.scroll_to_bottom();
    }

    pub fn clear(&mut self) {
        self.replace_all(Vec::new());
        self.set_load_more_visible(false);
    }

    /// Rebuild every view after a theme or font change.
    pub fn rebuild_all(&mut self, theme: &Theme, font: FontMetrics, collapsed_line_limit: usize) {
        for view in &mut self.views {
            view.restyle(theme, font, collapsed_line_limit);
        }
        self.rebuild_segment_index();
    }

    pub fn update_attachment(
        &mut self,
        id: ViewId,
        outcome: AttachmentOutcome,
        theme: &Theme,
    ) -> bool {
        let Some(view) = self.views.iter_mut().find(|view| view.id() == id) else {
            return false;
        };
        view.set_attachment(outcome, theme);
        self.rebuild_segment_index();
        true
    }

    pub fn toggle_expansion(&mut self, idx: usize) -> bool {
        let changed = self
            .views
            .get_mut(idx)
            .is_some_and(MessageView::toggle_expansion);
        if changed {
            self.rebuild_segment_index();
        }
        changed
    }

    pub fn focused(&self) -> Option<usize> {
        self.focus
    }

    pub fn focus_previous(&mut self) {
        if self.views.is_empty() {
            return;
        }
        let idx = match self.focus {
            Some(idx) => idx.saturating_sub(1),
            None => self.views.len() - 1,
        };
        self.focus = Some(idx);
        self.state.scroll_to_item(idx);
    }

    pub fn focus_next(&mut self) {
        match self.focus {
            Some(idx) if idx + 1 < self.views.len() => {
                self.focus = Some(idx + 1);
                self.state.scroll_to_item(idx + 1);
            }
            Some(_) => {
                self.focus = None;
                self.state.scroll_to_bottom();
            }
            None => {}
        }
    }

    pub fn clear_focus(&mut self) {
        self.focus = None;
    }

    pub fn toggle_selected(&mut self, idx: usize) -> bool {
        match self.views.get_mut(idx) {
            Some(view) => {
                let selected = !view.is_selected();
                view.set_selected(selected);
                true
            }
            None => false,
        }
    }

    pub fn select_all(&mut self) {
        for view in &mut self.views {
            view.set_selected(true);
        }
    }

    pub fn clear_selection(&mut self) {
        for view in &mut self.views {
            view.set_selected(false);
        }
    }

    pub fn selected_count(&self) -> usize {
        self.views.iter().filter(|view| view.is_selected()).count()
    }

    pub fn selected_messages(&self) -> Vec<&Message> {
        self.views
            .iter()
            .filter(|view| view.is_selected())
            .map(MessageView::message)
            .collect()
    }

    /// Transcript of every selected message, oldest first.
    pub fn selected_text(&self) -> String {
        render_transcript(self.selected_messages())
    }

    /// What is drawn at `row` of a viewport whose top is the current offset.
    pub fn hit_test(&self, row: u16) -> Option<ViewportHit> {
        let y = self.state.offset.saturating_add(row as usize);
        let idx = self
            .segments
            .partition_point(|segment| segment.start_y.saturating_add(segment.height) <= y);
        match self.segments.get(idx)?.kind {
            RowKind::LoadMore => Some(ViewportHit::LoadMore),
            RowKind::Item { idx } => Some(ViewportHit::Message(idx)),
            RowKind::Gap => None,
        }
    }

    fn rebuild_segment_index(&mut self) {
        self.segments.clear();
        self.item_start_y.clear();
        self.item_start_y.reserve(self.views.len());
        self.segments.reserve(self.views.len().saturating_mul(2) + 1);

        let mut cursor = 0usize;
        if self.show_load_more {
            self.segments.push(Segment {
                kind: RowKind::LoadMore,
                start_y: 0,
                height: 1,
            });
            cursor = 1;
        }

        let count = self.views.len();
        for (idx, view) in self.views.iter().enumerate() {
            let height = view.total_rows();
            self.item_start_y.push(cursor);
            self.segments.push(Segment {
                kind: RowKind::Item { idx },
                start_y: cursor,
                height,
            });
            cursor = cursor.saturating_add(height);

            if idx + 1 < count {
                self.segments.push(Segment {
                    kind: RowKind::Gap,
                    start_y: cursor,
                    height: MESSAGE_SPACING,
                });
                cursor = cursor.saturating_add(MESSAGE_SPACING);
            }
        }

        self.total_content_height = cursor;
        self.state.total_content_height = cursor;
    }

    fn first_visible_segment_index(&self, offset: usize) -> usize {
        self.segments
            .partition_point(|segment| segment.start_y.saturating_add(segment.height) <= offset)
    }

    /// Measure visible rows and update scroll state
    fn measure_visible_rows(&mut self, area: Rect) -> Vec<RowMetrics> {
        self.state.total_content_height = self.total_content_height;
        self.state.last_viewport_height = area.height;
        if self.segments.is_empty() {
            return Vec::new();
        }

        let viewport_height = area.height as usize;
        let max_offset = self.total_content_height.saturating_sub(viewport_height);

        if let Some(target) = self.state.take_scroll_target() {
            match target {
                ScrollTarget::Bottom => {
                    self.state.offset = max_offset;
                    self.state.user_scrolled = false;
                }
                ScrollTarget::Item(target_idx) => {
                    if let Some(&item_y) = self.item_start_y.get(target_idx) {
                        let half_viewport = viewport_height / 2;
                        self.state.offset = item_y.saturating_sub(half_viewport);
                    }
                }
            }
        }

        self.state.offset = self.state.offset.min(max_offset);

        let viewport_bottom = self.state.offset.saturating_add(viewport_height);
        if viewport_height == 0 {
            return Vec::new();
        }

        let first_segment_idx = self.first_visible_segment_index(self.state.offset);
        let mut rows = Vec::new();
        for segment in self.segments.iter().skip(first_segment_idx).copied() {
            if segment.start_y >= viewport_bottom {
                break;
            }

            let segment_bottom = segment.start_y.saturating_add(segment.height);
            let first_visible_line = self.state.offset.saturating_sub(segment.start_y);
            let render_end = segment_bottom.min(viewport_bottom);
            let render_h = render_end.saturating_sub(segment.start_y + first_visible_line);
            if render_h == 0 {
                continue;
            }

            rows.push(RowMetrics {
                kind: segment.kind,
                render_h,
                first_visible_line,
            });
        }
        rows
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect, theme: &Theme) {
        if let Some(bg_color) = theme.get_background_color() {
            f.render_widget(ratatui::widgets::Clear, area);
            let background = ratatui::widgets::Block::default()
                .style(ratatui::style::Style::default().bg(bg_color));
            f.render_widget(background, area);
        }

        let rows = self.measure_visible_rows(area);
        let mut y = area.y;
        let bottom = area.y.saturating_add(area.height);

        for row in &rows {
            if y >= bottom {
                break;
            }
            let remaining = bottom.saturating_sub(y);
            let row_height = (row.render_h as u16).min(remaining);
            if row_height == 0 {
                continue;
            }
            let rect = Rect {
                x: area.x,
                y,
                width: area.width,
                height: row_height,
            };

            match row.kind {
                RowKind::LoadMore => {
                    let line = Line::from(Span::styled(
                        LOAD_MORE_LABEL,
                        theme.style(Component::LoadMore),
                    ));
                    f.buffer_mut().set_line(rect.x, rect.y, &line, rect.width);
                }
                RowKind::Item { idx } => {
                    let Some(view) = self.views.get(idx) else {
                        continue;
                    };
                    let start = row.first_visible_line;
                    let end = start.saturating_add(rect.height as usize);
                    let lines = view.line_slice(self.focus == Some(idx), start, end);
                    let buf = f.buffer_mut();
                    for (row_idx, line) in lines.iter().enumerate() {
                        buf.set_line(rect.x, rect.y + row_idx as u16, line, rect.width);
                    }
                    if view.is_selected() {
                        buf.set_style(rect, view.selected_style());
                    }
                }
                RowKind::Gap => {
                    let gap_style = theme.style(Component::ChatListBackground);
                    let buf = f.buffer_mut();
                    for dy in 0..rect.height {
                        buf.set_style(
                            Rect {
                                y: rect.y + dy,
                                height: 1,
                                ..rect
                            },
                            gap_style,
                        );
                    }
                }
            }

            y = y.saturating_add(row_height);
        }
    }
}
