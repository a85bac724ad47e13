//! Incremental loading of older history into the chat viewport.
//!
//! Pages are counted backwards from the newest message of the history as it
//! was when the controller was last reset. Messages appended during the
//! session are already on screen and never shift the page bounds.

use colloquy_core::error::PersistenceError;
use colloquy_core::history::{HistoryStore, PageSlice, page_bounds};
use colloquy_core::message::Message;
use tracing::{debug, info};

use crate::tui::chat_list_state::ScrollTarget;
use crate::tui::chat_viewport::ChatViewport;
use crate::tui::message_view::MessageView;

pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    LoadingMore,
}

/// Bounds of the page to read, produced by [`PaginationController::begin_load_more`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub start: usize,
    pub end: usize,
    pub total: usize,
}

impl PageRequest {
    pub fn read(&self, store: &HistoryStore) -> Result<PageSlice, PersistenceError> {
        Ok(PageSlice {
            start: self.start,
            end: self.end,
            total: self.total,
            messages: store.read_slice(self.start, self.end)?,
        })
    }
}

#[derive(Debug)]
pub struct PaginationController {
    current_page: usize,
    page_size: usize,
    has_more: bool,
    total: usize,
    state: LoadState,
}

impl Default for PaginationController {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl PaginationController {
    pub fn new(page_size: usize) -> Self {
        Self {
            current_page: 0,
            page_size: page_size.max(1),
            has_more: false,
            total: 0,
            state: LoadState::Idle,
        }
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == LoadState::LoadingMore
    }

    /// Bounds of the first page for a history of `total` messages.
    pub fn initial_page(&self, total: usize) -> (usize, usize) {
        page_bounds(total, self.page_size, 0)
    }

    /// Start over at page 0 after the initial load, a clear or an import.
    pub fn reset(&mut self, viewport: &mut ChatViewport, total: usize) {
        self.current_page = 0;
        self.total = total;
        self.has_more = self.page_size < total;
        self.state = LoadState::Idle;
        viewport.set_load_more_visible(self.has_more);
        debug!(
            target: "colloquy::pagination",
            total,
            has_more = self.has_more,
            "Pagination reset"
        );
    }

    /// Move to the next page. Returns `None` while a load is in flight or
    /// when there is nothing older to load.
    pub fn begin_load_more(&mut self, viewport: &ChatViewport) -> Option<PageRequest> {
        if self.state == LoadState::LoadingMore || !self.has_more {
            return None;
        }
        debug!(
            target: "colloquy::pagination",
            offset = viewport.offset(),
            "Load more requested"
        );
        self.current_page += 1;
        self.state = LoadState::LoadingMore;
        let (start, end) = page_bounds(self.total, self.page_size, self.current_page);
        debug!(
            target: "colloquy::pagination",
            page = self.current_page,
            start,
            end,
            "Loading older messages"
        );
        Some(PageRequest {
            page: self.current_page,
            start,
            end,
            total: self.total,
        })
    }

    /// Insert a loaded page above the current views. The offset moves down by
    /// exactly the rows inserted above the previously first view, so changes
    /// made while the page was loading do not move what the user sees.
    /// Returns the number of views inserted.
    pub fn finish_load_more(
        &mut self,
        viewport: &mut ChatViewport,
        slice: PageSlice,
        make_view: impl FnMut(Message) -> MessageView,
    ) -> usize {
        self.state = LoadState::Idle;

        if slice.messages.is_empty() {
            self.has_more = false;
            viewport.set_load_more_visible(false);
            return 0;
        }

        let count = slice.messages.len();
        let views: Vec<MessageView> = slice.messages.into_iter().map(make_view).collect();
        let rows_before = viewport.rows_above(0);
        viewport.prepend(views);
        self.has_more = slice.start > 0;
        viewport.set_load_more_visible(self.has_more);

        // Includes the gap after the page and the header if it went away.
        let added = viewport.rows_above(count).saturating_sub(rows_before);
        if viewport.state().pending_target() != Some(ScrollTarget::Bottom) {
            viewport.set_offset(viewport.offset().saturating_add(added));
        }

        info!(
            target: "colloquy::pagination",
            page = self.current_page,
            count,
            has_more = self.has_more,
            "Loaded older messages"
        );
        count
    }

    /// Return to `Idle` after a failed page read.
    pub fn abort_load_more(&mut self) {
        if self.state == LoadState::LoadingMore {
            self.current_page = self.current_page.saturating_sub(1);
            self.state = LoadState::Idle;
        }
    }

    /// Read and insert the next page in one step.
    pub fn load_more(
        &mut self,
        viewport: &mut ChatViewport,
        store: &HistoryStore,
        make_view: impl FnMut(Message) -> MessageView,
    ) -> Result<usize, PersistenceError> {
        let Some(request) = self.begin_load_more(viewport) else {
            return Ok(0);
        };
        match request.read(store) {
            Ok(slice) => Ok(self.finish_load_more(viewport, slice, make_view)),
            Err(e) => {
                self.abort_load_more();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::chat_viewport::ViewportHit;
    use crate::tui::height::FontMetrics;
    use crate::tui::message_view::AttachmentOutcome;
    use crate::tui::theme::Theme;
    use chrono::NaiveDate;
    use colloquy_core::message::Role;
    use tempfile::TempDir;

    fn message(i: usize) -> Message {
        let timestamp = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::seconds(i as i64);
        Message::new(Role::User, format!("message {i}"), timestamp, None).unwrap()
    }

    fn make_view(message: Message) -> MessageView {
        MessageView::new(
            message,
            AttachmentOutcome::None,
            &Theme::default(),
            FontMetrics::TERMINAL,
            5,
        )
    }

    fn store_with(n: usize) -> (TempDir, HistoryStore) {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::open(dir.path().join("history.json"));
        let messages: Vec<_> = (0..n).map(message).collect();
        store.overwrite(&messages).unwrap();
        (dir, store)
    }

    fn initial(
        store: &HistoryStore,
        pagination: &mut PaginationController,
    ) -> ChatViewport {
        let mut viewport = ChatViewport::new();
        viewport.set_width(40);
        let total = store.len().unwrap();
        let (start, end) = pagination.initial_page(total);
        let views = store
            .read_slice(start, end)
            .unwrap()
            .into_iter()
            .map(make_view)
            .collect();
        viewport.replace_all(views);
        pagination.reset(&mut viewport, total);
        viewport
    }

    fn contents(viewport: &ChatViewport) -> Vec<String> {
        viewport
            .views()
            .iter()
            .map(|v| v.message().content().to_string())
            .collect()
    }

    #[test]
    fn forty_five_messages_load_in_three_pages() {
        let (_dir, store) = store_with(45);
        let mut pagination = PaginationController::new(20);
        let mut viewport = initial(&store, &mut pagination);
        assert_eq!(viewport.len(), 20);
        assert!(pagination.has_more());
        assert!(viewport.load_more_visible());

        assert_eq!(pagination.load_more(&mut viewport, &store, make_view).unwrap(), 20);
        assert_eq!(pagination.current_page(), 1);
        assert!(pagination.has_more());
        assert_eq!(viewport.views()[0].message().content(), "message 5");

        assert_eq!(pagination.load_more(&mut viewport, &store, make_view).unwrap(), 5);
        assert_eq!(pagination.current_page(), 2);
        assert!(!pagination.has_more());
        assert!(!viewport.load_more_visible());

        let expected: Vec<_> = (0..45).map(|i| format!("message {i}")).collect();
        assert_eq!(contents(&viewport), expected);
    }

    #[test]
    fn load_more_without_more_is_a_no_op() {
        let (_dir, store) = store_with(12);
        let mut pagination = PaginationController::new(20);
        let mut viewport = initial(&store, &mut pagination);
        assert!(!pagination.has_more());
        let offset = viewport.offset();

        assert_eq!(pagination.load_more(&mut viewport, &store, make_view).unwrap(), 0);
        assert!(pagination.begin_load_more(&viewport).is_none());
        assert_eq!(pagination.current_page(), 0);
        assert_eq!(viewport.len(), 12);
        assert_eq!(viewport.offset(), offset);
    }

    #[test]
    fn second_begin_while_loading_is_ignored() {
        let (_dir, store) = store_with(60);
        let mut pagination = PaginationController::new(20);
        let viewport = initial(&store, &mut pagination);
        let first = pagination.begin_load_more(&viewport).unwrap();
        assert_eq!((first.start, first.end), (20, 40));
        assert!(pagination.begin_load_more(&viewport).is_none());
        assert_eq!(pagination.current_page(), 1);
    }

    #[test]
    fn abort_rolls_the_page_back() {
        let (_dir, store) = store_with(60);
        let mut pagination = PaginationController::new(20);
        let viewport = initial(&store, &mut pagination);
        pagination.begin_load_more(&viewport).unwrap();
        pagination.abort_load_more();
        assert_eq!(pagination.state(), LoadState::Idle);
        assert_eq!(pagination.current_page(), 0);
        let again = pagination.begin_load_more(&viewport).unwrap();
        assert_eq!(again.page, 1);
    }

    #[test]
    fn empty_slice_ends_pagination() {
        let (_dir, store) = store_with(30);
        let mut pagination = PaginationController::new(20);
        let mut viewport = initial(&store, &mut pagination);
        let request = pagination.begin_load_more(&viewport).unwrap();
        let empty = PageSlice {
            start: request.start,
            end: request.start,
            total: request.total,
            messages: Vec::new(),
        };
        assert_eq!(pagination.finish_load_more(&mut viewport, empty, make_view), 0);
        assert!(!pagination.has_more());
        assert!(!viewport.load_more_visible());
    }

    #[test]
    fn prepending_keeps_the_visible_message_in_place() {
        let (_dir, store) = store_with(45);
        let mut pagination = PaginationController::new(20);
        let mut viewport = initial(&store, &mut pagination);
        viewport.set_offset(0);
        // Row 0 is the load-more header, row 1 the first loaded message.
        assert_eq!(viewport.hit_test(1), Some(ViewportHit::Message(0)));

        pagination.load_more(&mut viewport, &store, make_view).unwrap();
        assert_eq!(viewport.hit_test(1), Some(ViewportHit::Message(20)));
        assert_eq!(viewport.views()[20].message().content(), "message 25");
    }

    #[test]
    fn content_changes_during_a_load_do_not_move_the_visible_message() {
        let (_dir, store) = store_with(45);
        let mut pagination = PaginationController::new(20);
        let mut viewport = initial(&store, &mut pagination);
        viewport.state_mut().last_viewport_height = 10;
        viewport.set_offset(0);
        assert_eq!(viewport.hit_test(1), Some(ViewportHit::Message(0)));

        let request = pagination.begin_load_more(&viewport).unwrap();
        // A reply lands at the bottom while the page is being read.
        viewport.push(make_view(message(45)));
        let slice = request.read(&store).unwrap();
        pagination.finish_load_more(&mut viewport, slice, make_view);

        assert_eq!(viewport.hit_test(1), Some(ViewportHit::Message(20)));
        assert_eq!(viewport.views()[20].message().content(), "message 25");
    }

    #[test]
    fn last_page_accounts_for_the_header_going_away() {
        let (_dir, store) = store_with(25);
        let mut pagination = PaginationController::new(20);
        let mut viewport = initial(&store, &mut pagination);
        viewport.set_offset(0);
        assert_eq!(viewport.hit_test(1), Some(ViewportHit::Message(0)));

        pagination.load_more(&mut viewport, &store, make_view).unwrap();
        assert!(!viewport.load_more_visible());
        // No header row any more, so the same message sits at row 0.
        assert_eq!(viewport.hit_test(0), Some(ViewportHit::Message(5)));
        assert_eq!(viewport.views()[5].message().content(), "message 5");
    }

    #[test]
    fn messages_appended_later_do_not_shift_pages() {
        let (_dir, store) = store_with(45);
        let mut pagination = PaginationController::new(20);
        let mut viewport = initial(&store, &mut pagination);
        store.append_all(&[message(45), message(46)]).unwrap();
        viewport.push(make_view(message(45)));
        viewport.push(make_view(message(46)));

        pagination.load_more(&mut viewport, &store, make_view).unwrap();
        assert_eq!(viewport.views()[19].message().content(), "message 24");
        assert_eq!(viewport.views()[20].message().content(), "message 25");
    }
}
