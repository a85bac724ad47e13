//! Scroll state for the chat viewport

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollTarget {
    Bottom,
    /// Bring the view at this index to the top of the viewport.
    Item(usize),
}

#[derive(Debug, Default)]
pub struct ChatListState {
    /// Current scroll offset (row-based)
    pub offset: usize,
    /// Pending scroll target to resolve during measurement
    scroll_target: Option<ScrollTarget>,
    /// Total content height (cached during render)
    pub total_content_height: usize,
    /// Viewport height (cached during render)
    pub last_viewport_height: u16,
    /// Track if user has manually scrolled away from bottom
    pub user_scrolled: bool,
}

impl ChatListState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scroll_to_bottom(&mut self) {
        // Resolve during render when we know total height
        self.scroll_target = Some(ScrollTarget::Bottom);
        self.user_scrolled = false;
    }

    pub fn scroll_up(&mut self, amount: usize) -> bool {
        self.scroll_target = None;
        let previous = self.offset;
        self.offset = self.offset.saturating_sub(amount);
        if self.offset != previous {
            self.user_scrolled = true;
            true
        } else {
            false
        }
    }

    pub fn scroll_down(&mut self, amount: usize) -> bool {
        self.scroll_target = None;
        let previous = self.offset;
        self.offset = self.offset.saturating_add(amount);
        if let Some(max_offset) = self.max_offset() {
            self.offset = self.offset.min(max_offset);
        }
        if self.offset != previous {
            self.user_scrolled = true;
            true
        } else {
            false
        }
    }

    pub fn scroll_to_top(&mut self) {
        self.offset = 0;
        self.scroll_target = None;
        self.user_scrolled = true;
    }

    pub fn scroll_to_item(&mut self, index: usize) {
        self.scroll_target = Some(ScrollTarget::Item(index));
        self.user_scrolled = true;
    }

    /// Pin the offset to an exact row, dropping any pending target.
    pub fn set_offset(&mut self, offset: usize) {
        self.scroll_target = None;
        self.offset = offset;
        self.user_scrolled = true;
    }

    pub fn is_at_top(&self) -> bool {
        self.offset == 0 && self.scroll_target.is_none()
    }

    /// Following the newest message, or scrolled all the way down.
    pub fn is_at_bottom(&self) -> bool {
        match self.max_offset() {
            None => true,
            Some(max) => !self.user_scrolled || self.offset >= max,
        }
    }

    pub fn pending_target(&self) -> Option<ScrollTarget> {
        self.scroll_target
    }

    pub fn take_scroll_target(&mut self) -> Option<ScrollTarget> {
        self.scroll_target.take()
    }

    /// Largest offset that still fills the viewport; unknown until the
    /// first render has measured both heights.
    fn max_offset(&self) -> Option<usize> {
        let viewport = usize::from(self.last_viewport_height);
        (self.total_content_height > 0 && viewport > 0)
            .then(|| self.total_content_height.saturating_sub(viewport))
    }
}
