//! Terminal mode handling.
//!
//! Every mode we switch on is recorded in [`MODES`] after the switch
//! succeeds, so cleanup can run from the normal exit path, the panic hook and
//! early setup failures without undoing anything twice.

use ratatui::crossterm::{
    event::{
        DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
        KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

pub struct TerminalModes {
    raw: AtomicBool,
    alt_screen: AtomicBool,
    bracketed_paste: AtomicBool,
    keyboard_flags: AtomicBool,
    mouse_capture: AtomicBool,
}

impl TerminalModes {
    const fn new() -> Self {
        Self {
            raw: AtomicBool::new(false),
            alt_screen: AtomicBool::new(false),
            bracketed_paste: AtomicBool::new(false),
            keyboard_flags: AtomicBool::new(false),
            mouse_capture: AtomicBool::new(false),
        }
    }

    pub fn any_active(&self) -> bool {
        [
            &self.raw,
            &self.alt_screen,
            &self.bracketed_paste,
            &self.keyboard_flags,
            &self.mouse_capture,
        ]
        .iter()
        .any(|flag| flag.load(Ordering::Relaxed))
    }
}

pub static MODES: TerminalModes = TerminalModes::new();

/// Enter raw mode and the alternate screen, and enable paste, mouse and
/// key disambiguation (needed to tell Shift+Enter from Enter).
pub fn setup<W: Write>(w: &mut W) -> io::Result<()> {
    enable_raw_mode()?;
    MODES.raw.store(true, Ordering::Relaxed);

    execute!(w, EnterAlternateScreen)?;
    MODES.alt_screen.store(true, Ordering::Relaxed);

    execute!(w, EnableBracketedPaste)?;
    MODES.bracketed_paste.store(true, Ordering::Relaxed);

    // Not every terminal understands the kitty protocol; Alt+Enter still
    // inserts a newline there.
    if execute!(
        w,
        PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES)
    )
    .is_ok()
    {
        MODES.keyboard_flags.store(true, Ordering::Relaxed);
    }

    execute!(w, EnableMouseCapture)?;
    MODES.mouse_capture.store(true, Ordering::Relaxed);

    Ok(())
}

/// Undo every recorded mode, writing escape sequences to `writer`.
pub fn restore_with_writer<W: Write>(writer: &mut W) {
    if MODES.keyboard_flags.swap(false, Ordering::Relaxed) {
        let _ = execute!(writer, PopKeyboardEnhancementFlags);
    }
    if MODES.mouse_capture.swap(false, Ordering::Relaxed) {
        let _ = execute!(writer, DisableMouseCapture);
    }
    if MODES.bracketed_paste.swap(false, Ordering::Relaxed) {
        let _ = execute!(writer, DisableBracketedPaste);
    }
    if MODES.alt_screen.swap(false, Ordering::Relaxed) {
        let _ = execute!(writer, LeaveAlternateScreen);
    }
    if MODES.raw.swap(false, Ordering::Relaxed) {
        let _ = disable_raw_mode();
    }
    let _ = writer.flush();
}

pub fn restore() {
    let mut out = io::stdout();
    restore_with_writer(&mut out);
}

/// Restores the terminal on drop unless disarmed.
pub struct RestoreGuard {
    armed: bool,
}

impl Default for RestoreGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl RestoreGuard {
    pub fn new() -> Self {
        Self { armed: true }
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        if self.armed {
            restore();
        }
    }
}
