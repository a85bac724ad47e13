pub mod error;
pub mod tui;

// Expose the main TUI entry point
pub use tui::{App, Services, Tui, run_tui};
