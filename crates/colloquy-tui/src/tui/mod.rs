//! TUI module for the colloquy client
//!
//! This module implements the terminal user interface using ratatui.

use std::io::{self, Stdout};
use std::time::Duration;

use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::crossterm::event::{self, Event, KeyEventKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use colloquy_core::config::Config;

pub mod app;
pub mod chat_list_state;
pub mod chat_viewport;
pub mod commands;
pub mod events;
pub mod height;
pub mod highlight;
pub mod input;
pub mod message_view;
pub mod pagination;
pub mod status_bar;
pub mod terminal;
pub mod theme;

pub use app::{App, Services};
use events::TaskEvent;

/// How often to update the spinner animation (when a request is in flight)
const SPINNER_UPDATE_INTERVAL: Duration = Duration::from_millis(100);

pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    app: App,
}

impl Tui {
    /// Put the terminal into TUI mode and wrap `app`.
    pub fn new(app: App) -> Result<Self> {
        let mut stdout = io::stdout();
        terminal::setup(&mut stdout)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self { terminal, app })
    }

    fn draw(&mut self) -> Result<()> {
        let app = &mut self.app;
        self.terminal.draw(|f| app.draw(f))?;
        Ok(())
    }

    pub fn cleanup_terminal(&mut self) -> Result<()> {
        terminal::restore_with_writer(self.terminal.backend_mut());
        self.terminal.show_cursor()?;
        Ok(())
    }

    pub async fn run(&mut self, mut task_rx: mpsc::UnboundedReceiver<TaskEvent>) -> Result<()> {
        info!(target: "colloquy::tui", "Starting TUI");
        self.app.start();

        let (term_event_tx, mut term_event_rx) = mpsc::channel::<Result<Event>>(1);
        let input_handle: JoinHandle<()> = tokio::spawn(async move {
            loop {
                // Non-blocking poll
                if event::poll(Duration::ZERO).unwrap_or(false) {
                    match event::read() {
                        Ok(evt) => {
                            if term_event_tx.send(Ok(evt)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                            debug!(target: "colloquy::input", "Ignoring interrupted syscall");
                        }
                        Err(e) => {
                            warn!(target: "colloquy::input", "Input error: {}", e);
                            let _ = term_event_tx.send(Err(Error::from(e))).await;
                            break;
                        }
                    }
                } else {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        });

        let mut needs_redraw = true;
        let mut tick = tokio::time::interval(SPINNER_UPDATE_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let outcome = loop {
            if self.app.should_quit() {
                break Ok(());
            }
            if needs_redraw {
                if let Err(e) = self.draw() {
                    break Err(e);
                }
                needs_redraw = false;
            }

            tokio::select! {
                Some(event_res) = term_event_rx.recv() => {
                    match event_res {
                        Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                            self.app.handle_key(key);
                            needs_redraw = true;
                        }
                        Ok(Event::Mouse(mouse)) => {
                            self.app.handle_mouse(mouse);
                            needs_redraw = true;
                        }
                        Ok(Event::Paste(data)) => {
                            debug!(target: "colloquy::tui", "Pasted {} chars", data.len());
                            self.app.handle_paste(&data);
                            needs_redraw = true;
                        }
                        Ok(Event::Resize(..)) => needs_redraw = true,
                        Ok(_) => {}
                        Err(e) => {
                            error!(target: "colloquy::tui", "Fatal input error: {}. Exiting.", e);
                            break Err(e);
                        }
                    }
                }
                Some(task_event) = task_rx.recv() => {
                    self.app.handle_task_event(task_event);
                    needs_redraw = true;
                }
                _ = tick.tick() => {
                    needs_redraw |= self.app.on_tick();
                }
            }
        };

        input_handle.abort();
        self.cleanup_terminal()?;
        outcome
    }
}

/// Restore the terminal before the default panic output is printed.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        terminal::restore();
        report_panic(panic_info);
    }));
}

#[expect(clippy::print_stderr)]
fn report_panic(panic_info: &std::panic::PanicHookInfo<'_>) {
    eprintln!("Application panicked:");
    eprintln!("{panic_info}");
}

/// High-level entry point for running the TUI
pub async fn run_tui(config: &Config, services: Services) -> Result<()> {
    setup_panic_hook();
    let mut guard = terminal::RestoreGuard::new();
    let (app, task_rx) = App::new(config, services);
    let mut tui = Tui::new(app)?;
    let result = tui.run(task_rx).await;
    guard.disarm();
    if let Err(e) = &result {
        error!(target: "colloquy::tui", "TUI exited with error: {}", e);
    }
    result
}
