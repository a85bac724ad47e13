use chrono::Local;
use std::io;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use super::paths::AppPaths;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing with a file logger named after the start time.
/// The filter is read from RUST_LOG and defaults to `info`.
///
/// The terminal UI owns stdout, so the fallback when no data directory is
/// available is stderr.
pub fn init_tracing() -> io::Result<()> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");

    if let Some(log_dir) = AppPaths::log_dir() {
        std::fs::create_dir_all(&log_dir)?;
        let file_name = format!("colloquy_{timestamp}.log");
        let file_appender = rolling::never(&log_dir, &file_name);

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::Layer::new()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(env_filter());

        tracing::subscriber::set_global_default(subscriber).map_err(io::Error::other)?;

        tracing::debug!(
            target: "colloquy::utils::tracing",
            path = %log_dir.join(&file_name).display(),
            "Tracing initialized with file output"
        );
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::Layer::default()
                    .with_writer(io::stderr)
                    .with_target(true),
            )
            .with(env_filter());

        tracing::subscriber::set_global_default(subscriber).map_err(io::Error::other)?;

        tracing::debug!(
            target: "colloquy::utils::tracing",
            "Tracing initialized with stderr output"
        );
    }

    Ok(())
}
