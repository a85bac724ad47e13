//! Plain-text transcript export.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::Result;
use crate::message::Message;

/// Render messages as `[HH:MM:SS] Role: content` blocks separated by blank lines.
pub fn render_transcript<'a>(messages: impl IntoIterator<Item = &'a Message>) -> String {
    let mut out = String::new();
    for message in messages {
        let _ = writeln!(
            out,
            "[{}] {}: {}",
            message.timestamp().format("%H:%M:%S"),
            message.role().label(),
            message.content()
        );
        if let Some(attachment) = message.attachment() {
            let _ = writeln!(out, "[Image]: {attachment}");
        }
        out.push('\n');
    }
    out
}

pub fn export_transcript(messages: &[Message], destination: &Path) -> Result<()> {
    std::fs::write(destination, render_transcript(messages))?;
    tracing::info!(
        target: "colloquy::transcript",
        path = %destination.display(),
        count = messages.len(),
        "Transcript exported"
    );
    Ok(())
}
