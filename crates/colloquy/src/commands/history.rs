//! Offline history maintenance: transcript export, import and clear.

use super::Command;
use crate::error::{Error, Result as CliResult};
use async_trait::async_trait;
use colloquy_core::history::HistoryStore;
use colloquy_core::message::Attachment;
use colloquy_core::transcript::export_transcript;
use colloquy_core::upload::{UploadService, hosted_image_id};
use eyre::Result;
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

pub struct ExportCommand {
    pub store: HistoryStore,
    pub output: PathBuf,
}

impl ExportCommand {
    pub fn run(&self, out: &mut impl Write) -> CliResult<usize> {
        let messages = self.store.load_all()?;
        export_transcript(&messages, &self.output)?;
        writeln!(
            out,
            "Exported {} messages to {}",
            messages.len(),
            self.output.display()
        )?;
        Ok(messages.len())
    }
}

#[async_trait]
impl Command for ExportCommand {
    async fn execute(&self) -> Result<()> {
        self.run(&mut std::io::stdout())?;
        Ok(())
    }
}

pub struct ImportCommand {
    pub store: HistoryStore,
    pub input: PathBuf,
}

impl ImportCommand {
    pub fn run(&self, out: &mut impl Write) -> CliResult<usize> {
        let imported = self.store.import_from(&self.input)?;
        info!(
            target: "colloquy::commands",
            count = imported.len(),
            source = %self.input.display(),
            "History imported"
        );
        writeln!(
            out,
            "Imported {} messages into {}",
            imported.len(),
            self.store.path().display()
        )?;
        Ok(imported.len())
    }
}

#[async_trait]
impl Command for ImportCommand {
    async fn execute(&self) -> Result<()> {
        self.run(&mut std::io::stdout())?;
        Ok(())
    }
}

pub struct ClearCommand {
    pub store: HistoryStore,
    pub uploader: Option<Box<dyn UploadService>>,
    pub confirmed: bool,
}

impl ClearCommand {
    /// Empty the history, then delete the sidecar images it referenced.
    /// Returns the number of messages removed.
    pub async fn run(&self, out: &mut (impl Write + Send)) -> CliResult<usize> {
        if !self.confirmed {
            return Err(Error::Config(
                "Refusing to clear the history without --yes".to_string(),
            ));
        }
        let messages = self.store.load_all()?;
        self.store.overwrite(&[])?;

        if let Some(uploader) = &self.uploader {
            let prefix = uploader.uploads_prefix();
            let hosted: Vec<String> = messages
                .iter()
                .filter_map(|m| match m.attachment() {
                    Some(Attachment::RemoteUrl(url)) => hosted_image_id(&prefix, url.as_str()),
                    _ => None,
                })
                .collect();
            let mut deleted = 0;
            for id in &hosted {
                match uploader.delete(id).await {
                    Ok(()) => deleted += 1,
                    Err(e) => {
                        warn!(target: "colloquy::commands", image_id = %id, "Failed to delete hosted image: {}", e);
                    }
                }
            }
            if !hosted.is_empty() {
                writeln!(out, "Deleted {deleted} of {} hosted images", hosted.len())?;
            }
        }

        writeln!(out, "Cleared {} messages", messages.len())?;
        Ok(messages.len())
    }
}

#[async_trait]
impl Command for ClearCommand {
    async fn execute(&self) -> Result<()> {
        self.run(&mut std::io::stdout()).await?;
        Ok(())
    }
}
