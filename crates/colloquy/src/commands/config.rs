use super::Command;
use crate::cli::ConfigCommands;
use crate::error::Result as CliResult;
use async_trait::async_trait;
use colloquy_core::config::Config;
use eyre::Result;
use std::io::Write;
use std::path::PathBuf;

pub struct ConfigCommand {
    pub action: ConfigCommands,
    pub path: PathBuf,
    /// Effective configuration, including command-line overrides.
    pub effective: Config,
}

#[async_trait]
impl Command for ConfigCommand {
    async fn execute(&self) -> Result<()> {
        self.run(&mut std::io::stdout())?;
        Ok(())
    }
}

impl ConfigCommand {
    pub fn run(&self, out: &mut impl Write) -> CliResult<()> {
        match self.action {
            ConfigCommands::Show => {
                writeln!(out, "Config file: {}", self.path.display())?;
                writeln!(out, "\n{}", self.effective.to_toml()?)?;
            }
            ConfigCommands::Reset => {
                Config::default().save_to(&self.path)?;
                writeln!(out, "Wrote default config to {}", self.path.display())?;
            }
        }
        Ok(())
    }
}
