use clap::{Parser, Subcommand};
use std::path::PathBuf;

use colloquy_core::config::{Config, ThemeName};

use crate::error::Error;

/// Terminal chat client for OpenAI-compatible model endpoints.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None, author)]
pub struct Cli {
    /// Model to use for new messages (e.g. 'meta-llama/Llama-3.3-70B-Instruct')
    #[arg(short, long, env = "COLLOQUY_MODEL")]
    pub model: Option<String>,

    /// Theme for the TUI: dark or light
    #[arg(long, env = "COLLOQUY_THEME")]
    pub theme: Option<String>,

    /// History document to read and write (defaults to the data directory)
    #[arg(long, env = "COLLOQUY_HISTORY")]
    pub history: Option<PathBuf>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "COLLOQUY_BASE_URL")]
    pub base_url: Option<String>,

    /// Configuration file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Launch the interactive terminal UI (default)
    Tui,
    /// Write the history as a plain-text transcript
    Export {
        /// Destination file
        output: PathBuf,
    },
    /// Replace the history with a saved history document
    Import {
        /// History document to load
        input: PathBuf,
    },
    /// Delete the whole history and any images hosted for it
    Clear {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// List the models the API offers
    Models,
    /// Store the API key in the system keyring (read from stdin)
    Login,
    /// Show or reset the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Rewrite the configuration file with defaults
    Reset,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) -> Result<(), Error> {
        if let Some(model) = &self.model {
            config.model = Some(model.clone());
        }
        if let Some(theme) = &self.theme {
            config.theme = theme.parse::<ThemeName>()?;
        }
        if let Some(history) = &self.history {
            config.history_file = Some(history.clone());
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&["colloquy"], None)]
    #[case(&["colloquy", "models"], Some(Commands::Models))]
    #[case(&["colloquy", "clear", "--yes"], Some(Commands::Clear { yes: true }))]
    #[case(
        &["colloquy", "export", "out.txt"],
        Some(Commands::Export { output: PathBuf::from("out.txt") })
    )]
    #[case(
        &["colloquy", "config", "reset"],
        Some(Commands::Config { action: ConfigCommands::Reset })
    )]
    fn parses_subcommands(#[case] args: &[&str], #[case] expected: Option<Commands>) {
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.command, expected);
    }

    #[test]
    fn overrides_replace_config_values() {
        let cli = Cli::try_parse_from([
            "colloquy",
            "--model",
            "llava",
            "--theme",
            "light",
            "--history",
            "/tmp/h.json",
            "--base-url",
            "http://localhost:8080/v1",
        ])
        .unwrap();
        let mut config = Config::default();
        cli.apply_overrides(&mut config).unwrap();
        assert_eq!(config.model.as_deref(), Some("llava"));
        assert_eq!(config.theme, ThemeName::Light);
        assert_eq!(config.history_path(), PathBuf::from("/tmp/h.json"));
        assert_eq!(config.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn unknown_theme_is_an_error() {
        let cli = Cli::try_parse_from(["colloquy", "--theme", "solarized"]).unwrap();
        let mut config = Config::default();
        assert!(cli.apply_overrides(&mut config).is_err());
    }
}
