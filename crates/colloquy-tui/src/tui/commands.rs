use std::path::PathBuf;
use strum::{Display, EnumIter, IntoEnumIterator};
use thiserror::Error;

use colloquy_core::config::ThemeName;

/// Errors that can occur when parsing slash commands
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: /{0}")]
    UnknownCommand(String),
    #[error("Missing argument. Usage: {usage}")]
    MissingArgument { usage: String },
    #[error("Invalid argument '{value}'. Usage: {usage}")]
    InvalidArgument { value: String, usage: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeChoice {
    Toggle,
    Named(ThemeName),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    /// Stage a local image for the next message
    Image(PathBuf),
    /// Stage a remote image URL for the next message
    Url(String),
    /// Attach a text file to the next message
    File(PathBuf),
    /// Drop all staged attachments
    Detach,
    /// Show or switch the model
    Model(Option<String>),
    /// Refresh and list available models
    Models,
    Theme(ThemeChoice),
    Clear,
    /// Write a transcript of the selected messages, or of all messages
    Export(PathBuf),
    /// Save the history document to another file
    Save(PathBuf),
    /// Replace the history with another history document
    Import(PathBuf),
    SelectAll,
    Help,
}

/// All slash command names, used for exhaustive iteration and help text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum CommandType {
    Image,
    Url,
    File,
    Detach,
    Model,
    Models,
    Theme,
    Clear,
    Export,
    Save,
    Import,
    SelectAll,
    Help,
}

impl CommandType {
    pub fn command_name(&self) -> String {
        self.to_string()
    }

    pub fn description(&self) -> &'static str {
        match self {
            CommandType::Image => "Attach a local image (repeat for up to 10)",
            CommandType::Url => "Attach an image by URL",
            CommandType::File => "Attach a .py, .txt or .json file",
            CommandType::Detach => "Remove staged attachments",
            CommandType::Model => "Show or change the current model",
            CommandType::Models => "Reload the model list",
            CommandType::Theme => "Switch between dark and light themes",
            CommandType::Clear => "Delete the whole conversation",
            CommandType::Export => "Export selected (or all) messages as text",
            CommandType::Save => "Save the history file to another path",
            CommandType::Import => "Load a saved history file",
            CommandType::SelectAll => "Select every loaded message",
            CommandType::Help => "Show commands and key bindings",
        }
    }

    pub fn usage(&self) -> String {
        let name = self.command_name();
        match self {
            CommandType::Image | CommandType::File => format!("/{name} <path>"),
            CommandType::Url => format!("/{name} <http(s) url>"),
            CommandType::Model => format!("/{name} [model_id]"),
            CommandType::Theme => format!("/{name} [dark|light]"),
            CommandType::Export | CommandType::Save | CommandType::Import => {
                format!("/{name} <file>")
            }
            _ => format!("/{name}"),
        }
    }
}

impl SlashCommand {
    /// Parse user input. Returns `None` for input that is not a command.
    pub fn parse(input: &str) -> Option<Result<Self, CommandError>> {
        let command = input.trim().strip_prefix('/')?;
        Some(Self::parse_without_slash(command))
    }

    fn parse_without_slash(command: &str) -> Result<Self, CommandError> {
        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };
        let argument = (!rest.is_empty()).then(|| rest.to_string());

        let Some(cmd_type) = CommandType::iter().find(|t| t.command_name() == name) else {
            return Err(CommandError::UnknownCommand(name.to_string()));
        };

        let required = |argument: Option<String>| {
            argument.ok_or_else(|| CommandError::MissingArgument {
                usage: cmd_type.usage(),
            })
        };

        Ok(match cmd_type {
            CommandType::Image => SlashCommand::Image(PathBuf::from(required(argument)?)),
            CommandType::Url => SlashCommand::Url(required(argument)?),
            CommandType::File => SlashCommand::File(PathBuf::from(required(argument)?)),
            CommandType::Detach => SlashCommand::Detach,
            CommandType::Model => SlashCommand::Model(argument),
            CommandType::Models => SlashCommand::Models,
            CommandType::Theme => SlashCommand::Theme(match argument.as_deref() {
                None => ThemeChoice::Toggle,
                Some("dark") => ThemeChoice::Named(ThemeName::Dark),
                Some("light") => ThemeChoice::Named(ThemeName::Light),
                Some(other) => {
                    return Err(CommandError::InvalidArgument {
                        value: other.to_string(),
                        usage: cmd_type.usage(),
                    });
                }
            }),
            CommandType::Clear => SlashCommand::Clear,
            CommandType::Export => SlashCommand::Export(PathBuf::from(required(argument)?)),
            CommandType::Save => SlashCommand::Save(PathBuf::from(required(argument)?)),
            CommandType::Import => SlashCommand::Import(PathBuf::from(required(argument)?)),
            CommandType::SelectAll => SlashCommand::SelectAll,
            CommandType::Help => SlashCommand::Help,
        })
    }
}

/// One line per command: usage and description.
pub fn help_lines() -> Vec<String> {
    CommandType::iter()
        .map(|t| format!("{:<24} {}", t.usage(), t.description()))
        .collect()
}
