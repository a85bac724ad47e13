//! Built-in dark and light themes.
//!
//! A [`Theme`] is a value object handed to every view constructor. Views bake
//! their styles in when they are built, so switching themes means rebuilding
//! the views (see `ChatViewport::rebuild_all`).

use colloquy_core::config::ThemeName;
use ratatui::style::{Color, Modifier, Style};
use std::collections::HashMap;
use std::fmt;

/// All themeable components in the TUI
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum Component {
    // Status bar
    StatusBar,
    StatusInfo,
    StatusWarn,
    StatusError,
    ModelInfo,

    // Input panel
    InputBorder,
    InputBorderBusy,
    InputTitle,
    StagedAttachment,

    // Chat list
    ChatListBackground,
    UserHeader,
    AssistantHeader,
    Timestamp,
    MessageText,
    SelectedMessage,
    FocusMarker,
    CollapsedMarker,
    LoadMore,
    ImageLabel,
    ImageError,

    // Code
    CodeFence,
    CodeBlock,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub name: ThemeName,
    styles: HashMap<Component, Style>,
    background_color: Option<Color>,
    syntax_theme: &'static str,
}

impl Theme {
    pub fn from_name(name: ThemeName) -> Self {
        match name {
            ThemeName::Dark => dark_theme(),
            ThemeName::Light => light_theme(),
        }
    }

    /// Get a style for a component, falling back to default if not found
    pub fn style(&self, component: Component) -> Style {
        self.styles.get(&component).copied().unwrap_or_default()
    }

    pub fn get_background_color(&self) -> Option<Color> {
        self.background_color
    }

    /// Name of the syntect highlighting theme paired with this theme.
    pub fn syntax_theme(&self) -> &'static str {
        self.syntax_theme
    }
}

impl Default for Theme {
    fn default() -> Self {
        dark_theme()
    }
}

fn dark_theme() -> Theme {
    let mut styles = HashMap::new();

    styles.insert(
        Component::StatusBar,
        Style::default().fg(Color::Gray).bg(Color::Rgb(30, 30, 30)),
    );
    styles.insert(Component::StatusInfo, Style::default().fg(Color::LightCyan));
    styles.insert(Component::StatusWarn, Style::default().fg(Color::Yellow));
    styles.insert(
        Component::StatusError,
        Style::default()
            .fg(Color::LightRed)
            .add_modifier(Modifier::BOLD),
    );
    styles.insert(
        Component::ModelInfo,
        Style::default().fg(Color::LightMagenta),
    );

    styles.insert(Component::InputBorder, Style::default().fg(Color::DarkGray));
    styles.insert(Component::InputBorderBusy, Style::default().fg(Color::Yellow));
    styles.insert(Component::InputTitle, Style::default().fg(Color::Gray));
    styles.insert(
        Component::StagedAttachment,
        Style::default().fg(Color::Cyan),
    );

    styles.insert(Component::ChatListBackground, Style::default());
    styles.insert(
        Component::UserHeader,
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
    );
    styles.insert(
        Component::AssistantHeader,
        Style::default()
            .fg(Color::Blue)
            .add_modifier(Modifier::BOLD),
    );
    styles.insert(Component::Timestamp, Style::default().fg(Color::DarkGray));
    styles.insert(Component::MessageText, Style::default().fg(Color::White));
    styles.insert(
        Component::SelectedMessage,
        Style::default().bg(Color::Rgb(45, 55, 72)),
    );
    styles.insert(Component::FocusMarker, Style::default().fg(Color::Yellow));
    styles.insert(
        Component::CollapsedMarker,
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    );
    styles.insert(
        Component::LoadMore,
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::UNDERLINED),
    );
    styles.insert(Component::ImageLabel, Style::default().fg(Color::Magenta));
    styles.insert(Component::ImageError, Style::default().fg(Color::Red));

    styles.insert(Component::CodeFence, Style::default().fg(Color::DarkGray));
    styles.insert(Component::CodeBlock, Style::default().fg(Color::Gray));

    Theme {
        name: ThemeName::Dark,
        styles,
        background_color: None,
        syntax_theme: "base16-ocean.dark",
    }
}

fn light_theme() -> Theme {
    let mut styles = HashMap::new();

    styles.insert(
        Component::StatusBar,
        Style::default()
            .fg(Color::Black)
            .bg(Color::Rgb(225, 225, 225)),
    );
    styles.insert(Component::StatusInfo, Style::default().fg(Color::Blue));
    styles.insert(
        Component::StatusWarn,
        Style::default().fg(Color::Rgb(160, 100, 0)),
    );
    styles.insert(
        Component::StatusError,
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    );
    styles.insert(Component::ModelInfo, Style::default().fg(Color::Magenta));

    styles.insert(Component::InputBorder, Style::default().fg(Color::Gray));
    styles.insert(
        Component::InputBorderBusy,
        Style::default().fg(Color::Rgb(160, 100, 0)),
    );
    styles.insert(Component::InputTitle, Style::default().fg(Color::DarkGray));
    styles.insert(Component::StagedAttachment, Style::default().fg(Color::Blue));

    styles.insert(
        Component::ChatListBackground,
        Style::default().bg(Color::Rgb(250, 250, 250)),
    );
    styles.insert(
        Component::UserHeader,
        Style::default()
            .fg(Color::Rgb(0, 120, 0))
            .add_modifier(Modifier::BOLD),
    );
    styles.insert(
        Component::AssistantHeader,
        Style::default()
            .fg(Color::Rgb(0, 70, 170))
            .add_modifier(Modifier::BOLD),
    );
    styles.insert(Component::Timestamp, Style::default().fg(Color::Gray));
    styles.insert(Component::MessageText, Style::default().fg(Color::Black));
    styles.insert(
        Component::SelectedMessage,
        Style::default().bg(Color::Rgb(210, 225, 245)),
    );
    styles.insert(
        Component::FocusMarker,
        Style::default().fg(Color::Rgb(160, 100, 0)),
    );
    styles.insert(
        Component::CollapsedMarker,
        Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
    );
    styles.insert(
        Component::LoadMore,
        Style::default()
            .fg(Color::Blue)
            .add_modifier(Modifier::UNDERLINED),
    );
    styles.insert(
        Component::ImageLabel,
        Style::default().fg(Color::Rgb(130, 0, 130)),
    );
    styles.insert(Component::ImageError, Style::default().fg(Color::Red));

    styles.insert(Component::CodeFence, Style::default().fg(Color::Gray));
    styles.insert(Component::CodeBlock, Style::default().fg(Color::DarkGray));

    Theme {
        name: ThemeName::Light,
        styles,
        background_color: Some(Color::Rgb(250, 250, 250)),
        syntax_theme: "InspiredGitHub",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn themes_differ_and_pair_with_syntax_themes() {
        let dark = Theme::from_name(ThemeName::Dark);
        let light = Theme::from_name(ThemeName::Light);
        assert_ne!(
            dark.style(Component::MessageText),
            light.style(Component::MessageText)
        );
        assert_eq!(dark.syntax_theme(), "base16-ocean.dark");
        assert_eq!(light.syntax_theme(), "InspiredGitHub");
        assert!(dark.get_background_color().is_none());
        assert!(light.get_background_color().is_some());
    }
}
