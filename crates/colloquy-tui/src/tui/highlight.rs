//! Best-effort syntax highlighting of message text.
//!
//! Output is one styled line per hard line of the input, so highlighting never
//! changes the line count the height engine sees.

use once_cell::sync::Lazy;
use ratatui::style::{Color, Style};
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::{SyntaxReference, SyntaxSet};
use tracing::debug;

use crate::tui::height::hard_lines;
use crate::tui::theme::{Component, Theme};

/// Lazy-loaded syntax set for highlighting
static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

pub type StyledLine = Vec<(Style, String)>;

const FENCE: &str = "```";

/// Convert a syntect style to ratatui style
fn syntect_style_to_ratatui(syntect_style: syntect::highlighting::Style) -> Style {
    let fg = Color::Rgb(
        syntect_style.foreground.r,
        syntect_style.foreground.g,
        syntect_style.foreground.b,
    );
    Style::default().fg(fg)
}

fn syntax_for_language(language: &str) -> Option<&'static SyntaxReference> {
    if language.is_empty() {
        return None;
    }
    SYNTAX_SET
        .find_syntax_by_token(language)
        .or_else(|| SYNTAX_SET.find_syntax_by_extension(language))
}

/// Extension for content that reads like source code. Keyword prefixes are
/// judged on the first non-empty line; JSON also needs the last non-empty line
/// to close the opening bracket.
fn guess_extension(content: &str) -> Option<&'static str> {
    const PREFIXES: [(&str, &str); 12] = [
        ("def ", "py"),
        ("import ", "py"),
        ("from ", "py"),
        ("class ", "py"),
        ("fn ", "rs"),
        ("use ", "rs"),
        ("pub ", "rs"),
        ("impl ", "rs"),
        ("#include", "c"),
        ("function ", "js"),
        ("const ", "js"),
        ("package ", "go"),
    ];

    let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());
    let first = lines.next()?;
    if let Some((_, ext)) = PREFIXES.iter().find(|(prefix, _)| first.starts_with(prefix)) {
        return Some(*ext);
    }
    let last = lines.last().unwrap_or(first);
    let json_like = (first.starts_with('{') && last.ends_with('}'))
        || (first.starts_with('[') && last.ends_with(']'));
    json_like.then_some("json")
}

/// Syntax for a message with no fenced blocks that still looks like code.
fn detect_code_syntax(content: &str) -> Option<&'static SyntaxReference> {
    let first_line = content.lines().next()?;
    SYNTAX_SET
        .find_syntax_by_first_line(first_line)
        .or_else(|| guess_extension(content).and_then(|ext| SYNTAX_SET.find_syntax_by_extension(ext)))
}

struct CodeHighlighter {
    inner: Option<HighlightLines<'static>>,
    fallback: Style,
}

impl CodeHighlighter {
    fn new(syntax: Option<&'static SyntaxReference>, theme: &Theme) -> Self {
        let fallback = theme.style(Component::CodeBlock);
        let syntax_theme = THEME_SET.themes.get(theme.syntax_theme());
        if syntax_theme.is_none() {
            debug!(
                target: "colloquy::highlight",
                "Syntax theme {} not available", theme.syntax_theme()
            );
        }
        let inner = match (syntax, syntax_theme) {
            (Some(syntax), Some(syntax_theme)) => Some(HighlightLines::new(syntax, syntax_theme)),
            _ => None,
        };
        Self { inner, fallback }
    }

    fn line(&mut self, line: &str) -> StyledLine {
        let Some(highlighter) = self.inner.as_mut() else {
            return vec![(self.fallback, line.to_string())];
        };
        let with_newline = format!("{line}\n");
        match highlighter.highlight_line(&with_newline, &SYNTAX_SET) {
            Ok(ranges) => ranges
                .into_iter()
                .map(|(style, text)| (syntect_style_to_ratatui(style), text.trim_end_matches('\n')))
                .filter(|(_, text)| !text.is_empty())
                .map(|(style, text)| (style, text.to_string()))
                .collect(),
            Err(e) => {
                debug!(target: "colloquy::highlight", "Highlighting failed: {}", e);
                vec![(self.fallback, line.to_string())]
            }
        }
    }
}

/// Style `content` line by line: fenced code blocks are highlighted with
/// the syntax named after the fence, unfenced content that looks like code
/// is highlighted as a whole, everything else gets the plain text style.
pub fn highlight_message(content: &str, theme: &Theme) -> Vec<StyledLine> {
    let text_style = theme.style(Component::MessageText);
    let fence_style = theme.style(Component::CodeFence);
    let has_fence = content.lines().any(|l| l.trim_start().starts_with(FENCE));

    if !has_fence && content.lines().nth(1).is_some() {
        if let Some(syntax) = detect_code_syntax(content) {
            let mut highlighter = CodeHighlighter::new(Some(syntax), theme);
            return hard_lines(content).map(|line| highlighter.line(&line)).collect();
        }
    }

    let mut code: Option<CodeHighlighter> = None;
    let mut lines = Vec::new();
    for line in hard_lines(content) {
        if let Some(rest) = line.trim_start().strip_prefix(FENCE) {
            code = match code {
                Some(_) => None,
                None => Some(CodeHighlighter::new(syntax_for_language(rest.trim()), theme)),
            };
            lines.push(vec![(fence_style, line.to_string())]);
        } else if let Some(highlighter) = code.as_mut() {
            lines.push(highlighter.line(&line));
        } else {
            lines.push(vec![(text_style, line.to_string())]);
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(line: &StyledLine) -> String {
        line.iter().map(|(_, s)| s.as_str()).collect()
    }

    #[test]
    fn plain_text_keeps_lines_and_style() {
        let theme = Theme::default();
        let lines = highlight_message("hello\nworld", &theme);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], vec![(theme.style(Component::MessageText), "hello".to_string())]);
    }

    #[test]
    fn fenced_block_is_highlighted() {
        let theme = Theme::default();
        let content = "Here:\n```python\ndef add(a, b):\n    return a + b\n```\ndone";
        let lines = highlight_message(content, &theme);
        assert_eq!(lines.len(), 6);
        assert_eq!(text_of(&lines[2]), "def add(a, b):");
        assert_eq!(text_of(&lines[3]), "    return a + b");
        assert!(lines[2].len() > 1, "code line should be split into styled tokens");
        assert_eq!(lines[5], vec![(theme.style(Component::MessageText), "done".to_string())]);
    }

    #[test]
    fn unknown_fence_language_falls_back() {
        let theme = Theme::default();
        let lines = highlight_message("```nosuchlang\nabc\n```", &theme);
        assert_eq!(lines[1], vec![(theme.style(Component::CodeBlock), "abc".to_string())]);
    }

    #[test]
    fn unfenced_code_is_detected() {
        assert_eq!(guess_extension("fn main() {\n}\n"), Some("rs"));
        assert_eq!(guess_extension("{\n  \"a\": 1\n}"), Some("json"));
        assert_eq!(guess_extension("Just some words\nand more"), None);
    }

    #[test]
    fn single_line_code_is_detected() {
        assert_eq!(guess_extension("import os"), Some("py"));
        assert_eq!(guess_extension("{\"a\": 1}"), Some("json"));
        assert_eq!(guess_extension("{ unclosed"), None);
    }

    #[test]
    fn line_count_matches_hard_lines() {
        let theme = Theme::default();
        let content = "import os\nprint(os.getcwd())\n\n\tx = 1\r\n";
        let lines = highlight_message(content, &theme);
        assert_eq!(lines.len(), content.split('\n').count());
        assert_eq!(text_of(&lines[3]), "    x = 1");
    }
}
