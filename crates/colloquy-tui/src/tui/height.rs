//! Wrapped line counting and the message height rule.
//!
//! Everything here is pure. Widths are measured in font units: a wrap width is
//! turned into a column count with [`FontMetrics::char_width`], and heights
//! come out in multiples of [`FontMetrics::line_height`]. In the terminal both
//! are 1.0 and a height is a number of rows (rounded up).
//!
//! [`wrap_spans`] is the only word wrapper in the crate. The counter below and
//! the styled renderer in `message_view` both go through it, so the number of
//! counted rows is the number of rendered rows.

use colloquy_core::config::FontSettings;
use std::borrow::Cow;
use unicode_width::UnicodeWidthChar;

pub const DEFAULT_COLLAPSED_LINE_LIMIT: usize = 5;

const TAB_STOP: &str = "    ";

/// Height multipliers for collapsed messages that fit within the limit.
const COLLAPSED_MULTIPLIERS: [(usize, f32); 5] =
    [(1, 1.5), (2, 2.5), (3, 3.5), (4, 4.5), (5, 5.5)];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    pub line_height: f32,
    pub char_width: f32,
    pub padding: f32,
}

impl FontMetrics {
    pub const TERMINAL: Self = Self {
        line_height: 1.0,
        char_width: 1.0,
        padding: 0.0,
    };
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self::TERMINAL
    }
}

impl From<FontSettings> for FontMetrics {
    fn from(settings: FontSettings) -> Self {
        let positive_or_one = |v: f32| if v.is_finite() && v > 0.0 { v } else { 1.0 };
        Self {
            line_height: positive_or_one(settings.line_height),
            char_width: positive_or_one(settings.char_width),
            padding: if settings.padding.is_finite() {
                settings.padding.max(0.0)
            } else {
                0.0
            },
        }
    }
}

/// Number of character columns available in `wrap_width`, at least one.
pub fn columns_for_width(wrap_width: f32, font: &FontMetrics) -> usize {
    let columns = (wrap_width / font.char_width).floor();
    if columns.is_finite() && columns >= 1.0 {
        columns as usize
    } else {
        1
    }
}

/// Strip a trailing carriage return and expand tabs.
pub fn normalize_line(line: &str) -> Cow<'_, str> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.contains('\t') {
        Cow::Owned(line.replace('\t', TAB_STOP))
    } else {
        Cow::Borrowed(line)
    }
}

/// The hard lines of `text`, normalized.
pub fn hard_lines(text: &str) -> impl Iterator<Item = Cow<'_, str>> {
    text.split('\n').map(normalize_line)
}

/// Visual lines `text` occupies when wrapped at `wrap_width`. Never zero.
pub fn compute_wrapped_lines(text: &str, wrap_width: f32, font: &FontMetrics) -> usize {
    let columns = columns_for_width(wrap_width, font);
    hard_lines(text)
        .map(|line| wrap_spans(&[((), line.as_ref())], columns).len())
        .sum::<usize>()
        .max(1)
}

fn collapsed_multiplier(wrapped_lines: usize, limit: usize) -> f32 {
    COLLAPSED_MULTIPLIERS
        .iter()
        .find(|(lines, _)| *lines == wrapped_lines)
        .map_or(limit as f32 + 0.5, |(_, multiplier)| *multiplier)
}

pub fn compute_height(
    wrapped_lines: usize,
    expanded: bool,
    collapsed_line_limit: usize,
    font: &FontMetrics,
) -> f32 {
    if expanded {
        wrapped_lines as f32 * font.line_height + font.padding
    } else if wrapped_lines <= collapsed_line_limit {
        font.line_height * collapsed_multiplier(wrapped_lines, collapsed_line_limit) + font.padding
    } else {
        font.line_height * (collapsed_line_limit as f32 + 0.5) + font.padding
    }
}

/// Terminal rows needed for a height.
pub fn rows_for_height(height: f32) -> usize {
    if height.is_finite() && height > 0.0 {
        height.ceil() as usize
    } else {
        0
    }
}

pub fn display_width(text: &str) -> usize {
    text.chars().map(char_width).sum()
}

fn char_width(c: char) -> usize {
    c.width().unwrap_or(0)
}

struct Word<S> {
    chars: Vec<(S, char)>,
    /// Leading characters that are not trailing whitespace.
    visible_chars: usize,
    visible_width: usize,
}

impl<S> Word<S> {
    fn new() -> Self {
        Self {
            chars: Vec::new(),
            visible_chars: 0,
            visible_width: 0,
        }
    }
}

struct Row<S> {
    spans: Vec<(S, String)>,
    width: usize,
}

impl<S: Clone + PartialEq> Row<S> {
    fn new() -> Self {
        Self {
            spans: Vec::new(),
            width: 0,
        }
    }

    fn push(&mut self, style: &S, c: char, width: usize) {
        match self.spans.last_mut() {
            Some((last, text)) if last == style => text.push(c),
            _ => self.spans.push((style.clone(), c.to_string())),
        }
        self.width += width;
    }
}

/// Split styled text into words that keep their trailing whitespace.
fn split_words<S: Clone>(segments: &[(S, &str)]) -> Vec<Word<S>> {
    let mut words = Vec::new();
    let mut current = Word::new();
    let mut in_trailing_space = false;

    for (style, text) in segments {
        for c in text.chars() {
            if c.is_whitespace() {
                in_trailing_space = true;
            } else {
                if in_trailing_space && !current.chars.is_empty() {
                    words.push(std::mem::replace(&mut current, Word::new()));
                }
                in_trailing_space = false;
                current.visible_chars += 1;
                current.visible_width += char_width(c);
            }
            current.chars.push((style.clone(), c));
        }
    }
    if !current.chars.is_empty() {
        words.push(current);
    }
    words
}

/// Greedy word wrap of one hard line made of styled segments.
///
/// Words keep their trailing whitespace, which is dropped where it would
/// overflow a row. A word wider than a row is split at character boundaries.
/// Always returns at least one (possibly empty) row.
pub fn wrap_spans<S: Clone + PartialEq>(
    segments: &[(S, &str)],
    columns: usize,
) -> Vec<Vec<(S, String)>> {
    let columns = columns.max(1);
    let mut rows = Vec::new();
    let mut row = Row::new();

    for word in split_words(segments) {
        if row.width > 0 && row.width + word.visible_width > columns {
            rows.push(std::mem::replace(&mut row, Row::new()).spans);
        }

        if word.visible_width > columns {
            for (style, c) in &word.chars {
                let width = char_width(*c);
                if c.is_whitespace() && row.width + width > columns {
                    continue;
                }
                if row.width > 0 && row.width + width > columns {
                    rows.push(std::mem::replace(&mut row, Row::new()).spans);
                }
                row.push(style, *c, width);
            }
        } else {
            for (idx, (style, c)) in word.chars.iter().enumerate() {
                let width = char_width(*c);
                if idx >= word.visible_chars && row.width + width > columns {
                    break;
                }
                row.push(style, *c, width);
            }
        }
    }

    rows.push(row.spans);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn plain_rows(text: &str, columns: usize) -> Vec<String> {
        wrap_spans(&[((), text)], columns)
            .into_iter()
            .map(|row| row.into_iter().map(|(_, s)| s).collect())
            .collect()
    }

    #[test]
    fn single_line_content_is_one_line() {
        let font = FontMetrics::TERMINAL;
        assert_eq!(compute_wrapped_lines("hello", 80.0, &font), 1);
        assert_eq!(compute_wrapped_lines("", 80.0, &font), 1);
    }

    #[test]
    fn hard_breaks_each_count() {
        let font = FontMetrics::TERMINAL;
        assert_eq!(compute_wrapped_lines("a\nb\r\n\nc", 80.0, &font), 4);
    }

    #[test]
    fn words_wrap_greedily() {
        assert_eq!(plain_rows("hello world foo", 11), vec!["hello world", "foo"]);
        assert_eq!(plain_rows("hello world", 5), vec!["hello", "world"]);
    }

    #[test]
    fn long_words_split_at_characters() {
        assert_eq!(plain_rows("abcdefgh", 3), vec!["abc", "def", "gh"]);
    }

    #[test]
    fn leading_indentation_is_kept() {
        assert_eq!(plain_rows("    x = 1", 20), vec!["    x = 1"]);
    }

    #[test]
    fn wide_characters_use_display_width() {
        // Each of these occupies two columns.
        assert_eq!(plain_rows("日本語", 4), vec!["日本", "語"]);
    }

    #[test]
    fn styles_survive_wrapping() {
        let rows = wrap_spans(&[(1u8, "red "), (2u8, "blue")], 4);
        assert_eq!(
            rows,
            vec![vec![(1u8, "red ".to_string())], vec![(2u8, "blue".to_string())]]
        );
    }

    #[test]
    fn columns_follow_char_width() {
        let font = FontMetrics {
            char_width: 7.5,
            ..FontMetrics::TERMINAL
        };
        assert_eq!(columns_for_width(75.0, &font), 10);
        assert_eq!(columns_for_width(3.0, &font), 1);
        assert_eq!(compute_wrapped_lines("abcdefghij klm", 75.0, &font), 2);
    }

    #[rstest]
    #[case(1, 1.5)]
    #[case(2, 2.5)]
    #[case(3, 3.5)]
    #[case(4, 4.5)]
    #[case(5, 5.5)]
    #[case(7, 5.5)]
    #[case(40, 5.5)]
    fn collapsed_heights(#[case] lines: usize, #[case] expected: f32) {
        let font = FontMetrics::TERMINAL;
        let height = compute_height(lines, false, DEFAULT_COLLAPSED_LINE_LIMIT, &font);
        assert!((height - expected).abs() < f32::EPSILON);
    }

    #[test]
    fn seven_line_collapsed_message_uses_limit_plus_half() {
        let font = FontMetrics {
            line_height: 2.0,
            char_width: 1.0,
            padding: 3.0,
        };
        let height = compute_height(7, false, 5, &font);
        assert!((height - (2.0 * 5.5 + 3.0)).abs() < f32::EPSILON);
    }

    #[test]
    fn expanded_height_is_lines_plus_padding() {
        let font = FontMetrics {
            line_height: 1.0,
            char_width: 1.0,
            padding: 2.0,
        };
        assert!((compute_height(12, true, 5, &font) - 14.0).abs() < f32::EPSILON);
        assert_eq!(rows_for_height(5.5), 6);
        assert_eq!(rows_for_height(3.0), 3);
    }

    #[test]
    fn font_settings_are_sanitized() {
        let metrics = FontMetrics::from(FontSettings {
            line_height: 0.0,
            char_width: -1.0,
            padding: -4.0,
        });
        assert_eq!(metrics, FontMetrics::TERMINAL);
    }

    proptest! {
        #[test]
        fn wrapped_lines_never_zero(text in ".{0,200}", width in 0.0f32..200.0) {
            prop_assert!(compute_wrapped_lines(&text, width, &FontMetrics::TERMINAL) >= 1);
        }

        #[test]
        fn rows_fit_and_keep_every_visible_char(text in "[a-z ]{0,120}", columns in 1usize..40) {
            let rows = plain_rows(&text, columns);
            for row in &rows {
                prop_assert!(display_width(row) <= columns);
            }
            let kept: String = rows.concat().chars().filter(|c| !c.is_whitespace()).collect();
            let original: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            prop_assert_eq!(kept, original);
        }

        #[test]
        fn compute_height_is_idempotent(
            lines in 0usize..100,
            expanded in any::<bool>(),
            limit in 1usize..10,
        ) {
            let font = FontMetrics::TERMINAL;
            let first = compute_height(lines, expanded, limit, &font);
            let second = compute_height(lines, expanded, limit, &font);
            prop_assert_eq!(first.to_bits(), second.to_bits());
        }

        #[test]
        fn every_hard_line_takes_a_row(text in "[a-z \n]{0,120}", columns in 1usize..60) {
            let font = FontMetrics::TERMINAL;
            let hard = text.split('\n').count();
            prop_assert!(compute_wrapped_lines(&text, columns as f32, &font) >= hard);
        }
    }
}
