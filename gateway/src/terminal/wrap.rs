//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Markup-aware line wrapping
//!
//! Wrapping counts only visible characters. Color markers and reverse toggles
//! are carried onto continuation lines so each wrapped line renders correctly
//! on its own.

use dialtone_common::markup::{self, MarkupToken, REVERSE_TOGGLE};
use std::ops::Range;

/// How paragraphs are broken into lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    /// Break at the last space that fits, falling back to a hard break
    Word,
    /// Break exactly at the width
    Character,
    /// Only break on `\n`
    NewlinesOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapOptions {
    /// Maximum visible characters per line
    pub width: usize,
    pub mode: WrapMode,
    /// Drop leading spaces from continuation lines
    pub trim: bool,
}

/// One display line, still carrying markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedLine {
    pub text: String,
    pub visible: usize,
}

impl WrappedLine {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let visible = markup::visible_len(&text);
        Self { text, visible }
    }

    /// Line content without markup
    pub fn plain(&self) -> String {
        markup::strip(&self.text)
    }
}

/// Markup in effect at the end of a line
#[derive(Debug, Default)]
struct Carry {
    color: Option<String>,
    reverse: bool,
}

impl Carry {
    fn prefix(&self) -> String {
        let mut prefix = self.color.clone().unwrap_or_default();
        if self.reverse {
            prefix.push(REVERSE_TOGGLE);
        }
        prefix
    }

    fn absorb(&mut self, text: &str, tokens: &[(Range<usize>, MarkupToken<'_>)]) {
        for (range, token) in tokens {
            match token {
                MarkupToken::Color(_) => self.color = Some(text[range.clone()].to_string()),
                MarkupToken::Reverse => self.reverse = !self.reverse,
                _ => {}
            }
        }
    }
}

fn is_space(token: &MarkupToken<'_>) -> bool {
    matches!(token, MarkupToken::Text(' '))
}

/// Split text into display lines no wider than `options.width`
pub fn wrap(text: &str, options: &WrapOptions) -> Vec<WrappedLine> {
    let width = options.width.max(1);
    let mut lines = Vec::new();
    let mut carry = Carry::default();

    // A final newline ends the last line rather than starting an empty one
    let text = text.strip_suffix('\n').unwrap_or(text);
    for paragraph in text.split('\n') {
        let paragraph = paragraph.strip_suffix('\r').unwrap_or(paragraph);
        let tokens: Vec<_> = markup::tokenize(paragraph).collect();

        let mut emit = |from: usize, to: usize, carry: &mut Carry| {
            let prefix = carry.prefix();
            let body = match (tokens.get(from), to.checked_sub(1).and_then(|last| tokens.get(last))) {
                (Some((first, _)), Some((last, _))) if from < to => &paragraph[first.start..last.end],
                _ => "",
            };
            lines.push(WrappedLine::new(prefix + body));
            carry.absorb(paragraph, &tokens[from..to.max(from)]);
        };

        if options.mode == WrapMode::NewlinesOnly {
            emit(0, tokens.len(), &mut carry);
            continue;
        }

        let mut start = 0;
        let mut visible = 0;
        let mut last_space: Option<usize> = None;
        let mut index = 0;

        while index < tokens.len() {
            let token = &tokens[index].1;
            if !token.is_visible() {
                index += 1;
                continue;
            }

            if visible == width {
                let (cut, resume) = if options.mode == WrapMode::Word && is_space(token) {
                    (index, index + 1)
                } else {
                    match (options.mode, last_space) {
                        (WrapMode::Word, Some(space)) => (space, space + 1),
                        _ => (index, index),
                    }
                };
                emit(start, cut, &mut carry);

                start = resume;
                if options.trim {
                    while start < tokens.len() && is_space(&tokens[start].1) {
                        start += 1;
                    }
                }
                visible = 0;
                last_space = None;
                index = start;
                continue;
            }

            if is_space(token) && visible > 0 {
                last_space = Some(index);
            }
            visible += 1;
            index += 1;
        }

        if start < tokens.len() || start == 0 {
            emit(start, tokens.len(), &mut carry);
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use dialtone_common::Color;
    use dialtone_common::markup::{color_marker, reverse};
    use proptest::prelude::*;

    fn options(width: usize, mode: WrapMode) -> WrapOptions {
        WrapOptions {
            width,
            mode,
            trim: true,
        }
    }

    fn texts(lines: &[WrappedLine]) -> Vec<&str> {
        lines.iter().map(|line| line.text.as_str()).collect()
    }

    #[test]
    fn test_short_text_is_one_line() {
        let lines = wrap("hello", &options(10, WrapMode::Word));
        assert_eq!(texts(&lines), vec!["hello"]);
        assert_eq!(lines[0].visible, 5);
    }

    #[test]
    fn test_empty_text_is_one_empty_line() {
        let lines = wrap("", &options(10, WrapMode::Word));
        assert_eq!(texts(&lines), vec![""]);
    }

    #[test]
    fn test_word_wrap_breaks_at_space() {
        let lines = wrap("the quick brown fox", &options(10, WrapMode::Word));
        assert_eq!(texts(&lines), vec!["the quick", "brown fox"]);
    }

    #[test]
    fn test_word_wrap_hard_breaks_long_words() {
        let lines = wrap("abcdefghijkl", &options(5, WrapMode::Word));
        assert_eq!(texts(&lines), vec!["abcde", "fghij", "kl"]);
    }

    #[test]
    fn test_character_wrap() {
        let lines = wrap("the quick brown", &options(6, WrapMode::Character));
        assert_eq!(texts(&lines), vec!["the qu", "ick br", "own"]);
    }

    #[test]
    fn test_character_wrap_keeps_spaces_without_trim() {
        let options = WrapOptions {
            width: 4,
            mode: WrapMode::Character,
            trim: false,
        };
        let lines = wrap("ab    cd", &options);
        assert_eq!(texts(&lines), vec!["ab  ", "  cd"]);
    }

    #[test]
    fn test_trim_leading_whitespace_on_continuation() {
        let lines = wrap("aaaa    bbbb", &options(4, WrapMode::Character));
        assert_eq!(texts(&lines), vec!["aaaa", "bbbb"]);
    }

    #[test]
    fn test_newlines_split_paragraphs() {
        let lines = wrap("one\r\ntwo\n\nthree", &options(10, WrapMode::Word));
        assert_eq!(texts(&lines), vec!["one", "two", "", "three"]);
    }

    #[test]
    fn test_trailing_newline_adds_no_line() {
        let lines = wrap("one\ntwo\n", &options(10, WrapMode::Word));
        assert_eq!(texts(&lines), vec!["one", "two"]);
        let lines = wrap("one\r\n\n", &options(10, WrapMode::Word));
        assert_eq!(texts(&lines), vec!["one", ""]);
        let lines = wrap("\n", &options(10, WrapMode::Word));
        assert_eq!(texts(&lines), vec![""]);
    }

    #[test]
    fn test_newlines_only_ignores_width() {
        let lines = wrap("abcdefgh\nij", &options(3, WrapMode::NewlinesOnly));
        assert_eq!(texts(&lines), vec!["abcdefgh", "ij"]);
    }

    #[test]
    fn test_width_counts_visible_characters() {
        let red = color_marker(Color::Red);
        let text = format!("{}abc{}def", red, red);
        let lines = wrap(&text, &options(6, WrapMode::Word));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].visible, 6);
    }

    #[test]
    fn test_color_carried_to_continuation() {
        let red = color_marker(Color::Red);
        let text = format!("{}abcdef", red);
        let lines = wrap(&text, &options(3, WrapMode::Character));
        assert_eq!(texts(&lines), vec![format!("{}abc", red), format!("{}def", red)]);
    }

    #[test]
    fn test_reverse_reopened_on_continuation() {
        let text = reverse("abcdef");
        let lines = wrap(&text, &options(3, WrapMode::Character));
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "\u{12}abc");
        assert_eq!(lines[1].text, "\u{12}def\u{12}");
        assert_eq!(lines[1].visible, 3);
    }

    #[test]
    fn test_hundred_characters_at_79_columns() {
        let text = "x".repeat(100);
        let lines = wrap(&text, &options(79, WrapMode::Word));
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].visible, 79);
        assert_eq!(lines[1].visible, 21);
    }

    #[test]
    fn test_no_line_exceeds_width() {
        let text = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod tempor \
                    incididunt ut labore et dolore magna aliqua. Ut enim ad minim veniam.";
        for width in [1, 5, 13, 39, 79] {
            for mode in [WrapMode::Word, WrapMode::Character] {
                for line in wrap(text, &options(width, mode)) {
                    assert!(line.visible <= width, "{:?} wider than {}", line, width);
                }
            }
        }
    }

    proptest! {
        #[test]
        fn prop_character_wrap_keeps_every_character(text in "[a-z ]{0,200}", width in 1usize..100) {
            let options = WrapOptions { width, mode: WrapMode::Character, trim: false };
            let lines = wrap(&text, &options);
            let joined: String = lines.iter().map(WrappedLine::plain).collect();
            prop_assert_eq!(joined, text);
            for line in &lines {
                prop_assert!(line.visible <= width);
            }
        }

        #[test]
        fn prop_word_wrap_respects_width(text in "[a-z]{1,12}( [a-z]{1,12}){0,30}", width in 1usize..100) {
            for line in wrap(&text, &options(width, WrapMode::Word)) {
                prop_assert!(line.visible <= width);
            }
        }
    }
}
