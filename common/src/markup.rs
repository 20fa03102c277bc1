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

//! Inline markup language
//!
//! Application code styles plain strings with two reserved characters:
//!
//! - [`REVERSE_TOGGLE`] flips reverse video on or off for the text that follows.
//! - [`COLOR_DELIMITER`] surrounds a decimal color code in `-1..=15`. Code `-1`
//!   means "the active foreground color".
//!
//! Markup is produced by trusted code, so malformed markers never fail. A marker
//! whose payload is not a valid code, or a trailing delimiter with no partner,
//! is dropped in its entirety.

use crate::color::Color;
use std::ops::Range;

/// Reverse-video toggle character
pub const REVERSE_TOGGLE: char = '\u{0012}';

/// Delimiter surrounding an inline color code
pub const COLOR_DELIMITER: char = '\u{0001}';

/// Color requested by an inline marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupColor {
    /// Code `-1`, whatever the active foreground is
    Current,
    /// A fixed palette color
    Fixed(Color),
}

impl MarkupColor {
    /// Parse a marker payload
    pub fn parse(payload: &str) -> Option<Self> {
        match payload.trim().parse::<i32>().ok()? {
            -1 => Some(MarkupColor::Current),
            code => Color::from_code(code).map(MarkupColor::Fixed),
        }
    }

    /// Resolve against the active foreground
    pub fn resolve(self, current: Color) -> Color {
        match self {
            MarkupColor::Current => current,
            MarkupColor::Fixed(color) => color,
        }
    }

    fn code(self) -> i32 {
        match self {
            MarkupColor::Current => -1,
            MarkupColor::Fixed(color) => i32::from(color.code()),
        }
    }
}

impl From<Color> for MarkupColor {
    fn from(color: Color) -> Self {
        MarkupColor::Fixed(color)
    }
}

/// One lexical element of markup text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupToken<'a> {
    /// A character that occupies a column
    Text(char),
    /// Reverse-video toggle
    Reverse,
    /// A well-formed color marker
    Color(MarkupColor),
    /// A terminated marker whose payload is not a code in `-1..=15`
    Invalid(&'a str),
    /// A delimiter with no closing partner, through the end of the text
    Unterminated(&'a str),
}

impl MarkupToken<'_> {
    /// Whether this token occupies a screen column
    ///
    /// Control characters such as `\n` are text but take no column.
    pub fn is_visible(&self) -> bool {
        matches!(self, MarkupToken::Text(ch) if !ch.is_control())
    }
}

/// Iterator over markup tokens and their byte ranges
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = (Range<usize>, MarkupToken<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.pos;
        let ch = self.text[start..].chars().next()?;
        let after = start + ch.len_utf8();

        let token = match ch {
            REVERSE_TOGGLE => {
                self.pos = after;
                MarkupToken::Reverse
            }
            COLOR_DELIMITER => match self.text[after..].find(COLOR_DELIMITER) {
                Some(offset) => {
                    let payload = &self.text[after..after + offset];
                    self.pos = after + offset + COLOR_DELIMITER.len_utf8();
                    match MarkupColor::parse(payload) {
                        Some(color) => MarkupToken::Color(color),
                        None => MarkupToken::Invalid(payload),
                    }
                }
                None => {
                    self.pos = self.text.len();
                    MarkupToken::Unterminated(&self.text[after..])
                }
            },
            other => {
                self.pos = after;
                MarkupToken::Text(other)
            }
        };

        Some((start..self.pos, token))
    }
}

/// Tokenize markup text
pub fn tokenize(text: &str) -> Tokens<'_> {
    Tokens { text, pos: 0 }
}

/// Remove all markup, keeping the visible characters in order
pub fn strip(text: &str) -> String {
    tokenize(text)
        .filter_map(|(_, token)| match token {
            MarkupToken::Text(ch) => Some(ch),
            _ => None,
        })
        .collect()
}

/// Number of characters that occupy a column once markup is removed
pub fn visible_len(text: &str) -> usize {
    tokenize(text).filter(|(_, token)| token.is_visible()).count()
}

/// Whether the text contains any markup character at all
pub fn has_markup(text: &str) -> bool {
    text.contains([REVERSE_TOGGLE, COLOR_DELIMITER])
}

/// Build a color marker
pub fn color_marker(color: impl Into<MarkupColor>) -> String {
    format!(
        "{}{}{}",
        COLOR_DELIMITER,
        color.into().code(),
        COLOR_DELIMITER
    )
}

/// Wrap text in a pair of reverse-video toggles
pub fn reverse(text: &str) -> String {
    format!("{}{}{}", REVERSE_TOGGLE, text, REVERSE_TOGGLE)
}

/// Wrap text in a color marker followed by a return to the active foreground
pub fn colored(color: Color, text: &str) -> String {
    format!(
        "{}{}{}",
        color_marker(color),
        text,
        color_marker(MarkupColor::Current)
    )
}
