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

//! Plain ASCII terminals
//!
//! No color, no cursor addressing. Markup is stripped and anything outside
//! 7-bit ASCII is folded to its closest printable equivalent.

use super::{Emulation, Protocol, Rendered, Style, fold_to_ascii, strip_markup};
use crate::terminal::TerminalState;
use dialtone_common::Color;
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, Default)]
pub struct Ascii;

impl Protocol for Ascii {
    fn emulation(&self) -> Emulation {
        Emulation::Ascii
    }

    fn foreground(&self, _color: Color) -> &'static [u8] {
        b""
    }

    fn background(&self, _color: Color) -> &'static [u8] {
        b""
    }

    fn style(&self, style: Style) -> &'static [u8] {
        match style {
            Style::Backspace => b"\x08 \x08",
            Style::Bell => b"\x07",
            Style::Newline => b"\r\n",
            _ => b"",
        }
    }

    fn replace_inline_colors(&self, text: &str, _state: &TerminalState) -> Rendered {
        strip_markup(text)
    }

    fn transform_text<'a>(&self, text: &'a str) -> Cow<'a, str> {
        fold_to_ascii(text)
    }

    fn decode(&self, bytes: &[u8]) -> String {
        bytes
            .iter()
            .map(|&byte| if byte.is_ascii() { char::from(byte) } else { '?' })
            .collect()
    }

    fn is_legal_input(&self, byte: u8) -> bool {
        (0x20..=0x7E).contains(&byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dialtone_common::markup;
    use proptest::prelude::*;

    #[test]
    fn test_styles_are_empty() {
        assert!(Ascii.foreground(Color::Red).is_empty());
        assert!(Ascii.background(Color::Blue).is_empty());
        assert!(Ascii.style(Style::ClearScreen).is_empty());
        assert!(Ascii.style(Style::CursorUp).is_empty());
    }

    #[test]
    fn test_markup_is_stripped() {
        let state = TerminalState::default();
        let text = format!(
            "{}Hi{} {}",
            markup::color_marker(Color::Red),
            markup::color_marker(dialtone_common::MarkupColor::Current),
            markup::reverse("there")
        );
        let rendered = Ascii.replace_inline_colors(&text, &state);
        assert_eq!(rendered.text, "Hi there");
        assert_eq!(rendered.visible_len, 8);
        assert!(!rendered.recolored);
    }

    #[test]
    fn test_invalid_markers_are_dropped() {
        let state = TerminalState::default();
        let rendered = Ascii.replace_inline_colors("a\u{1}99\u{1}b\u{1}7", &state);
        assert_eq!(rendered.text, "ab");
        assert_eq!(rendered.visible_len, 2);
    }

    #[test]
    fn test_encode_folds_unicode() {
        let state = TerminalState::default();
        let text = Ascii.transform_text("na\u{ef}ve \u{2014} ok\n");
        assert_eq!(Ascii.encode(&text, &state), b"naive - ok\r\n".to_vec());
    }

    #[test]
    fn test_remove_invalid_input() {
        let mut bytes = vec![b'h', 0xC3, 0xA9, b'i', 0x0D];
        Ascii.remove_invalid_input(&mut bytes);
        assert_eq!(bytes, vec![b'h', 0, 0, b'i', 0x0D]);
    }

    #[derive(Debug, Clone)]
    enum Piece {
        Text(String),
        Marker(i32),
        Reverse,
    }

    fn piece() -> impl Strategy<Value = Piece> {
        prop_oneof![
            "[ -~]{0,12}".prop_map(Piece::Text),
            (-1i32..=15).prop_map(Piece::Marker),
            Just(Piece::Reverse),
        ]
    }

    proptest! {
        #[test]
        fn prop_markup_strips_to_plain_text(pieces in prop::collection::vec(piece(), 0..16)) {
            let mut text = String::new();
            let mut plain = String::new();
            for piece in &pieces {
                match piece {
                    Piece::Text(chunk) => {
                        text.push_str(chunk);
                        plain.push_str(chunk);
                    }
                    Piece::Marker(code) => text.push_str(&format!("\u{1}{}\u{1}", code)),
                    Piece::Reverse => text.push(markup::REVERSE_TOGGLE),
                }
            }

            let rendered = Ascii.replace_inline_colors(&text, &TerminalState::default());
            prop_assert_eq!(rendered.visible_len, plain.len());
            prop_assert_eq!(rendered.text, plain);
        }
    }
}
