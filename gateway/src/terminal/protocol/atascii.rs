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

//! Atari ATASCII terminals
//!
//! ATASCII has no color codes in text mode, but every glyph has an inverse
//! twin at `+128`, which is how reverse video is drawn. Several ASCII code points
//! are control keys on the Atari, so those characters are replaced with
//! lookalikes before they are sent. Rendered text holds one `char` per native
//! byte, which keeps the mapping in one place.

use super::{
    CURSOR_DOWN, CURSOR_LEFT, CURSOR_RIGHT, CURSOR_UP, Emulation, KEY_BACKSPACE, KEY_RETURN,
    KEY_TAB, Protocol, Rendered, Style, fold_to_ascii,
};
use crate::terminal::TerminalState;
use dialtone_common::markup::{self, MarkupToken};
use dialtone_common::Color;

pub const EOL: u8 = 0x9B;
pub const BACKSPACE: u8 = 0x7E;
pub const CLEAR: u8 = 0x7D;
pub const TAB: u8 = 0x7F;
pub const CURSOR_UP_KEY: u8 = 0x1C;
pub const CURSOR_DOWN_KEY: u8 = 0x1D;
pub const CURSOR_LEFT_KEY: u8 = 0x1E;
pub const CURSOR_RIGHT_KEY: u8 = 0x1F;
pub const DELETE_LINE: u8 = 0x9C;
pub const BELL: u8 = 0xFD;

const INVERSE: u8 = 0x80;

#[derive(Debug, Clone, Copy, Default)]
pub struct Atascii;

/// Native byte for a character, `None` when it has no rendering
fn to_atascii(ch: char) -> Option<u8> {
    let byte = match ch {
        '\n' => EOL,
        '\r' => return None,
        '\t' => TAB,
        '{' => b'(',
        '}' => b')',
        '~' => b'-',
        '`' => b'\'',
        '\u{2665}' => 0x00,
        '\u{251C}' => 0x01,
        '\u{2518}' => 0x03,
        '\u{2524}' => 0x04,
        '\u{2510}' => 0x05,
        '\u{2571}' => 0x06,
        '\u{2572}' => 0x07,
        '\u{250C}' => 0x11,
        '\u{2500}' => 0x12,
        '\u{253C}' => 0x13,
        '\u{2022}' | '\u{25CF}' => 0x14,
        '\u{2584}' => 0x15,
        '\u{252C}' => 0x17,
        '\u{2534}' => 0x18,
        '\u{258C}' => 0x19,
        '\u{2514}' => 0x1A,
        '\u{2666}' => 0x60,
        '\u{2660}' => 0x7B,
        '\u{2502}' => 0x7C,
        '\u{2588}' => b' ' | INVERSE,
        ' '..='|' => ch as u8,
        _ if ch.is_control() => return None,
        _ => {
            let folded = fold_to_ascii(ch.encode_utf8(&mut [0u8; 4])).into_owned();
            return folded.chars().next().and_then(to_atascii_printable).or(Some(b'?'));
        }
    };
    Some(byte)
}

fn to_atascii_printable(ch: char) -> Option<u8> {
    match ch {
        ' '..='|' if ch != '`' => Some(ch as u8),
        _ => None,
    }
}

impl Protocol for Atascii {
    fn emulation(&self) -> Emulation {
        Emulation::Atascii
    }

    fn foreground(&self, _color: Color) -> &'static [u8] {
        b""
    }

    fn background(&self, _color: Color) -> &'static [u8] {
        b""
    }

    fn style(&self, style: Style) -> &'static [u8] {
        match style {
            Style::ClearScreen => &[CLEAR],
            Style::Home => b"",
            Style::CursorUp => &[CURSOR_UP_KEY],
            Style::CursorDown => &[CURSOR_DOWN_KEY],
            Style::CursorLeft => &[CURSOR_LEFT_KEY],
            Style::CursorRight => &[CURSOR_RIGHT_KEY],
            Style::Backspace => &[BACKSPACE],
            Style::Bell => &[BELL],
            Style::Newline => &[EOL],
        }
    }

    fn replace_inline_colors(&self, text: &str, _state: &TerminalState) -> Rendered {
        let mut out = String::with_capacity(text.len());
        let mut visible = 0;
        let mut reverse = false;

        for (_, token) in markup::tokenize(text) {
            match token {
                MarkupToken::Text(ch) => {
                    let Some(mut byte) = to_atascii(ch) else {
                        continue;
                    };
                    if !ch.is_control() {
                        visible += 1;
                        if reverse && byte < INVERSE {
                            byte += INVERSE;
                        }
                    }
                    out.push(char::from(byte));
                }
                MarkupToken::Reverse => reverse = !reverse,
                MarkupToken::Color(_) | MarkupToken::Invalid(_) | MarkupToken::Unterminated(_) => {}
            }
        }

        Rendered::plain(out, visible)
    }

    fn encode(&self, text: &str, _state: &TerminalState) -> Vec<u8> {
        text.chars()
            .filter_map(|ch| u8::try_from(u32::from(ch)).ok())
            .collect()
    }

    fn decode(&self, bytes: &[u8]) -> String {
        bytes
            .iter()
            .map(|&byte| {
                let base = if byte >= 0xA0 { byte & !INVERSE } else { byte };
                match base {
                    0x20..=0x7C => char::from(base),
                    _ => '?',
                }
            })
            .collect()
    }

    fn interpret_input(&self, raw: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(raw.len());
        for &byte in raw {
            match byte {
                EOL => out.push(KEY_RETURN),
                BACKSPACE => out.push(KEY_BACKSPACE),
                TAB => out.push(KEY_TAB),
                CURSOR_UP_KEY => out.extend_from_slice(CURSOR_UP),
                CURSOR_DOWN_KEY => out.extend_from_slice(CURSOR_DOWN),
                CURSOR_LEFT_KEY => out.extend_from_slice(CURSOR_LEFT),
                CURSOR_RIGHT_KEY => out.extend_from_slice(CURSOR_RIGHT),
                CLEAR | DELETE_LINE | 0x9D..=0x9F | 0xFD..=0xFF => {}
                other => out.push(other),
            }
        }
        out
    }

    fn is_legal_input(&self, byte: u8) -> bool {
        matches!(byte, 0x20..=0x7C | 0xA0..=0xFC)
    }

    fn erase_line(&self, _visible: usize) -> Vec<u8> {
        vec![DELETE_LINE]
    }
}
