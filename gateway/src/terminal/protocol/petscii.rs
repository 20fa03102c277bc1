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

//! Commodore PETSCII terminals
//!
//! PETSCII colors are single control bytes, so inline color markers are left
//! in the text by [`Petscii::replace_inline_colors`] and spliced into the byte
//! stream by [`Petscii::encode`] once the final byte offsets are known. The
//! machine runs in its lowercase/uppercase character set, where the two ASCII
//! letter ranges are swapped relative to ASCII.

use super::{
    CURSOR_DOWN, CURSOR_LEFT, CURSOR_RIGHT, CURSOR_UP, Emulation, KEY_BACKSPACE, KEY_ESCAPE,
    KEY_LINEFEED, Protocol, Rendered, Style, fold_to_ascii,
};
use crate::terminal::TerminalState;
use dialtone_common::markup::{self, COLOR_DELIMITER, MarkupColor, MarkupToken};
use dialtone_common::Color;
use std::borrow::Cow;

pub const RETURN: u8 = 0x0D;
pub const SHIFT_RETURN: u8 = 0x8D;
pub const CLEAR: u8 = 0x93;
pub const HOME: u8 = 0x13;
pub const DELETE: u8 = 0x14;
pub const CURSOR_UP_KEY: u8 = 0x91;
pub const CURSOR_DOWN_KEY: u8 = 0x11;
pub const CURSOR_RIGHT_KEY: u8 = 0x1D;
pub const CURSOR_LEFT_KEY: u8 = 0x9D;
/// The left-arrow key, used as escape
pub const LEFT_ARROW: u8 = 0x5F;
pub const UNDERSCORE: u8 = 0xA4;

/// Color control bytes, indexed by color code
const FOREGROUND: [&[u8]; 16] = [
    &[0x90], // black
    &[0x1F], // blue
    &[0x1E], // green
    &[0x9F], // cyan
    &[0x1C], // red
    &[0x9C], // purple
    &[0x95], // brown
    &[0x9B], // light gray
    &[0x97], // dark gray
    &[0x9A], // light blue
    &[0x99], // light green
    &[0x9F], // cyan
    &[0x96], // light red
    &[0x9C], // purple
    &[0x9E], // yellow
    &[0x05], // white
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Petscii;

fn to_petscii(ch: char) -> Option<u8> {
    let byte = match ch {
        'a'..='z' => ch as u8 - 0x20,
        'A'..='Z' => ch as u8 + 0x20,
        '_' => UNDERSCORE,
        '\\' => b'/',
        '`' => b'\'',
        '{' => b'(',
        '}' => b')',
        '|' => 0xDD,
        '~' => b'-',
        '\t' => b' ',
        COLOR_DELIMITER => COLOR_DELIMITER as u8,
        ' '..='^' => ch as u8,
        _ if ch.is_control() => return None,
        _ => b'?',
    };
    Some(byte)
}

/// Replace each marker in the byte stream with its color byte
fn splice_colors(bytes: &mut Vec<u8>, state: &TerminalState) {
    let delimiter = COLOR_DELIMITER as u8;
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] != delimiter {
            index += 1;
            continue;
        }
        let Some(offset) = bytes[index + 1..].iter().position(|&b| b == delimiter) else {
            bytes.truncate(index);
            break;
        };
        let end = index + 1 + offset;
        let color = std::str::from_utf8(&bytes[index + 1..end])
            .ok()
            .and_then(MarkupColor::parse);
        match color {
            Some(color) => {
                let code = color.resolve(state.foreground).code();
                bytes[index] = FOREGROUND[usize::from(code)][0];
                bytes.drain(index + 1..=end);
                index += 1;
            }
            None => {
                bytes.drain(index..=end);
            }
        }
    }
}

impl Protocol for Petscii {
    fn emulation(&self) -> Emulation {
        Emulation::Petscii
    }

    fn foreground(&self, color: Color) -> &'static [u8] {
        FOREGROUND[usize::from(color.code())]
    }

    fn background(&self, _color: Color) -> &'static [u8] {
        b""
    }

    fn style(&self, style: Style) -> &'static [u8] {
        match style {
            Style::ClearScreen => &[CLEAR],
            Style::Home => &[HOME],
            Style::CursorUp => &[CURSOR_UP_KEY],
            Style::CursorDown => &[CURSOR_DOWN_KEY],
            Style::CursorRight => &[CURSOR_RIGHT_KEY],
            Style::CursorLeft => &[CURSOR_LEFT_KEY],
            Style::Backspace => &[DELETE],
            Style::Bell => &[0x07],
            Style::Newline => &[RETURN],
        }
    }

    /// Counts columns and drops reverse toggles; color markers stay for [`Petscii::encode`]
    fn replace_inline_colors(&self, text: &str, state: &TerminalState) -> Rendered {
        let mut out = String::with_capacity(text.len());
        let mut visible = 0;
        let mut last_color = None;

        for (range, token) in markup::tokenize(text) {
            match token {
                MarkupToken::Text(ch) => {
                    out.push(ch);
                    if !ch.is_control() {
                        visible += 1;
                    }
                }
                MarkupToken::Color(color) => {
                    out.push_str(&text[range]);
                    last_color = Some(color.resolve(state.foreground));
                }
                MarkupToken::Invalid(_) | MarkupToken::Unterminated(_) => {
                    out.push_str(&text[range]);
                }
                MarkupToken::Reverse => {}
            }
        }

        Rendered {
            text: out,
            visible_len: visible,
            recolored: last_color.is_some_and(|color| color != state.foreground),
        }
    }

    fn transform_text<'a>(&self, text: &'a str) -> Cow<'a, str> {
        fold_to_ascii(text)
    }

    fn encode(&self, text: &str, state: &TerminalState) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(text.len());
        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '\r' => {
                    chars.next_if_eq(&'\n');
                    bytes.push(RETURN);
                }
                '\n' => bytes.push(RETURN),
                other => bytes.extend(to_petscii(other)),
            }
        }
        splice_colors(&mut bytes, state);
        bytes
    }

    fn decode(&self, bytes: &[u8]) -> String {
        bytes
            .iter()
            .map(|&byte| match byte {
                0x41..=0x5A => char::from(byte + 0x20),
                0x61..=0x7A => char::from(byte - 0x20),
                0xC1..=0xDA => char::from(byte - 0x80),
                UNDERSCORE => '_',
                0x5C => '\u{a3}',
                0x00..=0x7F => char::from(byte),
                _ => '?',
            })
            .collect()
    }

    fn interpret_input(&self, raw: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(raw.len());
        for &byte in raw {
            match byte {
                DELETE => out.push(KEY_BACKSPACE),
                SHIFT_RETURN => out.push(KEY_LINEFEED),
                LEFT_ARROW => out.push(KEY_ESCAPE),
                CURSOR_UP_KEY => out.extend_from_slice(CURSOR_UP),
                CURSOR_DOWN_KEY => out.extend_from_slice(CURSOR_DOWN),
                CURSOR_RIGHT_KEY => out.extend_from_slice(CURSOR_RIGHT),
                CURSOR_LEFT_KEY => out.extend_from_slice(CURSOR_LEFT),
                CLEAR | HOME => {}
                other => out.push(other),
            }
        }
        out
    }

    fn is_legal_input(&self, byte: u8) -> bool {
        matches!(byte, 0x20..=0x5E | 0x61..=0x7A | UNDERSCORE | 0xC1..=0xDA)
    }
}
