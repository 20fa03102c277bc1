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

//! Terminal protocol abstraction
//!
//! A [`Protocol`] knows how one family of terminals draws color and cursor
//! control, which bytes it sends for editing keys, and how text maps to and from
//! its native character set. The terminal core only ever talks to protocols
//! through this trait, so switching emulation mid-session is a pointer swap.
//!
//! Inbound bytes are rewritten by [`Protocol::interpret_input`] into a
//! *canonical* form shared by every emulation:
//!
//! | Key            | Canonical bytes |
//! |----------------|-----------------|
//! | Return         | `0x0D`          |
//! | Line feed      | `0x0A`          |
//! | Backspace      | `0x08` / `0x7F` |
//! | Tab            | `0x09`          |
//! | Interrupt      | `0x03`          |
//! | Escape         | `0x1B`          |
//! | Cursor keys    | `ESC [ A..D`    |
//!
//! Printable bytes stay in the native encoding until [`Protocol::decode`].

pub mod ansi;
pub mod ascii;
pub mod atascii;
pub mod petscii;

use crate::terminal::TerminalState;
use dialtone_common::Color;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::str::FromStr;

pub const KEY_INTERRUPT: u8 = 0x03;
pub const KEY_BACKSPACE: u8 = 0x08;
pub const KEY_TAB: u8 = 0x09;
pub const KEY_LINEFEED: u8 = 0x0A;
pub const KEY_RETURN: u8 = 0x0D;
pub const KEY_ESCAPE: u8 = 0x1B;
pub const KEY_DELETE: u8 = 0x7F;

pub const CURSOR_UP: &[u8] = b"\x1b[A";
pub const CURSOR_DOWN: &[u8] = b"\x1b[B";
pub const CURSOR_RIGHT: &[u8] = b"\x1b[C";
pub const CURSOR_LEFT: &[u8] = b"\x1b[D";

/// Whether a byte is one of the canonical control keys every protocol accepts
pub fn is_canonical_control(byte: u8) -> bool {
    matches!(
        byte,
        KEY_INTERRUPT
            | KEY_BACKSPACE
            | KEY_TAB
            | KEY_LINEFEED
            | KEY_RETURN
            | KEY_ESCAPE
            | KEY_DELETE
    )
}

/// Terminal emulation selected for a session
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emulation {
    /// Plain 7-bit text, no styling
    #[default]
    Ascii,
    /// ANSI/VT100 escape sequences over UTF-8
    Ansi,
    /// Commodore 8-bit character set and control codes
    Petscii,
    /// Atari 8-bit character set and control codes
    Atascii,
}

impl Emulation {
    pub const ALL: [Emulation; 4] = [
        Emulation::Ascii,
        Emulation::Ansi,
        Emulation::Petscii,
        Emulation::Atascii,
    ];

    /// The protocol implementation for this emulation
    pub fn protocol(self) -> &'static dyn Protocol {
        match self {
            Emulation::Ascii => &ascii::Ascii,
            Emulation::Ansi => &ansi::Ansi,
            Emulation::Petscii => &petscii::Petscii,
            Emulation::Atascii => &atascii::Atascii,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Emulation::Ascii => "ascii",
            Emulation::Ansi => "ansi",
            Emulation::Petscii => "petscii",
            Emulation::Atascii => "atascii",
        }
    }
}

impl std::fmt::Display for Emulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Emulation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ascii" | "tty" | "dumb" => Ok(Emulation::Ascii),
            "ansi" | "vt100" => Ok(Emulation::Ansi),
            "petscii" | "c64" | "commodore" => Ok(Emulation::Petscii),
            "atascii" | "atari" => Ok(Emulation::Atascii),
            other => Err(format!("Unknown terminal emulation: {}", other)),
        }
    }
}

/// Non-color control primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    ClearScreen,
    Home,
    CursorUp,
    CursorDown,
    CursorLeft,
    CursorRight,
    /// Erase the character left of the cursor
    Backspace,
    Bell,
    Newline,
}

/// Result of expanding inline markup for one protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Text with markup replaced by protocol codes, not yet encoded
    pub text: String,
    /// Columns the text occupies
    pub visible_len: usize,
    /// The text leaves the terminal in a color other than the active foreground
    pub recolored: bool,
}

impl Rendered {
    pub fn plain(text: String, visible_len: usize) -> Self {
        Self {
            text,
            visible_len,
            recolored: false,
        }
    }
}

/// One terminal family's encoding and control vocabulary
pub trait Protocol: Send + Sync {
    fn emulation(&self) -> Emulation;

    /// Bytes switching the foreground color, empty when unsupported
    fn foreground(&self, color: Color) -> &'static [u8];

    /// Bytes switching the background color, empty when unsupported
    fn background(&self, color: Color) -> &'static [u8];

    fn style(&self, style: Style) -> &'static [u8];

    /// Expand or strip inline markup
    fn replace_inline_colors(&self, text: &str, state: &TerminalState) -> Rendered;

    /// Protocol-specific text substitutions applied after markup expansion
    fn transform_text<'a>(&self, text: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(text)
    }

    /// Convert rendered text to wire bytes
    fn encode(&self, text: &str, _state: &TerminalState) -> Vec<u8> {
        encode_crlf(text)
    }

    /// Convert native input bytes to text
    fn decode(&self, bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    /// Rewrite raw input into canonical form
    fn interpret_input(&self, raw: &[u8]) -> Vec<u8> {
        raw.to_vec()
    }

    /// Whether a printable native byte may appear in typed input
    fn is_legal_input(&self, byte: u8) -> bool;

    /// Zero every byte that is neither legal input nor part of an escape sequence
    fn remove_invalid_input(&self, bytes: &mut [u8]) {
        zero_invalid(bytes, |byte| self.is_legal_input(byte));
    }

    /// Bytes erasing `visible` characters left of the cursor on the current line
    fn erase_line(&self, visible: usize) -> Vec<u8> {
        self.style(Style::Backspace).repeat(visible)
    }

    /// Whether typed input is UTF-8, so a character may span several bytes
    fn is_utf8(&self) -> bool {
        false
    }
}

#[derive(Clone, Copy)]
enum Scan {
    Ground,
    Escape,
    Sequence,
}

/// Zero bytes rejected by `legal`, leaving canonical controls and escape sequences
pub(crate) fn zero_invalid(bytes: &mut [u8], legal: impl Fn(u8) -> bool) {
    let mut scan = Scan::Ground;
    for byte in bytes.iter_mut() {
        scan = match scan {
            Scan::Escape if *byte == b'[' || *byte == b'O' => Scan::Sequence,
            Scan::Sequence if (0x20..=0x3F).contains(byte) => Scan::Sequence,
            Scan::Sequence if (0x40..=0x7E).contains(byte) => Scan::Ground,
            _ if *byte == KEY_ESCAPE => Scan::Escape,
            _ => {
                if !is_canonical_control(*byte) && !legal(*byte) {
                    *byte = 0;
                }
                Scan::Ground
            }
        };
    }
}

/// UTF-8 encode, turning a bare `\n` into `\r\n`
pub(crate) fn encode_crlf(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() + 8);
    let mut previous = '\0';
    for ch in text.chars() {
        if ch == '\n' && previous != '\r' {
            bytes.push(b'\r');
        }
        let mut buf = [0u8; 4];
        bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        previous = ch;
    }
    bytes
}

/// Drop all markup, counting visible characters
pub(crate) fn strip_markup(text: &str) -> Rendered {
    let mut out = String::with_capacity(text.len());
    let mut visible = 0;
    for (_, token) in dialtone_common::markup::tokenize(text) {
        if let dialtone_common::MarkupToken::Text(ch) = token {
            out.push(ch);
            if !ch.is_control() {
                visible += 1;
            }
        }
    }
    Rendered::plain(out, visible)
}

/// Closest 7-bit rendering of a character, `None` for plain ASCII
fn fold_char(ch: char) -> Option<&'static str> {
    let folded = match ch {
        '\u{2018}' | '\u{2019}' | '\u{00B4}' => "'",
        '\u{201C}' | '\u{201D}' | '\u{00AB}' | '\u{00BB}' => "\"",
        '\u{2013}' | '\u{2014}' | '\u{2500}' | '\u{2550}' => "-",
        '\u{2026}' => "...",
        '\u{2022}' | '\u{00B7}' | '\u{25CF}' => "*",
        '\u{2502}' | '\u{2551}' => "|",
        '\u{250C}' | '\u{2510}' | '\u{2514}' | '\u{2518}' | '\u{251C}' | '\u{2524}'
        | '\u{252C}' | '\u{2534}' | '\u{253C}' | '\u{2554}' | '\u{2557}' | '\u{255A}'
        | '\u{255D}' => "+",
        '\u{00A0}' => " ",
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => "A",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'È' | 'É' | 'Ê' | 'Ë' => "E",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => "o",
        'Ö' | 'Ó' | 'Ò' => "O",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'Ü' | 'Ú' | 'Ù' => "U",
        'ç' => "c",
        'ñ' => "n",
        'ß' => "ss",
        _ if ch.is_ascii() => return None,
        _ => "?",
    };
    Some(folded)
}

/// Replace non-ASCII characters with their closest 7-bit rendering
pub(crate) fn fold_to_ascii(text: &str) -> Cow<'_, str> {
    if text.is_ascii() {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match fold_char(ch) {
            Some(folded) => out.push_str(folded),
            None => out.push(ch),
        }
    }
    Cow::Owned(out)
}
