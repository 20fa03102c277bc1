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

//! ANSI/VT100 terminals
//!
//! Colors use SGR sequences. Dark foregrounds cancel bold with `22`, bright
//! ones set it with `1`, so switching between the two halves of the palette never
//! needs a full reset that would also drop the background.

use super::{Emulation, Protocol, Rendered, Style};
use crate::terminal::TerminalState;
use dialtone_common::markup::{self, MarkupToken};
use dialtone_common::Color;

/// Foreground SGR, indexed by color code
const FOREGROUND: [&str; 16] = [
    "\x1b[22;30m",
    "\x1b[22;34m",
    "\x1b[22;32m",
    "\x1b[22;36m",
    "\x1b[22;31m",
    "\x1b[22;35m",
    "\x1b[22;33m",
    "\x1b[22;37m",
    "\x1b[1;30m",
    "\x1b[1;34m",
    "\x1b[1;32m",
    "\x1b[1;36m",
    "\x1b[1;31m",
    "\x1b[1;35m",
    "\x1b[1;33m",
    "\x1b[1;37m",
];

/// Background SGR, indexed by color code. Bright backgrounds share the dark
/// codes since blink-as-bright is not portable.
const BACKGROUND: [&str; 16] = [
    "\x1b[40m", "\x1b[44m", "\x1b[42m", "\x1b[46m", "\x1b[41m", "\x1b[45m", "\x1b[43m", "\x1b[47m",
    "\x1b[40m", "\x1b[44m", "\x1b[42m", "\x1b[46m", "\x1b[41m", "\x1b[45m", "\x1b[43m", "\x1b[47m",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Ansi;

impl Protocol for Ansi {
    fn emulation(&self) -> Emulation {
        Emulation::Ansi
    }

    fn foreground(&self, color: Color) -> &'static [u8] {
        FOREGROUND[usize::from(color.code())].as_bytes()
    }

    fn background(&self, color: Color) -> &'static [u8] {
        BACKGROUND[usize::from(color.code())].as_bytes()
    }

    fn style(&self, style: Style) -> &'static [u8] {
        match style {
            Style::ClearScreen => b"\x1b[2J\x1b[H",
            Style::Home => b"\x1b[H",
            Style::CursorUp => b"\x1b[A",
            Style::CursorDown => b"\x1b[B",
            Style::CursorRight => b"\x1b[C",
            Style::CursorLeft => b"\x1b[D",
            Style::Backspace => b"\x08 \x08",
            Style::Bell => b"\x07",
            Style::Newline => b"\r\n",
        }
    }

    fn replace_inline_colors(&self, text: &str, state: &TerminalState) -> Rendered {
        let mut out = String::with_capacity(text.len() + 16);
        let mut visible = 0;
        let mut last_color = None;

        for (_, token) in markup::tokenize(text) {
            match token {
                MarkupToken::Text(ch) => {
                    out.push(ch);
                    if !ch.is_control() {
                        visible += 1;
                    }
                }
                MarkupToken::Color(color) => {
                    let color = color.resolve(state.foreground);
                    out.push_str(FOREGROUND[usize::from(color.code())]);
                    last_color = Some(color);
                }
                MarkupToken::Reverse | MarkupToken::Invalid(_) | MarkupToken::Unterminated(_) => {}
            }
        }

        Rendered {
            text: out,
            visible_len: visible,
            recolored: last_color.is_some_and(|color| color != state.foreground),
        }
    }

    fn interpret_input(&self, raw: &[u8]) -> Vec<u8> {
        // Application cursor mode sends ESC O x; fold it into ESC [ x.
        let mut out = raw.to_vec();
        for index in 1..out.len() {
            let next = out.get(index + 1).copied();
            if out[index] == b'O'
                && out[index - 1] == super::KEY_ESCAPE
                && matches!(next, Some(b'A'..=b'D'))
            {
                out[index] = b'[';
            }
        }
        out
    }

    fn is_legal_input(&self, byte: u8) -> bool {
        (0x20..=0x7E).contains(&byte) || byte >= 0x80
    }

    fn erase_line(&self, _visible: usize) -> Vec<u8> {
        b"\r\x1b[K".to_vec()
    }

    fn is_utf8(&self) -> bool {
        true
    }
}
