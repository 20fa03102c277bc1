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

//! Terminal color palette
//!
//! Every emulation maps the same sixteen logical colors onto its own control
//! bytes. The numeric codes are the ones application markup uses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical terminal color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    DarkBlue = 1,
    DarkGreen = 2,
    DarkCyan = 3,
    DarkRed = 4,
    DarkMagenta = 5,
    DarkYellow = 6,
    Gray = 7,
    DarkGray = 8,
    Blue = 9,
    Green = 10,
    Cyan = 11,
    Red = 12,
    Magenta = 13,
    Yellow = 14,
    White = 15,
}

impl Color {
    /// All colors in code order
    pub const ALL: [Color; 16] = [
        Color::Black,
        Color::DarkBlue,
        Color::DarkGreen,
        Color::DarkCyan,
        Color::DarkRed,
        Color::DarkMagenta,
        Color::DarkYellow,
        Color::Gray,
        Color::DarkGray,
        Color::Blue,
        Color::Green,
        Color::Cyan,
        Color::Red,
        Color::Magenta,
        Color::Yellow,
        Color::White,
    ];

    /// Convert a markup code to a color
    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }

    /// Markup code of this color
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Bright half of the palette (codes 8 through 15)
    pub fn is_bright(self) -> bool {
        self.code() >= 8
    }

    /// Name as used in configuration and shell output
    pub fn name(self) -> &'static str {
        match self {
            Color::Black => "black",
            Color::DarkBlue => "darkblue",
            Color::DarkGreen => "darkgreen",
            Color::DarkCyan => "darkcyan",
            Color::DarkRed => "darkred",
            Color::DarkMagenta => "darkmagenta",
            Color::DarkYellow => "darkyellow",
            Color::Gray => "gray",
            Color::DarkGray => "darkgray",
            Color::Blue => "blue",
            Color::Green => "green",
            Color::Cyan => "cyan",
            Color::Red => "red",
            Color::Magenta => "magenta",
            Color::Yellow => "yellow",
            Color::White => "white",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|color| color.name() == wanted)
            .ok_or_else(|| format!("Unknown color: {}", s))
    }
}
