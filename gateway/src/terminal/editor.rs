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

//! Line editing over canonical input bytes

use super::InputFlags;
use super::protocol::{
    KEY_BACKSPACE, KEY_DELETE, KEY_ESCAPE, KEY_INTERRUPT, KEY_LINEFEED, KEY_RETURN, KEY_TAB,
};
use flagset::FlagSet;

/// Characters accepted as a complete command when typed on an empty line
pub const SINGLE_KEY_COMMANDS: [u8; 14] = [
    b'?', b'<', b'>', b'[', b']', b'{', b'}', b'+', b'-', b'=', b'!', b'.', b',', b'/',
];

/// Echoed instead of each character of a password
pub const PASSWORD_MASK: u8 = b'*';

/// Consecutive escapes that end the session
pub const ESCAPES_TO_LOGOUT: usize = 3;

/// Longest line accepted, in bytes
pub const MAX_LINE_BYTES: usize = 1024;

/// What the terminal should do after one input byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditAction {
    /// Nothing to echo
    Nothing,
    /// Echo one native byte
    Echo(u8),
    /// Erase this many characters left of the cursor
    Erase(usize),
    /// A newline was inserted into the buffer
    Newline,
    /// Tab was pressed with autocomplete enabled
    Complete,
    /// Cursor-up was pressed with recall enabled
    Recall,
    /// The line is complete
    Submit,
    /// A single-key command completed the line; echo it first
    Shortcut(u8),
    /// The interrupt key cancelled the line
    Cancel,
    /// Repeated escapes asked to end the session
    Logout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EscapeState {
    Ground,
    Escape,
    Sequence,
}

/// Buffer and key handling for one line of input
#[derive(Debug)]
pub struct LineEditor {
    flags: FlagSet<InputFlags>,
    utf8: bool,
    buffer: Vec<u8>,
    escape: EscapeState,
    escapes: usize,
    after_return: bool,
}

impl LineEditor {
    /// `after_return` is whether the previous line ended with a carriage return,
    /// so a following line feed belongs to it
    pub fn new(flags: impl Into<FlagSet<InputFlags>>, utf8: bool, after_return: bool) -> Self {
        Self {
            flags: flags.into(),
            utf8,
            buffer: Vec::new(),
            escape: EscapeState::Ground,
            escapes: 0,
            after_return,
        }
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn after_return(&self) -> bool {
        self.after_return
    }

    /// Take the finished line
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    /// Characters currently shown for the buffer
    pub fn visible_len(&self) -> usize {
        if self.utf8 {
            self.buffer.iter().filter(|&&b| !is_continuation(b)).count()
        } else {
            self.buffer.len()
        }
    }

    /// Replace the buffer, returning how many characters to erase first
    pub fn replace(&mut self, bytes: Vec<u8>) -> usize {
        let erase = self.visible_len();
        self.buffer = bytes;
        self.buffer.truncate(MAX_LINE_BYTES);
        erase
    }

    /// Bytes to echo for the current buffer
    pub fn echo_bytes(&self) -> Vec<u8> {
        if self.flags.contains(InputFlags::Password) {
            vec![PASSWORD_MASK; self.visible_len()]
        } else {
            self.buffer.clone()
        }
    }

    /// Process one canonical input byte
    pub fn feed(&mut self, byte: u8) -> EditAction {
        let after_return = std::mem::replace(&mut self.after_return, false);

        if byte == KEY_ESCAPE {
            self.escapes += 1;
            self.escape = EscapeState::Escape;
            if self.escapes >= ESCAPES_TO_LOGOUT {
                return EditAction::Logout;
            }
            return EditAction::Nothing;
        }
        self.escapes = 0;

        match self.escape {
            EscapeState::Escape if byte == b'[' || byte == b'O' => {
                self.escape = EscapeState::Sequence;
                return EditAction::Nothing;
            }
            EscapeState::Sequence if (0x20..=0x3F).contains(&byte) => {
                return EditAction::Nothing;
            }
            EscapeState::Sequence => {
                self.escape = EscapeState::Ground;
                if byte == b'A' && self.flags.contains(InputFlags::RecallLastLine) {
                    return EditAction::Recall;
                }
                return EditAction::Nothing;
            }
            EscapeState::Escape | EscapeState::Ground => self.escape = EscapeState::Ground,
        }

        match byte {
            KEY_RETURN => {
                self.after_return = true;
                EditAction::Submit
            }
            KEY_LINEFEED if after_return => EditAction::Nothing,
            KEY_LINEFEED if self.flags.contains(InputFlags::AllowNewline) => {
                if self.buffer.len() < MAX_LINE_BYTES {
                    self.buffer.push(b'\n');
                    EditAction::Newline
                } else {
                    EditAction::Nothing
                }
            }
            KEY_LINEFEED => EditAction::Nothing,
            KEY_BACKSPACE | KEY_DELETE => self.backspace(),
            KEY_TAB if self.flags.contains(InputFlags::Autocomplete) => EditAction::Complete,
            KEY_INTERRUPT => {
                self.buffer.clear();
                EditAction::Cancel
            }
            0x00..=0x1F => EditAction::Nothing,
            _ => self.insert(byte),
        }
    }

    fn backspace(&mut self) -> EditAction {
        if self.buffer.is_empty() {
            return EditAction::Nothing;
        }
        if self.utf8 {
            while let Some(byte) = self.buffer.pop() {
                if !is_continuation(byte) {
                    break;
                }
            }
        } else {
            self.buffer.pop();
        }
        EditAction::Erase(1)
    }

    fn insert(&mut self, byte: u8) -> EditAction {
        if self.buffer.is_empty()
            && self.flags.contains(InputFlags::SingleKeyCommands)
            && SINGLE_KEY_COMMANDS.contains(&byte)
        {
            self.buffer.push(byte);
            return EditAction::Shortcut(byte);
        }
        if self.buffer.len() >= MAX_LINE_BYTES {
            return EditAction::Nothing;
        }
        self.buffer.push(byte);
        if !self.flags.contains(InputFlags::Password) {
            EditAction::Echo(byte)
        } else if self.utf8 && is_continuation(byte) {
            EditAction::Nothing
        } else {
            EditAction::Echo(PASSWORD_MASK)
        }
    }
}

fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}
