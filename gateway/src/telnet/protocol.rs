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

//! Telnet protocol constants and utilities
//!
//! This module defines the telnet commands and options the gateway cares about,
//! the window-size (NAWS) helpers used for auto-detection, and a stateful filter
//! that removes telnet command sequences from inbound data.

/// Telnet command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TelnetCommand {
    /// Interpret As Command
    IAC = 255,
    /// Don't do option
    DONT = 254,
    /// Do option
    DO = 253,
    /// Won't do option
    WONT = 252,
    /// Will do option
    WILL = 251,
    /// Subnegotiation begin
    SB = 250,
    /// Go ahead
    GA = 249,
    /// Erase line
    EL = 248,
    /// Erase character
    EC = 247,
    /// Are you there
    AYT = 246,
    /// Abort output
    AO = 245,
    /// Interrupt process
    IP = 244,
    /// Break
    BRK = 243,
    /// Data mark
    DM = 242,
    /// No operation
    NOP = 241,
    /// Subnegotiation end
    SE = 240,
}

impl TelnetCommand {
    /// Convert byte to telnet command
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            255 => Some(Self::IAC),
            254 => Some(Self::DONT),
            253 => Some(Self::DO),
            252 => Some(Self::WONT),
            251 => Some(Self::WILL),
            250 => Some(Self::SB),
            249 => Some(Self::GA),
            248 => Some(Self::EL),
            247 => Some(Self::EC),
            246 => Some(Self::AYT),
            245 => Some(Self::AO),
            244 => Some(Self::IP),
            243 => Some(Self::BRK),
            242 => Some(Self::DM),
            241 => Some(Self::NOP),
            240 => Some(Self::SE),
            _ => None,
        }
    }

    /// Convert command to byte
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Telnet option codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TelnetOption {
    /// Binary transmission
    Binary = 0,
    /// Echo
    Echo = 1,
    /// Suppress go ahead
    SuppressGoAhead = 3,
    /// Terminal type
    TerminalType = 24,
    /// Negotiate about window size (NAWS)
    NAWS = 31,
    /// Linemode
    Linemode = 34,
}

impl TelnetOption {
    /// Convert byte to telnet option
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Binary),
            1 => Some(Self::Echo),
            3 => Some(Self::SuppressGoAhead),
            24 => Some(Self::TerminalType),
            31 => Some(Self::NAWS),
            34 => Some(Self::Linemode),
            _ => None,
        }
    }

    /// Convert option to byte
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Build a telnet negotiation sequence
pub fn build_negotiation(command: TelnetCommand, option: TelnetOption) -> [u8; 3] {
    [
        TelnetCommand::IAC.to_byte(),
        command.to_byte(),
        option.to_byte(),
    ]
}

/// Parse window size from NAWS subnegotiation data
pub fn parse_window_size(data: &[u8]) -> Option<(u16, u16)> {
    if data.len() >= 4 {
        let width = u16::from_be_bytes([data[0], data[1]]);
        let height = u16::from_be_bytes([data[2], data[3]]);
        Some((width, height))
    } else {
        None
    }
}

/// Locate an `IAC SB NAWS` reply in raw input and read the window size after it
pub fn find_window_size_reply(data: &[u8]) -> Option<(u16, u16)> {
    let prefix = [
        TelnetCommand::IAC.to_byte(),
        TelnetCommand::SB.to_byte(),
        TelnetOption::NAWS.to_byte(),
    ];
    let start = data.windows(prefix.len()).position(|window| window == prefix)?;
    parse_window_size(data.get(start + prefix.len()..)?)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum FilterState {
    #[default]
    Data,
    Iac,
    Negotiate,
    Subnegotiation,
    SubnegotiationIac,
}

/// Longest subnegotiation payload kept before the sequence is abandoned
pub const MAX_SUBNEGOTIATION_BYTES: usize = 64;

/// Removes telnet command sequences from inbound bytes
///
/// Sequences may straddle reads, so the filter keeps its state between calls.
/// Window-size reports seen along the way are remembered until taken.
#[derive(Debug, Clone, Default)]
pub struct TelnetFilter {
    state: FilterState,
    subnegotiation: Vec<u8>,
    window_size: Option<(u16, u16)>,
}

impl TelnetFilter {
    /// Create a new filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter a chunk of raw input, returning only application data
    pub fn feed(&mut self, input: &[u8]) -> Vec<u8> {
        let iac = TelnetCommand::IAC.to_byte();
        let mut data = Vec::with_capacity(input.len());

        for &byte in input {
            self.state = match self.state {
                FilterState::Data if byte == iac => FilterState::Iac,
                FilterState::Data => {
                    data.push(byte);
                    FilterState::Data
                }
                FilterState::Iac => match TelnetCommand::from_byte(byte) {
                    Some(TelnetCommand::IAC) => {
                        data.push(byte);
                        FilterState::Data
                    }
                    Some(TelnetCommand::SB) => {
                        self.subnegotiation.clear();
                        FilterState::Subnegotiation
                    }
                    Some(
                        TelnetCommand::WILL
                        | TelnetCommand::WONT
                        | TelnetCommand::DO
                        | TelnetCommand::DONT,
                    ) => FilterState::Negotiate,
                    _ => FilterState::Data,
                },
                FilterState::Negotiate => FilterState::Data,
                FilterState::Subnegotiation if byte == iac => FilterState::SubnegotiationIac,
                FilterState::Subnegotiation => self.push_subnegotiation(byte, &mut data),
                FilterState::SubnegotiationIac => match TelnetCommand::from_byte(byte) {
                    Some(TelnetCommand::IAC) => self.push_subnegotiation(byte, &mut data),
                    Some(TelnetCommand::SE) => {
                        self.finish_subnegotiation();
                        FilterState::Data
                    }
                    _ => FilterState::Data,
                },
            };
        }

        data
    }

    /// Take the most recent window-size report, if any
    pub fn take_window_size(&mut self) -> Option<(u16, u16)> {
        self.window_size.take()
    }

    /// Buffer a subnegotiation byte, falling back to data once the payload is too long
    fn push_subnegotiation(&mut self, byte: u8, data: &mut Vec<u8>) -> FilterState {
        if self.subnegotiation.len() >= MAX_SUBNEGOTIATION_BYTES {
            tracing::debug!(
                option = ?self.subnegotiation.first(),
                "Unterminated subnegotiation abandoned"
            );
            self.subnegotiation.clear();
            data.push(byte);
            return FilterState::Data;
        }
        self.subnegotiation.push(byte);
        FilterState::Subnegotiation
    }

    fn finish_subnegotiation(&mut self) {
        if let Some((&option, payload)) = self.subnegotiation.split_first() {
            if option == TelnetOption::NAWS.to_byte() {
                if let Some(size) = parse_window_size(payload) {
                    tracing::debug!(columns = size.0, rows = size.1, "Window size report");
                    self.window_size = Some(size);
                }
            }
        }
        self.subnegotiation.clear();
    }
}
