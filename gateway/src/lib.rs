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

//! Dialtone Gateway Library
//!
//! This library provides the terminal codec for the Dialtone gateway: telnet
//! filtering, per-emulation rendering and input, paged output, line editing,
//! key polling and the telnet hosting that ties them to a session.

pub mod config;
pub mod session;
pub mod shell;
pub mod telnet;
pub mod terminal;

// Re-export commonly used types
pub use session::Session;
pub use telnet::{ConnectionSettings, TelnetServer};
pub use terminal::{Emulation, InputFlags, OutputFlags, Terminal, TerminalError};
