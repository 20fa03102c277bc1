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

//! Terminal capability detection
//!
//! Both probes send a query, wait a fixed delay for the client to answer, then
//! read whatever arrived. Anything unrelated that was typed in the meantime is
//! kept as input.

use super::protocol::KEY_ESCAPE;
use super::{Emulation, Terminal};
use crate::telnet::protocol::{
    TelnetCommand, TelnetOption, build_negotiation, find_window_size_reply,
};
use std::time::Duration;
use tokio::io::AsyncReadExt;

/// Cursor position request, answered by ANSI terminals with `ESC [ row ; col R`
pub const DEVICE_STATUS_REQUEST: [u8; 6] = [KEY_ESCAPE, b'[', b'6', b'n', b'\r', b'\n'];

/// How long to keep reading once replies start arriving
const SETTLE_TIME: Duration = Duration::from_millis(50);

/// Upper bound on bytes collected by one probe
const MAX_PROBE_BYTES: usize = 4096;

impl Terminal {
    /// Ask the client for its window size
    ///
    /// Returns the reported `(columns, rows)` and applies it, or `None` when the
    /// client did not answer within `wait`.
    pub async fn detect_window_size(&mut self, wait: Duration) -> Option<(u16, u16)> {
        if self.is_polling() || !self.is_connected() {
            return None;
        }
        self.queue_command(&build_negotiation(TelnetCommand::WILL, TelnetOption::NAWS));
        if !self.flush().await {
            return None;
        }
        tokio::time::sleep(wait).await;

        let raw = self.read_available().await;
        let size = find_window_size_reply(&raw).filter(|&(columns, rows)| columns > 0 && rows > 0);
        self.ingest(&raw);
        if let Some((columns, rows)) = size {
            tracing::debug!(columns, rows, "Detected window size");
            self.set_size(columns, rows);
        }
        size
    }

    /// Determine whether the client understands ANSI escape sequences
    ///
    /// An escape byte in reply to the cursor position request means yes. A
    /// client that answers with `Y` or `N` instead is taken at its word, and one
    /// that sends nothing is asked directly.
    pub async fn detect_ansi(&mut self, wait: Duration) -> bool {
        if self.is_polling() || !self.is_connected() {
            return false;
        }
        self.queue_command(&DEVICE_STATUS_REQUEST);
        if !self.flush().await {
            return false;
        }
        tokio::time::sleep(wait).await;

        let raw = self.read_available().await;
        let data = self.filter.feed(&raw);
        if let Some((columns, rows)) = self.filter.take_window_size() {
            self.set_size(columns, rows);
        }

        let supported = match data.iter().find(|&&b| !matches!(b, b'\r' | b'\n' | 0)) {
            Some(&KEY_ESCAPE) => true,
            Some(b'y' | b'Y') => true,
            Some(_) => false,
            None => self.ask_ansi().await,
        };
        tracing::debug!(supported, "ANSI detection finished");
        supported
    }

    async fn ask_ansi(&mut self) -> bool {
        self.write("Does this terminal support ANSI color? (Y/N) ");
        let answer = self.input_key().await;
        self.newline();
        self.flush().await;
        matches!(answer, Ok('y' | 'Y'))
    }

    /// Pick ANSI when detected, otherwise keep the current emulation
    pub async fn negotiate_emulation(&mut self, wait: Duration) -> Emulation {
        if self.detect_ansi(wait).await {
            self.set_emulation(Emulation::Ansi);
        }
        self.emulation()
    }

    /// Collect whatever bytes arrive until the line goes quiet
    async fn read_available(&mut self) -> Vec<u8> {
        let mut collected = Vec::new();
        let Some(reader) = self.reader.as_mut() else {
            return collected;
        };
        let mut buffer = [0u8; 256];

        while collected.len() < MAX_PROBE_BYTES {
            match tokio::time::timeout(SETTLE_TIME, reader.read(&mut buffer)).await {
                Ok(Ok(0)) => {
                    self.connected = false;
                    break;
                }
                Ok(Ok(n)) => collected.extend_from_slice(&buffer[..n]),
                Ok(Err(e)) => {
                    tracing::debug!("Read failed during detection: {}", e);
                    self.connected = false;
                    break;
                }
                Err(_) => break,
            }
        }
        collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use crate::terminal::InputFlags;
    use flagset::FlagSet;
    use std::sync::Arc;
    use tokio::io::{AsyncWriteExt, DuplexStream, duplex};

    const WAIT: Duration = Duration::from_millis(10);

    fn terminal(emulation: Emulation) -> (Terminal, DuplexStream) {
        let (client, server) = duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(server);
        let session = Arc::new(Session::new("test"));
        (Terminal::new(emulation, reader, writer, session), client)
    }

    async fn read_some(client: &mut DuplexStream) -> Vec<u8> {
        let mut buffer = [0u8; 256];
        let n = client.read(&mut buffer).await.unwrap();
        buffer[..n].to_vec()
    }

    #[tokio::test]
    async fn test_detect_window_size() {
        let (mut terminal, mut client) = terminal(Emulation::Ascii);
        client
            .write_all(&[255, 253, 31, 255, 250, 31, 0, 132, 0, 43, 255, 240])
            .await
            .unwrap();

        assert_eq!(terminal.detect_window_size(WAIT).await, Some((132, 43)));
        assert_eq!(terminal.columns(), 132);
        assert_eq!(terminal.rows(), 43);
        assert_eq!(read_some(&mut client).await, vec![255, 251, 31]);
    }

    #[tokio::test]
    async fn test_detect_window_size_without_reply() {
        let (mut terminal, _client) = terminal(Emulation::Ascii);
        assert_eq!(terminal.detect_window_size(WAIT).await, None);
        assert_eq!(terminal.columns(), 80);
        assert_eq!(terminal.rows(), 24);
    }

    #[tokio::test]
    async fn test_detect_window_size_keeps_typeahead() {
        let (mut terminal, mut client) = terminal(Emulation::Ascii);
        client
            .write_all(&[b'h', 255, 250, 31, 0, 90, 0, 30, 255, 240, b'i', b'\r'])
            .await
            .unwrap();

        assert_eq!(terminal.detect_window_size(WAIT).await, Some((90, 30)));
        assert_eq!(
            terminal.input_line(FlagSet::<InputFlags>::default()).await.unwrap(),
            Some("hi".to_string())
        );
    }

    #[tokio::test]
    async fn test_detect_ansi_from_cursor_report() {
        let (mut terminal, mut client) = terminal(Emulation::Ascii);
        client.write_all(b"\x1b[24;80R").await.unwrap();

        assert_eq!(terminal.negotiate_emulation(WAIT).await, Emulation::Ansi);
        assert_eq!(read_some(&mut client).await, DEVICE_STATUS_REQUEST.to_vec());
    }

    #[tokio::test]
    async fn test_detect_ansi_from_answer() {
        let (mut terminal, mut client) = terminal(Emulation::Ascii);
        client.write_all(b"n").await.unwrap();
        assert!(!terminal.detect_ansi(WAIT).await);

        client.write_all(b"Y").await.unwrap();
        assert!(terminal.detect_ansi(WAIT).await);
    }

    #[tokio::test]
    async fn test_detect_ansi_asks_when_silent() {
        let (mut terminal, mut client) = terminal(Emulation::Petscii);
        let answer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while !seen.ends_with(b"(y/n) ") {
                seen.extend(read_some(&mut client).await);
            }
            client.write_all(&[0x4E]).await.unwrap();
            client
        });

        assert!(!terminal.detect_ansi(WAIT).await);
        assert_eq!(terminal.emulation(), Emulation::Petscii);
        drop(answer.await.unwrap());
    }
}
