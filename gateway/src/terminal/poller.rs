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

//! Background key polling
//!
//! While polling, a task owns the connection's read half and publishes the
//! latest key through a watch channel. Any number of observers may subscribe,
//! and the foreground waits for a key newer than the last one it consumed.
//! Stopping the task hands the read half back.

use super::protocol::{KEY_ESCAPE, Protocol};
use super::{TerminalError, TerminalReader};
use crate::telnet::protocol::TelnetFilter;
use dialtone_common::SessionContext;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Most recent key seen by the poller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolledKey {
    /// First canonical byte of the latest input, `None` before any key arrives
    pub key: Option<u8>,
    /// Rest of the escape sequence when `key` is an escape, such as `[A`
    pub sequence: Vec<u8>,
    /// Increments with every published key
    pub tick: u64,
}

/// What the polling task hands back when it ends
pub(crate) struct PollerExit {
    pub reader: TerminalReader,
    pub filter: TelnetFilter,
    pub connected: bool,
}

/// Handle to a running polling task
pub(crate) struct KeyPoller {
    keys: watch::Receiver<PolledKey>,
    cancel: CancellationToken,
    handle: JoinHandle<PollerExit>,
}

impl KeyPoller {
    pub fn spawn(
        reader: TerminalReader,
        filter: TelnetFilter,
        protocol: &'static dyn Protocol,
        session: Arc<dyn SessionContext>,
    ) -> Self {
        let (sender, keys) = watch::channel(PolledKey::default());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(poll_keys(
            reader,
            filter,
            protocol,
            session,
            sender,
            cancel.clone(),
        ));
        Self {
            keys,
            cancel,
            handle,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PolledKey> {
        self.keys.clone()
    }

    /// Wait for a key published after `tick`
    pub async fn next_after(
        &mut self,
        tick: u64,
        logout: &CancellationToken,
    ) -> Result<PolledKey, TerminalError> {
        tokio::select! {
            _ = logout.cancelled() => Err(TerminalError::LoggedOut),
            key = self.keys.wait_for(|key| key.tick > tick) => match key {
                Ok(key) => Ok(key.clone()),
                Err(_) => Err(TerminalError::Disconnected),
            },
        }
    }

    /// Ask the task to stop without waiting for it
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stop the task and reclaim the read half
    pub async fn stop(self) -> Result<PollerExit, TerminalError> {
        self.cancel.cancel();
        self.handle
            .await
            .map_err(|e| TerminalError::Poller(e.to_string()))
    }
}

#[tracing::instrument(level = "debug", skip_all)]
async fn poll_keys(
    mut reader: TerminalReader,
    mut filter: TelnetFilter,
    protocol: &'static dyn Protocol,
    session: Arc<dyn SessionContext>,
    sender: watch::Sender<PolledKey>,
    cancel: CancellationToken,
) -> PollerExit {
    let mut buffer = [0u8; 256];
    let mut tick = 0;
    let mut connected = true;

    tracing::debug!("Key polling started");
    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = session.logout_token().cancelled() => break,
            read = reader.read(&mut buffer) => read,
        };

        match read {
            Ok(0) => {
                tracing::debug!("Connection closed while polling");
                connected = false;
                break;
            }
            Ok(n) => {
                let data = filter.feed(&buffer[..n]);
                let mut canonical = protocol.interpret_input(&data);
                protocol.remove_invalid_input(&mut canonical);
                session.reset_idle_timer();
                if let Some((key, sequence)) = first_key(&canonical) {
                    tick += 1;
                    sender.send_replace(PolledKey {
                        key: Some(key),
                        sequence,
                        tick,
                    });
                }
            }
            Err(e) => {
                tracing::warn!("Read failed while polling: {}", e);
                connected = false;
                break;
            }
        }
    }
    tracing::debug!(keys = tick, "Key polling stopped");

    PollerExit {
        reader,
        filter,
        connected,
    }
}

/// First key in a chunk of canonical input, keeping an escape sequence whole
fn first_key(canonical: &[u8]) -> Option<(u8, Vec<u8>)> {
    let start = canonical.iter().position(|&b| b != 0)?;
    let key = canonical[start];
    if key != KEY_ESCAPE {
        return Some((key, Vec::new()));
    }

    let rest = &canonical[start + 1..];
    let Some(&introducer) = rest.first().filter(|&&b| b == b'[' || b == b'O') else {
        return Some((key, Vec::new()));
    };
    let mut sequence = vec![introducer];
    for &byte in &rest[1..] {
        sequence.push(byte);
        if !(0x20..=0x3F).contains(&byte) {
            break;
        }
    }
    Some((key, sequence))
}
