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

//! Telnet hosting for the terminal codec
//!
//! Each accepted connection gets a [`Session`], a [`Terminal`] over the split
//! socket, capability detection, and a [`Shell`] command loop.

use crate::config::Configuration;
use crate::session::Session;
use crate::shell::Shell;
use crate::terminal::{Emulation, Terminal};
use dialtone_common::SessionContext;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

pub mod protocol;

/// Per-connection terminal settings
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub default_emulation: Emulation,
    pub columns: u16,
    pub rows: u16,
    pub detect_window_size: bool,
    pub detect_ansi: bool,
    pub probe_delay: Duration,
    pub idle_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from(&Configuration::default())
    }
}

impl From<&Configuration> for ConnectionSettings {
    fn from(config: &Configuration) -> Self {
        Self {
            default_emulation: *config.terminal.default_emulation,
            columns: config.terminal.columns,
            rows: config.terminal.rows,
            detect_window_size: config.terminal.detect_window_size,
            detect_ansi: config.terminal.detect_ansi,
            probe_delay: config.terminal.probe_delay(),
            idle_timeout: config.session.idle_timeout(),
        }
    }
}

/// Telnet server
pub struct TelnetServer {
    settings: ConnectionSettings,
}

impl TelnetServer {
    /// Create a new telnet server
    pub fn new(settings: ConnectionSettings) -> Self {
        Self { settings }
    }

    /// Run the telnet server
    pub async fn run(self, listener: TcpListener) -> std::io::Result<()> {
        tracing::info!("Telnet server accepting connections...");

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    tracing::info!("New telnet connection from {}", addr);
                    let settings = self.settings.clone();
                    tokio::spawn(handle_connection(stream, addr, settings));
                }
                Err(e) => {
                    tracing::error!("Error accepting telnet connection: {}", e);
                }
            }
        }
    }
}

/// Handle a single telnet connection
async fn handle_connection(stream: TcpStream, addr: SocketAddr, settings: ConnectionSettings) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!("Unable to disable Nagle for {}: {}", addr, e);
    }
    let (reader, writer) = stream.into_split();
    let session = Arc::new(Session::new(addr.to_string()));
    serve(reader, writer, session, &settings).await;
    tracing::info!("Telnet connection from {} closed", addr);
}

/// Run a full session over any byte stream
#[tracing::instrument(skip_all, fields(session_id = %session.session_id, peer = %session.client_addr))]
pub async fn serve<R, W>(reader: R, writer: W, session: Arc<Session>, settings: &ConnectionSettings)
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let reaper = session.spawn_idle_reaper(settings.idle_timeout);
    let mut terminal = Terminal::new(settings.default_emulation, reader, writer, session.clone());
    terminal.set_size(settings.columns, settings.rows);

    if settings.detect_window_size {
        match terminal.detect_window_size(settings.probe_delay).await {
            Some((columns, rows)) => tracing::info!(columns, rows, "Client reported window size"),
            None => tracing::debug!("No window size reply"),
        }
    }
    if settings.detect_ansi {
        let emulation = terminal.negotiate_emulation(settings.probe_delay).await;
        tracing::info!(%emulation, "Terminal emulation selected");
    }

    let mut shell = Shell::new(&mut terminal);
    if let Err(e) = shell.run().await {
        tracing::debug!("Shell ended: {}", e);
    }

    terminal.close().await;
    session.force_logout();
    if let Err(e) = reaper.await {
        tracing::warn!("Idle reaper failed: {}", e);
    }
}
