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

use crate::terminal::{DEFAULT_COLUMNS, DEFAULT_ROWS, Emulation};
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_env_field::EnvField;
use std::net::{AddrParseError, IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Arguments {
    #[arg(
        short = 'c',
        long = "config",
        help = "Path to configuration file",
        default_value = "gateway/config.yaml"
    )]
    pub config_file: String,

    #[arg(
        short = 'e',
        long = "env",
        help = "Path to environment file",
        default_value = "gateway/.env"
    )]
    pub env_file: Option<String>,
}

impl Default for Arguments {
    fn default() -> Self {
        Self {
            config_file: "config.yaml".to_string(),
            env_file: Some(".env".to_string()),
        }
    }
}

/// Errors loading the configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to open config file: {0}")]
    Open(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub telnet: TelnetConfig,

    #[serde(default)]
    pub terminal: TerminalConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

impl Configuration {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        tracing::debug!("Loading configuration from file: {}", path);
        let file = std::fs::File::open(path)?;
        let conf = serde_yaml::from_reader(file)?;
        Ok(conf)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TelnetConfig {
    #[serde(default)]
    pub addr: EnvField<TelnetBinding>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TelnetBinding(SocketAddr);

impl TelnetBinding {
    pub fn to_addr(&self) -> SocketAddr {
        self.0
    }
    pub fn to_ip(&self) -> IpAddr {
        self.0.ip()
    }
    pub fn to_port(&self) -> u16 {
        self.0.port()
    }
}

impl FromStr for TelnetBinding {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(SocketAddr::from_str(s)?))
    }
}

impl Default for TelnetBinding {
    fn default() -> Self {
        Self(SocketAddr::V4(SocketAddrV4::new(
            Ipv4Addr::new(0, 0, 0, 0),
            2323,
        )))
    }
}

impl std::fmt::Display for TelnetBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal defaults and detection for new connections
#[derive(Debug, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Emulation used until detection or the user picks another
    #[serde(default)]
    pub default_emulation: EnvField<Emulation>,

    #[serde(default = "default_columns")]
    pub columns: u16,

    #[serde(default = "default_rows")]
    pub rows: u16,

    /// Ask the client for its window size on connect
    #[serde(default = "default_true")]
    pub detect_window_size: bool,

    /// Probe for ANSI support on connect
    #[serde(default = "default_true")]
    pub detect_ansi: bool,

    /// How long to wait for probe replies, in milliseconds
    #[serde(default = "default_probe_delay_ms")]
    pub probe_delay_ms: u64,
}

fn default_columns() -> u16 {
    DEFAULT_COLUMNS
}

fn default_rows() -> u16 {
    DEFAULT_ROWS
}

fn default_true() -> bool {
    true
}

fn default_probe_delay_ms() -> u64 {
    500
}

impl TerminalConfig {
    pub fn probe_delay(&self) -> Duration {
        Duration::from_millis(self.probe_delay_ms)
    }
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            default_emulation: Default::default(),
            columns: default_columns(),
            rows: default_rows(),
            detect_window_size: true,
            detect_ansi: true,
            probe_delay_ms: default_probe_delay_ms(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle time before a session is logged out, in seconds (default: 900)
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
}

fn default_idle_timeout() -> u64 {
    900
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}
