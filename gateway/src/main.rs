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

use clap::Parser;
use dialtone_gateway::config::{Arguments, Configuration};
use dialtone_gateway::telnet::{ConnectionSettings, TelnetServer};
use tokio::net::TcpListener;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load arguments from the command line
    let arguments: Arguments = Parser::parse();

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .with_ansi(true)
        .init();

    // Load environment variables from .env file if specified
    if let Some(ref env_file) = arguments.env_file {
        if std::path::Path::new(env_file).exists() {
            tracing::debug!("Loading environment variables from file: {}", env_file);
            dotenv::from_filename(env_file).ok();
        }
    } else {
        tracing::debug!("Loading environment variables from default file");
        dotenv::dotenv().ok();
    }

    // Load configuration from a file with environment variable substitution
    let config = match Configuration::load(&arguments.config_file) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration load error: {}", e);
            std::process::exit(1);
        }
    };

    debug!("Configuration loaded: {:?}", config);
    info!("Starting Dialtone Gateway...");

    let addr = config.telnet.addr.to_addr();
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind telnet listener on {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("Telnet server listening on {}", addr);

    let server = TelnetServer::new(ConnectionSettings::from(&config));

    tokio::select! {
        result = server.run(listener) => {
            if let Err(e) = result {
                error!("Telnet server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    info!("Dialtone Gateway stopped");
}
