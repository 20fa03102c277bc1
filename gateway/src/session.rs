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

//! Gateway session tracking
//!
//! A [`Session`] is created for every accepted connection. It carries the
//! logout token shared by the terminal, its key poller and the idle reaper, so
//! cancelling it from any of them ends the whole connection.

use chrono::{DateTime, TimeZone, Utc};
use dialtone_common::SessionContext;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A client connection's session
#[derive(Debug)]
pub struct Session {
    /// Unique session identifier
    pub session_id: Uuid,

    /// Client address
    pub client_addr: String,

    /// Session creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity, in milliseconds since the Unix epoch
    last_activity: AtomicI64,

    logout: CancellationToken,
}

impl Session {
    /// Create a new session
    pub fn new(client_addr: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            client_addr: client_addr.into(),
            created_at: now,
            last_activity: AtomicI64::new(now.timestamp_millis()),
            logout: CancellationToken::new(),
        }
    }

    /// Update last activity timestamp
    pub fn touch(&self) {
        self.last_activity
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// Last activity timestamp
    pub fn last_activity(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.last_activity.load(Ordering::Relaxed))
            .single()
            .unwrap_or(self.created_at)
    }

    /// Check if the session has been idle for longer than `timeout`
    pub fn is_idle(&self, timeout: Duration) -> bool {
        let idle = Utc::now().signed_duration_since(self.last_activity());
        idle.to_std().is_ok_and(|idle| idle > timeout)
    }

    /// Spawn a task that logs the session out once it has been idle for `timeout`
    ///
    /// The task ends when the session logs out for any reason.
    pub fn spawn_idle_reaper(self: &Arc<Self>, timeout: Duration) -> JoinHandle<()> {
        let session = Arc::clone(self);
        let interval = (timeout / 4).clamp(Duration::from_millis(10), Duration::from_secs(30));
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = session.logout.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        if session.is_idle(timeout) {
                            tracing::info!(
                                session_id = %session.session_id,
                                "Session idle for more than {:?}, logging out",
                                timeout
                            );
                            session.force_logout();
                            break;
                        }
                    }
                }
            }
        })
    }
}

impl SessionContext for Session {
    fn logout_token(&self) -> &CancellationToken {
        &self.logout
    }

    fn reset_idle_timer(&self) {
        self.touch();
    }
}
