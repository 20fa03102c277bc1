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

//! Session contract consumed by the terminal codec
//!
//! Sessions are owned by the hosting server. The codec only needs to observe a
//! forced logout and to report activity so idle timers restart.

use tokio_util::sync::CancellationToken;

/// Per-connection context a terminal is bound to
pub trait SessionContext: Send + Sync {
    /// Token cancelled when the session must log out
    ///
    /// Long-running interactive loops await this alongside their reads so that
    /// a forced logout always unblocks them.
    fn logout_token(&self) -> &CancellationToken;

    /// Restart the idle clock after input was received
    fn reset_idle_timer(&self);

    /// Check whether a logout has been requested
    fn is_logged_out(&self) -> bool {
        self.logout_token().is_cancelled()
    }

    /// Request an immediate logout
    fn force_logout(&self) {
        self.logout_token().cancel();
    }
}
