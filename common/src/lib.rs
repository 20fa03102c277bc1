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

//! Dialtone Common Types
//!
//! This crate defines the protocol-independent vocabulary shared by the Dialtone
//! gateway and anything that produces text for it:
//! - The fixed 16-entry terminal color palette
//! - The inline markup language embedded in application strings
//! - The session contract the terminal codec consumes

pub mod color;
pub mod markup;
pub mod session;

pub use color::Color;
pub use markup::{MarkupColor, MarkupToken};
pub use session::SessionContext;
