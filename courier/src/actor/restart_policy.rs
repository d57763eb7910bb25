/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

//! Restart policies for supervised actors.
//!
//! - [`RestartPolicy::Permanent`]: always restart (except during parent shutdown)
//! - [`RestartPolicy::Temporary`]: never restart
//! - [`RestartPolicy::Transient`]: restart only after abnormal termination

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether a supervisor should rebuild a child after it fails or stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RestartPolicy {
    /// Always restart.
    #[default]
    Permanent,
    /// Never restart.
    Temporary,
    /// Restart only when the termination was abnormal.
    Transient,
}

/// Why an actor stopped or was reported as failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Orderly stop.
    Normal,
    /// A handler panicked; carries the panic message.
    Panic(String),
    /// A fallible handler returned an error; carries its rendering.
    Error(String),
    /// The parent is shutting down.
    ParentShutdown,
}

impl TerminationReason {
    /// Returns `true` for panics and handler errors.
    pub const fn is_abnormal(&self) -> bool {
        matches!(self, Self::Panic(_) | Self::Error(_))
    }
}

impl RestartPolicy {
    /// Decides whether a child terminated for `reason` should be restarted.
    #[must_use]
    pub const fn should_restart(&self, reason: &TerminationReason) -> bool {
        if matches!(reason, TerminationReason::ParentShutdown) {
            return false;
        }

        match self {
            Self::Permanent => true,
            Self::Temporary => false,
            Self::Transient => reason.is_abnormal(),
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permanent => write!(f, "permanent"),
            Self::Temporary => write!(f, "temporary"),
            Self::Transient => write!(f, "transient"),
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal shutdown"),
            Self::Panic(msg) => write!(f, "panic: {msg}"),
            Self::Error(msg) => write!(f, "handler error: {msg}"),
            Self::ParentShutdown => write!(f, "parent shutdown"),
        }
    }
}
