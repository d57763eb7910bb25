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

use std::fmt;
use std::time::Duration;

use crate::message::Pid;

/// Errors raised while delivering a message or waiting for a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// The target's mailbox is closed.
    InboxClosed(Pid),
    /// No reply arrived in time.
    Timeout {
        /// Target of the request.
        target: Pid,
        /// How long the caller waited.
        after: Duration,
    },
    /// The target does not exist; the runtime answered on its behalf.
    DeadLetter(Pid),
    /// The reply channel was dropped before a reply was produced.
    ResponderDropped,
    /// A reply arrived but was not of the expected type.
    UnexpectedReply {
        /// Type the caller asked for.
        expected: &'static str,
    },
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InboxClosed(pid) => write!(f, "mailbox of {pid} is closed"),
            Self::Timeout { target, after } => {
                write!(f, "request to {target} timed out after {after:?}")
            }
            Self::DeadLetter(pid) => write!(f, "{pid} does not exist"),
            Self::ResponderDropped => write!(f, "reply channel dropped before a reply was sent"),
            Self::UnexpectedReply { expected } => {
                write!(f, "reply was not of the expected type {expected}")
            }
        }
    }
}

impl std::error::Error for MessageError {}
