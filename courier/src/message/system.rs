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

//! The fixed part of the message taxonomy.
//!
//! Three kinds of message flow through a mailbox:
//!
//! * **system** messages ([`SystemMessage`]) drive lifecycle and death-watch. They travel on
//!   a dedicated channel that is drained before any user message.
//! * **auto-receive** messages ([`AutoReceive`]) arrive on the user channel but are handled
//!   by the runtime and never reach a user handler.
//! * **user** messages are everything else.
//!
//! [`classify`] is the capability check used wherever a type-erased message has to be
//! routed by kind.

use serde::{Deserialize, Serialize};

use crate::actor::{RestartStatistics, TerminationReason};
use crate::message::Pid;
use crate::traits::CourierMessage;

/// Notification that a watched process has stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminated {
    /// The process that stopped.
    pub who: Pid,
    /// `true` when the whole node hosting `who` became unreachable, `false` when `who`
    /// itself stopped.
    pub address_terminated: bool,
}

/// Report from a child to its supervisor that a handler failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    /// The failing child.
    pub who: Pid,
    /// Why it failed.
    pub reason: TerminationReason,
    /// The child's failure history, consulted by the supervisor's restart limiter.
    pub restart_stats: RestartStatistics,
}

/// Lifecycle-reserved messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SystemMessage {
    /// The process began processing messages.
    Started,
    /// Stop immediately after the current message; queued user messages are drained first.
    Stop,
    /// Register `watcher` to receive [`Terminated`] when the receiver stops.
    Watch {
        /// Process to notify.
        watcher: Pid,
    },
    /// Undo a previous [`SystemMessage::Watch`].
    Unwatch {
        /// Process that no longer wants notification.
        watcher: Pid,
    },
    /// A watched process stopped.
    Terminated(Terminated),
    /// A supervised child failed.
    Failure(Failure),
    /// Rebuild the receiver's state and resume processing.
    Restart,
}

impl SystemMessage {
    /// Short name for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Stop => "stop",
            Self::Watch { .. } => "watch",
            Self::Unwatch { .. } => "unwatch",
            Self::Terminated(_) => "terminated",
            Self::Failure(_) => "failure",
            Self::Restart => "restart",
        }
    }
}

/// Messages the runtime consumes on behalf of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AutoReceive {
    /// The actor is about to be rebuilt by its supervisor.
    Restarting,
    /// The actor is shutting down.
    Stopping,
    /// The actor has shut down.
    Stopped,
    /// Stop once everything queued before this message has been processed.
    PoisonPill,
}

/// The kind of a message, as far as dispatch is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Application message.
    User,
    /// A [`SystemMessage`].
    System,
    /// An [`AutoReceive`] message.
    AutoReceive,
}

/// Classifies a type-erased message.
pub fn classify(message: &dyn CourierMessage) -> MessageKind {
    let any = message.as_any();
    if any.is::<SystemMessage>() {
        MessageKind::System
    } else if any.is::<AutoReceive>() {
        MessageKind::AutoReceive
    } else {
        MessageKind::User
    }
}
