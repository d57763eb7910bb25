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

//! Process identity and the message taxonomy.
//!
//! * [`Pid`] / [`PidSet`]: process identity and sets of processes.
//! * [`SystemMessage`], [`AutoReceive`], [`classify`]: what kind of message something is.
//! * [`MessageEnvelope`]: a user-channel delivery with header and sender.
//! * [`MessageContext`] / [`Responder`]: what a handler sees and how it replies.

pub use dead_letter::{DeadLetterEvent, DeadLetterResponse};
pub use envelope::{MessageEnvelope, MessageHeader};
pub use message_context::{MessageContext, Responder};
pub use message_error::MessageError;
pub use pid::{Pid, PidSet, LOCAL_ADDRESS};
pub use system::{classify, AutoReceive, Failure, MessageKind, SystemMessage, Terminated};

mod dead_letter;
mod envelope;
mod message_context;
mod message_error;
mod pid;
mod system;
