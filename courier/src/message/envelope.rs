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

use std::collections::HashMap;
use std::sync::Arc;

use crate::message::Pid;
use crate::traits::CourierMessage;

/// Free-form string metadata carried alongside a message.
pub type MessageHeader = HashMap<String, String>;

/// A user-channel delivery: the payload plus optional header and sender.
///
/// The payload is shared behind an `Arc`, so cloning an envelope for fan-out is cheap.
#[derive(Debug, Clone)]
pub struct MessageEnvelope {
    /// Optional metadata.
    pub header: Option<MessageHeader>,
    /// The payload.
    pub message: Arc<dyn CourierMessage>,
    /// Who to reply to, if anyone.
    pub sender: Option<Pid>,
}

impl MessageEnvelope {
    /// Wraps a concrete message.
    pub fn new(message: impl CourierMessage) -> Self {
        Self::from_arc(Arc::new(message))
    }

    /// Wraps an already type-erased message without re-boxing it.
    pub fn from_arc(message: Arc<dyn CourierMessage>) -> Self {
        Self {
            header: None,
            message,
            sender: None,
        }
    }

    /// Sets the sender.
    #[must_use]
    pub fn with_sender(mut self, sender: Option<Pid>) -> Self {
        self.sender = sender;
        self
    }

    /// Sets the header.
    #[must_use]
    pub fn with_header(mut self, header: Option<MessageHeader>) -> Self {
        self.header = header;
        self
    }

    /// Borrows the payload as a trait object.
    #[inline]
    pub fn message(&self) -> &dyn CourierMessage {
        &*self.message
    }
}
