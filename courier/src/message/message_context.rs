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

use static_assertions::assert_impl_all;
use tracing::debug;

use crate::common::ActorRuntime;
use crate::message::{MessageEnvelope, MessageHeader, Pid};
use crate::traits::CourierMessage;

/// The view of an incoming message handed to a handler.
///
/// Handlers do their state changes synchronously and return a `'static` future, so
/// anything the future needs from the context (usually the [`Responder`]) is cloned out
/// before the `async move` block.
#[derive(Clone, Debug)]
pub struct MessageContext<M> {
    pub(crate) message: M,
    pub(crate) header: Option<MessageHeader>,
    pub(crate) responder: Responder,
}

impl<M> MessageContext<M> {
    /// The message payload.
    pub const fn message(&self) -> &M {
        &self.message
    }

    /// Who sent the message, if it was sent as a request.
    pub fn sender(&self) -> Option<&Pid> {
        self.responder.target.as_ref()
    }

    /// The header that travelled with the message.
    pub fn header(&self) -> Option<&MessageHeader> {
        self.header.as_ref()
    }

    /// A clonable handle for replying to the sender from inside the returned future.
    pub fn responder(&self) -> Responder {
        self.responder.clone()
    }

    /// Replies to the sender. Does nothing if the message had no sender.
    pub async fn respond(&self, reply: impl CourierMessage) {
        self.responder.respond(reply).await;
    }
}

/// Sends replies back to whoever sent a message.
#[derive(Clone, Debug)]
pub struct Responder {
    pub(crate) target: Option<Pid>,
    pub(crate) from: Pid,
    pub(crate) runtime: ActorRuntime,
}

impl Responder {
    /// Where replies go.
    pub fn target(&self) -> Option<&Pid> {
        self.target.as_ref()
    }

    /// Sends `reply` to the original sender.
    pub async fn respond(&self, reply: impl CourierMessage) {
        let Some(target) = &self.target else {
            debug!(from = %self.from, "respond called on a message without sender");
            return;
        };
        let envelope = MessageEnvelope::new(reply).with_sender(Some(self.from.clone()));
        self.runtime.send_user(target, envelope).await;
    }
}

assert_impl_all!(MessageContext<u32>: Send, Sync);
assert_impl_all!(Responder: Send, Sync);
