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

//! Wire-level types exchanged between nodes.
//!
//! A [`MessageBatch`] carries two string tables and a list of envelopes that refer into
//! them by index, so a batch full of messages to the same few targets repeats each
//! target name and type name only once.

use serde::{Deserialize, Serialize};

use crate::message::{MessageHeader, Pid};

/// A group of envelopes sent in one transport call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBatch {
    /// Target process ids, referenced by [`WireEnvelope::target`].
    pub target_names: Vec<String>,
    /// Registered type names, referenced by [`WireEnvelope::type_id`].
    pub type_names: Vec<String>,
    /// The envelopes, in delivery order.
    pub envelopes: Vec<WireEnvelope>,
}

/// One serialized message inside a [`MessageBatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEnvelope {
    /// Index into `target_names`.
    pub target: u32,
    /// Index into `type_names`.
    pub type_id: u32,
    /// Codec used for `message_data`.
    pub serializer_id: i32,
    /// The encoded message.
    pub message_data: Vec<u8>,
    /// Optional header.
    pub header: Option<MessageHeader>,
    /// Optional sender.
    pub sender: Option<Pid>,
}

impl MessageBatch {
    /// A batch holding a single envelope.
    pub fn single(
        target: impl Into<String>,
        type_name: impl Into<String>,
        serializer_id: i32,
        message_data: Vec<u8>,
        header: Option<MessageHeader>,
        sender: Option<Pid>,
    ) -> Self {
        Self {
            target_names: vec![target.into()],
            type_names: vec![type_name.into()],
            envelopes: vec![WireEnvelope {
                target: 0,
                type_id: 0,
                serializer_id,
                message_data,
                header,
                sender,
            }],
        }
    }
}

/// First message of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRequest {
    /// Address of the connecting node.
    pub address: String,
}

/// Answer to a [`ConnectRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectResponse {
    /// Serializer the peer prefers for messages sent to it.
    pub default_serializer_id: i32,
}
