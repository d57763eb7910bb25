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

//! Error types for remoting.

use std::fmt;
use std::time::Duration;

use crate::message::MessageError;

/// Failures of the serializer registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerializerError {
    /// No type is registered under this name.
    UnknownTypeName(String),
    /// The message's concrete type was never registered; carries the message's debug
    /// rendering.
    UnregisteredType(String),
    /// No serializer has this id.
    UnknownSerializer(i32),
    /// The codec rejected the payload.
    Codec {
        /// Type being (de)serialized.
        type_name: String,
        /// Codec error rendering.
        reason: String,
    },
}

impl fmt::Display for SerializerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTypeName(name) => write!(f, "no message type registered as '{name}'"),
            Self::UnregisteredType(message) => {
                write!(f, "message {message} has no registered type name")
            }
            Self::UnknownSerializer(id) => write!(f, "unknown serializer id {id}"),
            Self::Codec { type_name, reason } => {
                write!(f, "codec failure for '{type_name}': {reason}")
            }
        }
    }
}

impl std::error::Error for SerializerError {}

/// Failures of a transport connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Nobody is listening at the address.
    Unreachable(String),
    /// The peer refused the connection.
    Rejected {
        /// Peer address.
        address: String,
        /// Why it refused.
        reason: String,
    },
    /// The connection is gone.
    Closed(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable(address) => write!(f, "no listener at {address}"),
            Self::Rejected { address, reason } => {
                write!(f, "{address} rejected the connection: {reason}")
            }
            Self::Closed(address) => write!(f, "connection to {address} closed"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Failures of an [`EndpointReader`](crate::remote::EndpointReader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderError {
    /// The reader is suspended and refuses new connections.
    Suspended,
    /// The inbound stream failed.
    Transport(TransportError),
    /// A payload could not be decoded; the rest of the stream is abandoned.
    Deserialize(SerializerError),
    /// An envelope referenced a table entry the batch does not have.
    BadIndex {
        /// Which table.
        table: &'static str,
        /// The offending index.
        index: usize,
        /// Size of the table.
        len: usize,
    },
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suspended => write!(f, "endpoint reader is suspended"),
            Self::Transport(e) => write!(f, "inbound stream failed: {e}"),
            Self::Deserialize(e) => write!(f, "failed to decode inbound message: {e}"),
            Self::BadIndex { table, index, len } => {
                write!(f, "{table} index {index} out of range (table has {len} entries)")
            }
        }
    }
}

impl std::error::Error for ReaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Deserialize(e) => Some(e),
            Self::Suspended | Self::BadIndex { .. } => None,
        }
    }
}

impl From<TransportError> for ReaderError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<SerializerError> for ReaderError {
    fn from(e: SerializerError) -> Self {
        Self::Deserialize(e)
    }
}

/// Failures of the [`EndpointManager`](crate::remote::EndpointManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    /// The endpoint supervisor did not build the endpoint.
    Construction {
        /// Remote address.
        address: String,
        /// What went wrong.
        cause: MessageError,
    },
    /// The endpoint supervisor answered but could not build the endpoint.
    Refused {
        /// Remote address.
        address: String,
        /// What the supervisor reported.
        reason: String,
    },
    /// The endpoint supervisor did not answer in time.
    SupervisorTimeout {
        /// Remote address.
        address: String,
        /// How long the manager waited.
        after: Duration,
    },
    /// The manager has been stopped.
    Stopped,
    /// The endpoint's writer or watcher is gone.
    Delivery(MessageError),
}

impl fmt::Display for EndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Construction { address, cause } => {
                write!(f, "failed to build endpoint for {address}: {cause}")
            }
            Self::Refused { address, reason } => {
                write!(f, "endpoint supervisor refused {address}: {reason}")
            }
            Self::SupervisorTimeout { address, after } => write!(
                f,
                "endpoint supervisor did not answer for {address} within {after:?}"
            ),
            Self::Stopped => write!(f, "endpoint manager is stopped"),
            Self::Delivery(e) => write!(f, "endpoint delivery failed: {e}"),
        }
    }
}

impl std::error::Error for EndpointError {}
