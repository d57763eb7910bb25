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

//! Messages exchanged between the remoting actors.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::message::{MessageHeader, Pid};
use crate::traits::CourierMessage;

/// `watcher` (local) wants to be told when `watchee` (remote) stops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteWatch {
    /// The local watcher.
    pub watcher: Pid,
    /// The remote process being watched.
    pub watchee: Pid,
}

/// `watcher` no longer wants to watch `watchee`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUnwatch {
    /// The local watcher.
    pub watcher: Pid,
    /// The remote process that was watched.
    pub watchee: Pid,
}

/// The remote `watchee` stopped; `watcher` must be told.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTerminate {
    /// The local watcher.
    pub watcher: Pid,
    /// The remote process that stopped.
    pub watchee: Pid,
}

/// A message bound for a process on another node.
#[derive(Debug, Clone)]
pub struct RemoteDeliver {
    /// Header to carry over.
    pub header: Option<MessageHeader>,
    /// The payload. Its type must be registered with the serializer registry.
    pub message: Arc<dyn CourierMessage>,
    /// The remote target.
    pub target: Pid,
    /// Where replies go.
    pub sender: Option<Pid>,
}

/// Published when a connection to `address` has been established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConnectedEvent {
    /// The peer's address.
    pub address: String,
}

/// Published when the connection to `address` is lost for good.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointTerminatedEvent {
    /// The peer's address.
    pub address: String,
}

/// Request to the endpoint supervisor to build the writer and watcher for `address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EnsureEndpoint {
    pub(crate) address: String,
}

/// Reply of the endpoint supervisor when it could not build an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EndpointRefused {
    pub(crate) reason: String,
}

/// The writer and watcher serving one remote address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Sends outbound messages.
    pub writer: Pid,
    /// Tracks death-watch across the link.
    pub watcher: Pid,
}
