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

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::message::Pid;
use crate::traits::CourierMessage;

/// Adds a routee. Ignored if it is already present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddRoutee {
    /// The routee.
    pub pid: Pid,
}

/// Removes a routee and poison-pills it after a short grace interval. Ignored if it is
/// absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveRoutee {
    /// The routee.
    pub pid: Pid,
}

/// Sends `message` to every routee, keeping the original sender.
#[derive(Debug, Clone)]
pub struct BroadcastMessage {
    /// The payload.
    pub message: Arc<dyn CourierMessage>,
}

impl BroadcastMessage {
    /// Wraps `message` for broadcasting.
    pub fn new(message: impl CourierMessage) -> Self {
        Self {
            message: Arc::new(message),
        }
    }
}

/// Asks the router for its routees; answered with [`Routees`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GetRoutees;

/// Snapshot of a router's routees.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Routees {
    /// Current routees.
    pub pids: Vec<Pid>,
}

/// Sent by a router to itself once its initial routees are in place.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RouterReady;
