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

//! Routers: one logical actor in front of a set of routees.
//!
//! A router actor owns the routee set and keeps a [`RouterState`] in sync with it. The
//! state makes the routing decisions, so a [`RouterHandle`] can route from the sending
//! task without a round trip through the router's mailbox.
//!
//! * [`spawn_group`] routes over an existing set of pids.
//! * [`spawn_pool`] spawns its routees as supervised children.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use messages::{AddRoutee, BroadcastMessage, GetRoutees, RemoveRoutee, Routees};
pub use random::RandomState;
pub use round_robin::RoundRobinState;
pub use router_actor::{spawn_group, spawn_pool, RouterHandle, RouterModel};
pub use state::{BroadcastState, RouterState};

mod messages;
mod random;
mod round_robin;
mod router_actor;
mod state;

/// Built-in routing policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RouterKind {
    /// One routee per message, in turn.
    #[default]
    RoundRobin,
    /// One routee per message, chosen at random.
    Random,
    /// Every routee gets every message.
    Broadcast,
}

impl RouterKind {
    /// A fresh, empty state for this policy.
    pub fn new_state(&self) -> Arc<dyn RouterState> {
        match self {
            Self::RoundRobin => Arc::new(RoundRobinState::default()),
            Self::Random => Arc::new(RandomState::default()),
            Self::Broadcast => Arc::new(BroadcastState::default()),
        }
    }
}
