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

//! Routing state shared between a router actor and its handles.

use std::fmt::Debug;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::common::ActorRuntime;
use crate::message::{MessageEnvelope, Pid, PidSet};

/// The distribution policy behind a router.
///
/// The router actor owns membership and calls [`RouterState::set_routees`] whenever it
/// changes. Routing decisions are made by whoever holds the state, possibly from many
/// tasks at once.
#[async_trait]
pub trait RouterState: Send + Sync + Debug {
    /// Replaces the routees.
    fn set_routees(&self, routees: &PidSet);

    /// Current routees.
    fn routees(&self) -> PidSet;

    /// Which routees a message should go to right now.
    fn select(&self) -> Vec<Pid>;

    /// Sends `envelope` to the selected routees.
    async fn route_message(&self, runtime: &ActorRuntime, envelope: MessageEnvelope) {
        for target in self.select() {
            runtime.send_user(&target, envelope.clone()).await;
        }
    }
}

/// Dense snapshot of the routee set, rebuilt on every membership change.
#[derive(Debug, Default)]
pub(crate) struct RouteeList {
    routees: RwLock<Vec<Pid>>,
}

impl RouteeList {
    pub(crate) fn set(&self, routees: &PidSet) {
        *self.routees.write() = routees.values();
    }

    pub(crate) fn snapshot(&self) -> PidSet {
        self.routees.read().iter().cloned().collect()
    }

    pub(crate) fn all(&self) -> Vec<Pid> {
        self.routees.read().clone()
    }

    /// Member chosen by `pick`, which receives the current length (never zero).
    pub(crate) fn pick(&self, pick: impl FnOnce(usize) -> usize) -> Option<Pid> {
        let routees = self.routees.read();
        if routees.is_empty() {
            return None;
        }
        routees.get(pick(routees.len())).cloned()
    }
}

/// Sends every message to every routee.
#[derive(Debug, Default)]
pub struct BroadcastState {
    routees: RouteeList,
}

impl RouterState for BroadcastState {
    fn set_routees(&self, routees: &PidSet) {
        self.routees.set(routees);
    }

    fn routees(&self) -> PidSet {
        self.routees.snapshot()
    }

    fn select(&self) -> Vec<Pid> {
        self.routees.all()
    }
}
