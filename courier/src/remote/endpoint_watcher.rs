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

//! Death-watch bookkeeping for one remote address.
//!
//! [`WatcherFsm`] is the pure state machine: it takes a [`WatcherInput`] and returns the
//! [`WatcherEffect`]s to carry out. The actor built by [`spawn_watcher`] feeds it the
//! messages it receives and applies the effects.
//!
//! ```text
//!   Receiving --EndpointTerminatedEvent--> Terminated
//!   Terminated --EndpointConnectedEvent--> Receiving
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::actor::{Idle, ManagedActor, Started};
use crate::common::{ActorRuntime, FutureBox, RegistryError};
use crate::message::{MessageEnvelope, Pid, PidSet, SystemMessage, Terminated};
use crate::remote::endpoint_manager::EndpointSupervisor;
use crate::remote::{
    EndpointConnectedEvent, EndpointTerminatedEvent, RemoteDeliver, RemoteTerminate,
    RemoteUnwatch, RemoteWatch,
};

/// Local watchers and the remote processes each of them watches.
///
/// A watcher has an entry iff it watches at least one process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchTable {
    watched: HashMap<Pid, PidSet>,
}

impl WatchTable {
    /// Records that `watcher` watches `watchee`. Returns `false` if it already did.
    pub fn watch(&mut self, watcher: Pid, watchee: Pid) -> bool {
        self.watched.entry(watcher).or_default().add(watchee)
    }

    /// Forgets that `watcher` watches `watchee`, dropping the watcher once its set is
    /// empty. Returns `false` if the pair was unknown.
    pub fn unwatch(&mut self, watcher: &Pid, watchee: &Pid) -> bool {
        let Some(set) = self.watched.get_mut(watcher) else {
            return false;
        };
        let removed = set.remove(watchee);
        if set.is_empty() {
            self.watched.remove(watcher);
        }
        removed
    }

    /// The processes `watcher` watches.
    pub fn watched_by(&self, watcher: &Pid) -> Option<&PidSet> {
        self.watched.get(watcher)
    }

    /// `true` if `watcher` has an entry.
    pub fn contains_watcher(&self, watcher: &Pid) -> bool {
        self.watched.contains_key(watcher)
    }

    /// Number of watchers with an entry.
    pub fn len(&self) -> usize {
        self.watched.len()
    }

    /// `true` when nobody watches anything.
    pub fn is_empty(&self) -> bool {
        self.watched.is_empty()
    }

    /// Empties the table, yielding every watcher with its watched set.
    pub fn drain(&mut self) -> impl Iterator<Item = (Pid, PidSet)> + '_ {
        self.watched.drain()
    }
}

/// The two states of an endpoint watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatcherState {
    /// The link is up; watches are tracked.
    #[default]
    Receiving,
    /// The link is gone; watches are answered with `Terminated` straight away.
    Terminated,
}

/// Everything an endpoint watcher reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherInput {
    /// A local process wants to watch a remote one.
    Watch(RemoteWatch),
    /// A local process stops watching a remote one.
    Unwatch(RemoteUnwatch),
    /// A remote watched process stopped.
    Terminate(RemoteTerminate),
    /// The link (re)connected.
    Connected(EndpointConnectedEvent),
    /// The link is gone.
    Terminated(EndpointTerminatedEvent),
}

/// Side effects requested by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherEffect {
    /// Send `Watch{watcher}` to the remote `watchee`.
    Watch {
        /// Remote process.
        watchee: Pid,
        /// Local watcher.
        watcher: Pid,
    },
    /// Send `Unwatch{watcher}` to the remote `watchee`.
    Unwatch {
        /// Remote process.
        watchee: Pid,
        /// Local watcher.
        watcher: Pid,
    },
    /// Deliver `Terminated{who, address_terminated}` to the local `watcher`.
    DeliverTerminated {
        /// Local watcher.
        watcher: Pid,
        /// The process that is gone.
        who: Pid,
        /// `true` when the whole node is gone.
        address_terminated: bool,
    },
    /// Drop every event subscription tracked for the pid.
    ForgetPid(Pid),
}

/// Watcher state machine for one address.
#[derive(Debug, Clone, Default)]
pub struct WatcherFsm {
    address: String,
    state: WatcherState,
    table: WatchTable,
}

impl WatcherFsm {
    /// A watcher for `address`, in the receiving state with an empty table.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Current state.
    pub const fn state(&self) -> WatcherState {
        self.state
    }

    /// The watch table.
    pub const fn table(&self) -> &WatchTable {
        &self.table
    }

    /// The remote address this watcher serves.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Applies `input` and returns what has to happen as a result.
    pub fn handle(&mut self, input: WatcherInput) -> Vec<WatcherEffect> {
        match self.state {
            WatcherState::Receiving => self.receiving(input),
            WatcherState::Terminated => self.terminated(input),
        }
    }

    fn receiving(&mut self, input: WatcherInput) -> Vec<WatcherEffect> {
        match input {
            WatcherInput::Watch(RemoteWatch { watcher, watchee }) => {
                self.table.watch(watcher.clone(), watchee.clone());
                vec![WatcherEffect::Watch { watchee, watcher }]
            }
            WatcherInput::Unwatch(RemoteUnwatch { watcher, watchee }) => {
                self.table.unwatch(&watcher, &watchee);
                vec![WatcherEffect::Unwatch { watchee, watcher }]
            }
            WatcherInput::Terminate(RemoteTerminate { watcher, watchee }) => {
                self.table.unwatch(&watcher, &watchee);
                vec![WatcherEffect::DeliverTerminated {
                    watcher,
                    who: watchee,
                    address_terminated: false,
                }]
            }
            WatcherInput::Connected(_) => Vec::new(),
            WatcherInput::Terminated(_) => {
                let mut effects = Vec::new();
                for (watcher, watched) in self.table.drain() {
                    for who in watched.iter() {
                        effects.push(WatcherEffect::ForgetPid(who.clone()));
                        effects.push(WatcherEffect::DeliverTerminated {
                            watcher: watcher.clone(),
                            who: who.clone(),
                            address_terminated: true,
                        });
                    }
                }
                debug!(address = %self.address, notified = effects.len() / 2, "endpoint terminated");
                self.state = WatcherState::Terminated;
                effects
            }
        }
    }

    fn terminated(&mut self, input: WatcherInput) -> Vec<WatcherEffect> {
        match input {
            WatcherInput::Watch(RemoteWatch { watcher, watchee }) => {
                vec![WatcherEffect::DeliverTerminated {
                    watcher,
                    who: watchee,
                    address_terminated: true,
                }]
            }
            WatcherInput::Connected(_) => {
                trace!(address = %self.address, "endpoint reconnected");
                self.table = WatchTable::default();
                self.state = WatcherState::Receiving;
                Vec::new()
            }
            other => {
                warn!(address = %self.address, input = ?other, "message for a terminated endpoint");
                Vec::new()
            }
        }
    }
}

/// Model of the watcher actor.
#[derive(Debug, Default)]
pub(crate) struct EndpointWatcher {
    fsm: WatcherFsm,
    writer: Option<Pid>,
}

/// Creates the idle watcher actor for `address` under `supervisor`. Remote
/// `Watch`/`Unwatch` requests go out through `writer`.
pub(crate) fn spawn_watcher(
    supervisor: &ManagedActor<Started, EndpointSupervisor>,
    address: &str,
    writer: &Pid,
) -> Result<ManagedActor<Idle, EndpointWatcher>, RegistryError> {
    let mut actor = supervisor.create_child::<EndpointWatcher>(None)?;

    let address = address.to_string();
    let writer = writer.clone();
    actor.with_producer(move || EndpointWatcher {
        fsm: WatcherFsm::new(address.clone()),
        writer: Some(writer.clone()),
    });

    actor
        .mutate_on::<RemoteWatch>(|actor, ctx| {
            let effects = actor.model.fsm.handle(WatcherInput::Watch(ctx.message().clone()));
            apply_effects(actor.runtime().clone(), actor.model.writer.clone(), effects)
        })
        .mutate_on::<RemoteUnwatch>(|actor, ctx| {
            let effects = actor.model.fsm.handle(WatcherInput::Unwatch(ctx.message().clone()));
            apply_effects(actor.runtime().clone(), actor.model.writer.clone(), effects)
        })
        .mutate_on::<RemoteTerminate>(|actor, ctx| {
            let effects = actor.model.fsm.handle(WatcherInput::Terminate(ctx.message().clone()));
            apply_effects(actor.runtime().clone(), actor.model.writer.clone(), effects)
        })
        .mutate_on::<EndpointConnectedEvent>(|actor, ctx| {
            let effects = actor.model.fsm.handle(WatcherInput::Connected(ctx.message().clone()));
            apply_effects(actor.runtime().clone(), actor.model.writer.clone(), effects)
        })
        .mutate_on::<EndpointTerminatedEvent>(|actor, ctx| {
            let effects = actor.model.fsm.handle(WatcherInput::Terminated(ctx.message().clone()));
            apply_effects(actor.runtime().clone(), actor.model.writer.clone(), effects)
        })
        .on_unhandled(|actor, envelope| {
            warn!(address = %actor.model.fsm.address(), message = ?envelope.message, "endpoint watcher ignored message");
            Box::pin(async {})
        });

    Ok(actor)
}

fn apply_effects(
    runtime: ActorRuntime,
    writer: Option<Pid>,
    effects: Vec<WatcherEffect>,
) -> FutureBox {
    Box::pin(async move {
        for effect in effects {
            match effect {
                WatcherEffect::Watch { watchee, watcher } => {
                    forward(&runtime, writer.as_ref(), watchee, SystemMessage::Watch { watcher })
                        .await;
                }
                WatcherEffect::Unwatch { watchee, watcher } => {
                    forward(&runtime, writer.as_ref(), watchee, SystemMessage::Unwatch { watcher })
                        .await;
                }
                WatcherEffect::DeliverTerminated {
                    watcher,
                    who,
                    address_terminated,
                } => {
                    let terminated = Terminated {
                        who,
                        address_terminated,
                    };
                    runtime
                        .send_system(&watcher, SystemMessage::Terminated(terminated))
                        .await;
                }
                WatcherEffect::ForgetPid(pid) => {
                    runtime.event_stream().remove_pid(&pid);
                }
            }
        }
    })
}

async fn forward(runtime: &ActorRuntime, writer: Option<&Pid>, target: Pid, message: SystemMessage) {
    let Some(writer) = writer.and_then(|pid| runtime.registry().get_local(pid)) else {
        debug!(target = %target, message = message.name(), "endpoint writer gone; system message dropped");
        return;
    };
    let deliver = RemoteDeliver {
        header: None,
        message: Arc::new(message),
        target,
        sender: None,
    };
    if let Err(e) = writer.send_user(MessageEnvelope::new(deliver)).await {
        debug!(error = %e, "endpoint writer refused system message");
    }
}
