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

use std::fmt;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::mpsc::{channel, unbounded_channel, Receiver, UnboundedReceiver};
use tracing::trace;

pub use idle::Idle;

use crate::actor::{ActorConfig, RestartLimiter, RestartStatistics, SupervisionStrategy};
use crate::common::{
    ActorHandle, ActorRuntime, AsyncLifecycleHandler, FutureBox, FutureHandler, ModelProducer,
    ParentRef, ProcessRef, ReactorMap, RegistryError, GENERATED_ID_PREFIX,
};
use crate::message::{MessageEnvelope, Pid, PidSet, SystemMessage};

mod idle;
/// The `Started` type-state and the message loop.
pub mod started;

/// An actor together with the runtime state that drives it.
///
/// `ManagedActor` is a type-state wrapper: in the [`Idle`] state handlers and lifecycle
/// hooks are registered; `start` moves it to [`started::Started`] and spawns its message
/// loop. The user-defined state lives in `model`.
///
/// Every actor owns two inboxes. The system inbox is unbounded and always drained
/// before the user inbox, so lifecycle and death-watch traffic is never stuck behind
/// application messages.
pub struct ManagedActor<ActorState, Model: Default + Send + Debug + 'static> {
    pub(crate) handle: ActorHandle,
    pub(crate) parent: Option<ParentRef>,
    pub(crate) runtime: ActorRuntime,

    /// The actor's state. Handlers and hooks receive mutable access to it.
    pub model: Model,

    pub(crate) inbox: Receiver<MessageEnvelope>,
    pub(crate) system_inbox: UnboundedReceiver<SystemMessage>,

    pub(crate) before_start: AsyncLifecycleHandler<Model>,
    pub(crate) after_start: AsyncLifecycleHandler<Model>,
    pub(crate) before_stop: AsyncLifecycleHandler<Model>,
    pub(crate) after_stop: AsyncLifecycleHandler<Model>,
    pub(crate) before_restart: AsyncLifecycleHandler<Model>,

    pub(crate) message_handlers: ReactorMap<Model>,
    pub(crate) unhandled: Option<Box<FutureHandler<Model>>>,
    pub(crate) producer: ModelProducer<Model>,

    pub(crate) watchers: PidSet,
    pub(crate) restart_stats: RestartStatistics,
    pub(crate) supervision_strategy: SupervisionStrategy,
    pub(crate) restart_limiter: RestartLimiter,
    pub(crate) suspended: bool,
    pub(crate) stopping: bool,

    _actor_state: PhantomData<ActorState>,
}

impl<ActorState, Model: Default + Send + Debug + 'static> ManagedActor<ActorState, Model> {
    /// The actor's process id.
    #[inline]
    pub const fn pid(&self) -> &Pid {
        self.handle.pid()
    }

    /// The actor's handle.
    #[inline]
    pub const fn handle(&self) -> &ActorHandle {
        &self.handle
    }

    /// The supervising actor, if any.
    #[inline]
    pub const fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    /// The runtime this actor belongs to.
    #[inline]
    pub const fn runtime(&self) -> &ActorRuntime {
        &self.runtime
    }

    /// Processes currently watching this actor.
    #[inline]
    pub const fn watchers(&self) -> &PidSet {
        &self.watchers
    }

    /// Creates an idle child supervised by this actor. Start it with
    /// [`ActorHandle::supervise`] on this actor's handle.
    pub fn create_child<Child: Default + Send + Debug + 'static>(
        &self,
        name: Option<&str>,
    ) -> Result<ManagedActor<Idle, Child>, RegistryError> {
        let config = ActorConfig::new(name, Some(self.handle.clone()));
        ManagedActor::new(&self.runtime, &config)
    }

    /// Creates an idle child from an explicit configuration. The configuration's parent
    /// is replaced by this actor.
    pub fn create_child_with_config<Child: Default + Send + Debug + 'static>(
        &self,
        config: ActorConfig,
    ) -> Result<ManagedActor<Idle, Child>, RegistryError> {
        let config = config.with_parent(self.handle.clone());
        ManagedActor::new(&self.runtime, &config)
    }
}

impl<Model: Default + Send + Debug + 'static> ManagedActor<Idle, Model> {
    /// Builds an idle actor and registers it with the runtime.
    pub(crate) fn new(runtime: &ActorRuntime, config: &ActorConfig) -> Result<Self, RegistryError> {
        let named = config.registry_name()?;
        let actor = Self::assemble(runtime, config, named.clone());
        if named.is_some() {
            runtime
                .registry()
                .add_qualified(ProcessRef::Actor(actor.handle.clone()))?;
        } else {
            runtime
                .registry()
                .add_generated(ProcessRef::Actor(actor.handle.clone()));
        }
        actor.track_if_root();
        Ok(actor)
    }

    /// Builds an idle actor under a generated id. Generated ids cannot collide, so this
    /// cannot fail.
    pub(crate) fn new_unnamed(runtime: &ActorRuntime, config: &ActorConfig) -> Self {
        let actor = Self::assemble(runtime, config, None);
        runtime
            .registry()
            .add_generated(ProcessRef::Actor(actor.handle.clone()));
        actor.track_if_root();
        actor
    }

    fn track_if_root(&self) {
        if self.parent.is_none() {
            self.runtime.track_root(&self.handle);
        }
    }

    fn assemble(runtime: &ActorRuntime, config: &ActorConfig, name: Option<String>) -> Self {
        let registry = runtime.registry();
        let capacity = config
            .inbox_capacity()
            .unwrap_or(runtime.config().limits.actor_inbox_capacity);
        let (outbox, inbox) = channel(capacity);
        let (system_outbox, system_inbox) = unbounded_channel();

        let seq = registry.next_sequence();
        let id = name.unwrap_or_else(|| format!("{GENERATED_ID_PREFIX}{seq}"));
        let pid = registry.new_local_pid(id);

        let parent = config.parent().cloned();
        let cancellation_token = parent.as_ref().map_or_else(
            || runtime.cancellation_token().child_token(),
            |parent| parent.cancellation_token.child_token(),
        );

        let handle = ActorHandle::new(
            pid,
            seq,
            outbox,
            system_outbox,
            config.restart_policy(),
            cancellation_token,
        );

        let limiter_config = config
            .restart_limiter_config()
            .cloned()
            .unwrap_or_else(|| runtime.config().supervision.clone());

        trace!(pid = %handle.pid(), "new actor");

        Self {
            handle,
            parent,
            runtime: runtime.clone(),
            model: Model::default(),
            inbox,
            system_inbox,
            before_start: Box::new(|_| default_handler()),
            after_start: Box::new(|_| default_handler()),
            before_stop: Box::new(|_| default_handler()),
            after_stop: Box::new(|_| default_handler()),
            before_restart: Box::new(|_| default_handler()),
            message_handlers: ReactorMap::default(),
            unhandled: None,
            producer: Arc::new(Model::default),
            watchers: PidSet::new(),
            restart_stats: RestartStatistics::new(),
            supervision_strategy: config.supervision_strategy(),
            restart_limiter: RestartLimiter::new(limiter_config),
            suspended: false,
            stopping: false,
            _actor_state: PhantomData,
        }
    }
}

impl<ActorState, Model: Default + Send + Debug + 'static> Debug
    for ManagedActor<ActorState, Model>
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedActor")
            .field("pid", self.handle.pid())
            .field("model", &self.model)
            .field("parent", &self.parent.as_ref().map(ActorHandle::pid))
            .field("suspended", &self.suspended)
            .field("stopping", &self.stopping)
            .finish_non_exhaustive()
    }
}

pub(crate) fn default_handler() -> FutureBox {
    Box::pin(async {})
}
