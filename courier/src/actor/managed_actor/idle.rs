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

use std::any::TypeId;
use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{error, instrument, trace};

use crate::actor::managed_actor::started::Reactors;
use crate::actor::{ManagedActor, Started};
use crate::common::{ActorHandle, FutureBox, FutureBoxResult, HandlerError, ReactorItem};
use crate::message::{MessageContext, MessageEnvelope, Responder, SystemMessage};
use crate::traits::{downcast_message, CourierMessage};

/// Type-state marker for an actor that is being configured and has not started yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Idle;

fn message_context<M: Clone, State: Default + Send + Debug + 'static>(
    actor: &ManagedActor<Started, State>,
    message: &M,
    envelope: &MessageEnvelope,
) -> MessageContext<M> {
    MessageContext {
        message: message.clone(),
        header: envelope.header.clone(),
        responder: Responder {
            target: envelope.sender.clone(),
            from: actor.handle.pid().clone(),
            runtime: actor.runtime.clone(),
        },
    }
}

impl<State: Default + Send + Debug + 'static> ManagedActor<Idle, State> {
    /// Registers a handler for messages of type `M`.
    ///
    /// The handler runs with exclusive access to the actor; state changes belong in
    /// its synchronous part. The returned future must be `'static`, so clone anything
    /// it needs (typically [`MessageContext::responder`]) before the `async move` block.
    #[instrument(skip(self, message_processor), level = "debug")]
    pub fn mutate_on<M>(
        &mut self,
        message_processor: impl for<'a> Fn(&'a mut ManagedActor<Started, State>, &'a mut MessageContext<M>) -> FutureBox
            + Send
            + Sync
            + 'static,
    ) -> &mut Self
    where
        M: CourierMessage + Clone,
    {
        let type_id = TypeId::of::<M>();
        trace!(type_name = std::any::type_name::<M>(), "adding message handler");
        let handler_box = Box::new(
            move |actor: &mut ManagedActor<Started, State>, envelope: &MessageEnvelope| -> FutureBox {
                if let Some(concrete_msg) = downcast_message::<M>(envelope.message()) {
                    let mut msg_context = message_context(actor, concrete_msg, envelope);
                    message_processor(actor, &mut msg_context)
                } else {
                    error!(
                        type_name = std::any::type_name::<M>(),
                        "handler called with incompatible message type"
                    );
                    Box::pin(async {})
                }
            },
        );
        self.message_handlers
            .insert(type_id, ReactorItem::Mutable(handler_box));
        self
    }

    /// Registers a handler whose future may fail.
    ///
    /// An error is treated like a panic: the actor suspends and reports a
    /// [`Failure`](crate::message::Failure) to its supervisor, which decides whether to
    /// restart or stop it.
    #[instrument(skip(self, message_processor), level = "debug")]
    pub fn try_mutate_on<M, E>(
        &mut self,
        message_processor: impl for<'a> Fn(
                &'a mut ManagedActor<Started, State>,
                &'a mut MessageContext<M>,
            ) -> Pin<Box<dyn Future<Output = Result<(), E>> + Send + 'static>>
            + Send
            + Sync
            + 'static,
    ) -> &mut Self
    where
        M: CourierMessage + Clone,
        E: std::error::Error + Send + Sync + 'static,
    {
        let type_id = TypeId::of::<M>();
        trace!(type_name = std::any::type_name::<M>(), "adding fallible message handler");
        let handler_box = Box::new(
            move |actor: &mut ManagedActor<Started, State>,
                  envelope: &MessageEnvelope|
                  -> FutureBoxResult {
                if let Some(concrete_msg) = downcast_message::<M>(envelope.message()) {
                    let mut msg_context = message_context(actor, concrete_msg, envelope);
                    let fut = message_processor(actor, &mut msg_context);
                    Box::pin(async move { fut.await.map_err(|e| Box::new(e) as HandlerError) })
                } else {
                    error!(
                        type_name = std::any::type_name::<M>(),
                        "fallible handler called with incompatible message type"
                    );
                    Box::pin(async { Ok(()) })
                }
            },
        );
        self.message_handlers
            .insert(type_id, ReactorItem::Fallible(handler_box));
        self
    }

    /// Registers a handler for user messages no other handler claimed.
    pub fn on_unhandled(
        &mut self,
        handler: impl for<'a, 'b> Fn(&'a mut ManagedActor<Started, State>, &'b MessageEnvelope) -> FutureBox
            + Send
            + Sync
            + 'static,
    ) -> &mut Self {
        self.unhandled = Some(Box::new(handler));
        self
    }

    /// Sets how a fresh model is built on restart. The current model is replaced too.
    pub fn with_producer(&mut self, producer: impl Fn() -> State + Send + Sync + 'static) -> &mut Self {
        self.model = producer();
        self.producer = Arc::new(producer);
        self
    }

    /// Runs after the message loop starts, and again after every restart.
    pub fn after_start<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: for<'b> Fn(&'b ManagedActor<Started, State>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.after_start = Box::new(move |actor| Box::pin(f(actor)));
        self
    }

    /// Runs before the message loop starts.
    pub fn before_start<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: for<'b> Fn(&'b ManagedActor<Started, State>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.before_start = Box::new(move |actor| Box::pin(f(actor)));
        self
    }

    /// Runs once the actor has stopped and its children are gone.
    pub fn after_stop<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: for<'b> Fn(&'b ManagedActor<Started, State>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.after_stop = Box::new(move |actor| Box::pin(f(actor)));
        self
    }

    /// Runs when a stop begins, before queued user messages are drained.
    pub fn before_stop<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: for<'b> Fn(&'b ManagedActor<Started, State>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.before_stop = Box::new(move |actor| Box::pin(f(actor)));
        self
    }

    /// Runs when the supervisor restarts this actor, before the model is rebuilt.
    pub fn before_restart<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: for<'b> Fn(&'b ManagedActor<Started, State>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.before_restart = Box::new(move |actor| Box::pin(f(actor)));
        self
    }

    /// Starts the message loop and returns the actor's handle.
    #[instrument(skip(self), fields(pid = %self.handle.pid()))]
    pub async fn start(mut self) -> ActorHandle {
        trace!("Model state before start: {:?}", self.model);

        let reactors = Reactors {
            handlers: mem::take(&mut self.message_handlers),
            unhandled: self.unhandled.take(),
        };
        let actor_ref = self.handle.clone();

        let active_actor: ManagedActor<Started, State> = self.into();
        let before_start = (active_actor.before_start)(&active_actor);
        before_start.await;

        if actor_ref.send_system(SystemMessage::Started).is_err() {
            trace!("system inbox closed before start");
        }
        actor_ref.tracker().spawn(active_actor.wake(reactors));
        actor_ref.tracker().close();

        trace!("actor started");
        actor_ref
    }
}

impl<State: Default + Send + Debug + 'static> From<ManagedActor<Idle, State>>
    for ManagedActor<Started, State>
{
    fn from(value: ManagedActor<Idle, State>) -> Self {
        Self {
            handle: value.handle,
            parent: value.parent,
            runtime: value.runtime,
            model: value.model,
            inbox: value.inbox,
            system_inbox: value.system_inbox,
            before_start: value.before_start,
            after_start: value.after_start,
            before_stop: value.before_stop,
            after_stop: value.after_stop,
            before_restart: value.before_restart,
            message_handlers: value.message_handlers,
            unhandled: value.unhandled,
            producer: value.producer,
            watchers: value.watchers,
            restart_stats: value.restart_stats,
            supervision_strategy: value.supervision_strategy,
            restart_limiter: value.restart_limiter,
            suspended: value.suspended,
            stopping: value.stopping,
            _actor_state: PhantomData,
        }
    }
}
