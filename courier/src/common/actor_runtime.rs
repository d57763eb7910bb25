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

use std::fmt::Debug;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace, warn};

use crate::actor::{ActorConfig, Idle, ManagedActor};
use crate::common::runtime_inner::RuntimeInner;
use crate::common::{
    ActorHandle, CourierConfig, EventStream, FutureProcess, ProcessRef, ProcessRegistry,
    RegistryError, Subscription,
};
use crate::message::{
    DeadLetterEvent, DeadLetterResponse, MessageEnvelope, MessageError, Pid, SystemMessage,
    Terminated,
};
use crate::remote::{EndpointManager, RemoteDeliver, RemoteUnwatch, RemoteWatch, SerializerRegistry};
use crate::traits::CourierMessage;

/// A running Courier system.
///
/// The runtime owns the process registry, the event stream, the serializer registry
/// and, once remoting is started, the endpoint manager. It is cheap to clone; every
/// clone refers to the same system. Several runtimes can live in one process.
#[derive(Debug, Clone)]
pub struct ActorRuntime(pub(crate) Arc<RuntimeInner>);

impl ActorRuntime {
    /// Creates an unnamed top-level actor.
    pub fn new_actor<State>(&self) -> ManagedActor<Idle, State>
    where
        State: Default + Send + Debug + 'static,
    {
        ManagedActor::new_unnamed(self, &ActorConfig::default())
    }

    /// Creates a top-level actor registered under `name`.
    pub fn new_actor_named<State>(
        &self,
        name: impl Into<String>,
    ) -> Result<ManagedActor<Idle, State>, RegistryError>
    where
        State: Default + Send + Debug + 'static,
    {
        ManagedActor::new(self, &ActorConfig::new_with_name(name))
    }

    /// Creates an actor from an explicit configuration.
    pub fn new_actor_with_config<State>(
        &self,
        config: ActorConfig,
    ) -> Result<ManagedActor<Idle, State>, RegistryError>
    where
        State: Default + Send + Debug + 'static,
    {
        ManagedActor::new(self, &config)
    }

    /// Number of live top-level actors.
    #[inline]
    #[must_use]
    pub fn actor_count(&self) -> usize {
        self.0.roots.len()
    }

    pub(crate) fn track_root(&self, handle: &ActorHandle) {
        self.0.roots.insert(handle.pid().clone(), handle.clone());
    }

    pub(crate) fn untrack_root(&self, pid: &Pid) {
        self.0.roots.remove(pid);
    }

    /// The runtime's configuration.
    #[inline]
    pub fn config(&self) -> &CourierConfig {
        &self.0.config
    }

    /// The process registry.
    #[inline]
    pub fn registry(&self) -> &ProcessRegistry {
        &self.0.registry
    }

    /// The event stream.
    #[inline]
    pub fn event_stream(&self) -> &EventStream {
        &self.0.event_stream
    }

    /// The serializer registry used by remoting.
    #[inline]
    pub fn serializers(&self) -> &SerializerRegistry {
        &self.0.serializers
    }

    /// The root cancellation token.
    #[inline]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.0.cancellation_token
    }

    /// This node's address.
    pub fn address(&self) -> String {
        self.0.registry.address()
    }

    /// The endpoint manager, when remoting is running.
    pub fn endpoint_manager(&self) -> Option<EndpointManager> {
        self.0.endpoint_manager.read().clone()
    }

    pub(crate) fn set_endpoint_manager(&self, manager: Option<EndpointManager>) {
        *self.0.endpoint_manager.write() = manager;
    }

    pub(crate) fn downgrade(&self) -> Weak<RuntimeInner> {
        Arc::downgrade(&self.0)
    }

    pub(crate) fn upgrade(inner: &Weak<RuntimeInner>) -> Option<Self> {
        inner.upgrade().map(Self)
    }

    /// Sends a user message with no sender.
    pub async fn tell(&self, target: &Pid, message: impl CourierMessage) {
        self.send_user(target, MessageEnvelope::new(message)).await;
    }

    /// Sends a user message whose replies go to `sender`.
    pub async fn request(&self, target: &Pid, message: impl CourierMessage, sender: &Pid) {
        let envelope = MessageEnvelope::new(message).with_sender(Some(sender.clone()));
        self.send_user(target, envelope).await;
    }

    /// Delivers a user envelope to a local or remote process.
    ///
    /// Undeliverable messages become dead letters: a [`DeadLetterEvent`] is published and
    /// the sender, if any, receives a [`DeadLetterResponse`].
    pub async fn send_user(&self, target: &Pid, envelope: MessageEnvelope) {
        if self.registry().is_local(target) {
            let Some(process) = self.registry().get_local(target) else {
                self.dead_letter(target, envelope).await;
                return;
            };
            if let Err(e) = process.send_user(envelope.clone()).await {
                trace!(target = %target, error = %e, "local delivery failed");
                self.dead_letter(target, envelope).await;
            }
            return;
        }

        let Some(manager) = self.endpoint_manager() else {
            debug!(target = %target, "remote target but remoting is not started");
            self.dead_letter(target, envelope).await;
            return;
        };
        let deliver = RemoteDeliver {
            header: envelope.header.clone(),
            message: envelope.message.clone(),
            target: target.clone(),
            sender: envelope.sender.clone(),
        };
        if let Err(e) = manager.remote_deliver(deliver).await {
            error!(target = %target, error = %e, "remote delivery failed");
            self.dead_letter(target, envelope).await;
        }
    }

    /// Delivers a system message to a local or remote process.
    ///
    /// Watching a process that does not exist, or whose node cannot be reached, answers
    /// the watcher with `Terminated` straight away.
    pub fn send_system(&self, target: &Pid, message: SystemMessage) -> BoxFuture<'static, ()> {
        let runtime = self.clone();
        let target = target.clone();
        async move {
            if runtime.registry().is_local(&target) {
                runtime.send_system_local(&target, message).await;
            } else {
                runtime.send_system_remote(&target, message).await;
            }
        }
        .boxed()
    }

    async fn send_system_local(&self, target: &Pid, message: SystemMessage) {
        let delivered = self
            .registry()
            .get_local(target)
            .map(|process| process.send_system(message.clone()));
        if let Some(Ok(())) = delivered {
            return;
        }

        trace!(target = %target, message = message.name(), "system message to missing process");
        if let SystemMessage::Watch { watcher } = message {
            let terminated = Terminated {
                who: target.clone(),
                address_terminated: false,
            };
            self.send_system(&watcher, SystemMessage::Terminated(terminated))
                .await;
        }
    }

    async fn send_system_remote(&self, target: &Pid, message: SystemMessage) {
        let Some(manager) = self.endpoint_manager() else {
            debug!(target = %target, message = message.name(), "remote target but remoting is not started");
            if let SystemMessage::Watch { watcher } = message {
                self.address_terminated(target, &watcher).await;
            }
            return;
        };

        let result = match message {
            SystemMessage::Watch { watcher } => {
                let watch = RemoteWatch {
                    watcher: self.registry().qualify(&watcher),
                    watchee: target.clone(),
                };
                let result = manager.remote_watch(watch).await;
                if result.is_err() {
                    self.address_terminated(target, &watcher).await;
                }
                result
            }
            SystemMessage::Unwatch { watcher } => {
                manager
                    .remote_unwatch(RemoteUnwatch {
                        watcher: self.registry().qualify(&watcher),
                        watchee: target.clone(),
                    })
                    .await
            }
            other => {
                manager
                    .remote_deliver(RemoteDeliver {
                        header: None,
                        message: Arc::new(other),
                        target: target.clone(),
                        sender: None,
                    })
                    .await
            }
        };

        if let Err(e) = result {
            warn!(target = %target, error = %e, "remote system message not delivered");
        }
    }

    async fn address_terminated(&self, who: &Pid, watcher: &Pid) {
        let terminated = Terminated {
            who: who.clone(),
            address_terminated: true,
        };
        self.send_system(watcher, SystemMessage::Terminated(terminated))
            .await;
    }

    async fn dead_letter(&self, target: &Pid, envelope: MessageEnvelope) {
        debug!(target = %target, message = ?envelope.message, "dead letter");
        let is_response = envelope
            .message()
            .as_any()
            .is::<DeadLetterResponse>();

        self.publish(DeadLetterEvent {
            pid: target.clone(),
            message: envelope.message.clone(),
            sender: envelope.sender.clone(),
        })
        .await;

        let Some(sender) = envelope.sender else {
            return;
        };
        if is_response {
            return;
        }
        let response = MessageEnvelope::new(DeadLetterResponse {
            target: target.clone(),
        });
        if self.registry().is_local(&sender) {
            if let Some(process) = self.registry().get_local(&sender) {
                if process.send_user(response).await.is_err() {
                    trace!(sender = %sender, "dead letter response not delivered");
                }
            }
        } else if let Some(manager) = self.endpoint_manager() {
            let deliver = RemoteDeliver {
                header: None,
                message: response.message,
                target: sender.clone(),
                sender: None,
            };
            if let Err(e) = manager.remote_deliver(deliver).await {
                debug!(sender = %sender, error = %e, "dead letter response not delivered");
            }
        }
    }

    /// Registers a one-shot reply slot and returns its pid and the receiving end.
    pub fn spawn_future(&self) -> (Pid, oneshot::Receiver<MessageEnvelope>) {
        let (reply, receiver) = oneshot::channel();
        let pid = self.registry().new_local_pid(self.registry().next_id());
        self.registry()
            .add_generated(ProcessRef::Future(FutureProcess::new(pid.clone(), reply)));
        (pid, receiver)
    }

    /// Waits for the reply to a future spawned with [`ActorRuntime::spawn_future`] and
    /// unregisters it. A [`DeadLetterResponse`] reply becomes [`MessageError::DeadLetter`].
    pub async fn await_future(
        &self,
        target: &Pid,
        future_pid: &Pid,
        receiver: oneshot::Receiver<MessageEnvelope>,
        timeout: Duration,
    ) -> Result<MessageEnvelope, MessageError> {
        let outcome = tokio::time::timeout(timeout, receiver).await;
        self.registry().remove(future_pid);

        let reply = match outcome {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(MessageError::ResponderDropped),
            Err(_) => {
                return Err(MessageError::Timeout {
                    target: target.clone(),
                    after: timeout,
                })
            }
        };
        if let Some(dead) = reply.message().as_any().downcast_ref::<DeadLetterResponse>() {
            return Err(MessageError::DeadLetter(dead.target.clone()));
        }
        Ok(reply)
    }

    /// Sends `message` and waits up to `timeout` for one reply.
    #[instrument(skip(self, message), fields(target = %target))]
    pub async fn request_future(
        &self,
        target: &Pid,
        message: impl CourierMessage,
        timeout: Duration,
    ) -> Result<MessageEnvelope, MessageError> {
        let (future_pid, receiver) = self.spawn_future();
        self.request(target, message, &future_pid).await;
        self.await_future(target, &future_pid, receiver, timeout)
            .await
    }

    /// Sends `message` and waits for a reply of type `R`, using the configured request
    /// timeout.
    pub async fn ask<R: CourierMessage + Clone>(
        &self,
        target: &Pid,
        message: impl CourierMessage,
    ) -> Result<R, MessageError> {
        let reply = self
            .request_future(target, message, self.config().request_timeout())
            .await?;
        reply
            .message()
            .as_any()
            .downcast_ref::<R>()
            .cloned()
            .ok_or(MessageError::UnexpectedReply {
                expected: std::any::type_name::<R>(),
            })
    }

    /// Publishes an event on the runtime's event stream.
    pub async fn publish(&self, event: impl CourierMessage) {
        self.0.event_stream.publish(event).await;
    }

    /// Forwards every published event of type `E` to `pid`. The subscription is dropped
    /// by [`EventStream::remove_pid`].
    pub fn subscribe_pid<E: CourierMessage + Clone>(&self, pid: &Pid) -> Subscription {
        let runtime = self.downgrade();
        let target = pid.clone();
        let subscription = self.event_stream().subscribe_to::<E>(move |event| {
            let runtime = Self::upgrade(&runtime);
            let target = target.clone();
            Box::pin(async move {
                if let Some(runtime) = runtime {
                    runtime.tell(&target, event).await;
                }
            })
        });
        self.event_stream().track_pid(pid.clone(), subscription);
        subscription
    }

    /// Stops every top-level actor, then the remoting layer.
    ///
    /// If the actors do not finish within the system shutdown timeout the root
    /// cancellation token is cancelled and the remaining tasks are torn down.
    #[instrument(skip(self))]
    pub async fn shutdown_all(&self) -> anyhow::Result<()> {
        let stop_futures: Vec<_> = self
            .0
            .roots
            .iter()
            .map(|item| {
                let handle = item.value().clone();
                async move {
                    if let Err(e) = handle.stop().await {
                        error!("Error stopping actor {}: {:?}", handle.pid(), e);
                    }
                }
            })
            .collect();

        let timeout = self.config().system_shutdown_timeout();
        trace!("Waiting for all actors to finish gracefully...");
        if tokio::time::timeout(timeout, join_all(stop_futures))
            .await
            .is_err()
        {
            error!(
                "System-wide shutdown timeout expired after {:?}. Forcefully cancelling remaining tasks.",
                timeout
            );
            self.0.cancellation_token.cancel();
        }

        if let Some(manager) = self.endpoint_manager() {
            manager.stop().await?;
            self.set_endpoint_manager(None);
        }
        trace!("System shutdown complete.");
        Ok(())
    }
}
