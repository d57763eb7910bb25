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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::sync::OnceCell;
use tracing::{debug, error, trace};

use crate::actor::{Idle, ManagedActor, Started};
use crate::common::{ActorRuntime, ProcessRegistry, RegistryError};
use crate::message::{SystemMessage, Terminated};
use crate::remote::endpoint_manager::EndpointSupervisor;
use crate::remote::transport::{BatchSink, RemoteTransport};
use crate::remote::wire::MessageBatch;
use crate::remote::{EndpointConnectedEvent, EndpointTerminatedEvent, RemoteDeliver};
use crate::traits::CourierMessage;

/// Outbound half of an endpoint: dials the peer on the first message and ships every
/// [`RemoteDeliver`] as a one-envelope batch.
#[derive(Debug, Default)]
pub(crate) struct EndpointWriter {
    link: Option<WriterLink>,
}

#[derive(Debug, Clone)]
struct WriterLink {
    address: String,
    transport: Arc<dyn RemoteTransport>,
    sink: Arc<OnceCell<Arc<dyn BatchSink>>>,
    failed: Arc<AtomicBool>,
    events: UnboundedSender<Arc<dyn CourierMessage>>,
}

impl WriterLink {
    fn new(address: String, transport: Arc<dyn RemoteTransport>, runtime: &ActorRuntime) -> Self {
        Self {
            address,
            transport,
            sink: Arc::new(OnceCell::new()),
            failed: Arc::new(AtomicBool::new(false)),
            events: spawn_event_relay(runtime),
        }
    }

    fn publish(&self, event: impl CourierMessage) {
        if self.events.send(Arc::new(event)).is_err() {
            trace!(address = %self.address, "event relay closed; lifecycle event dropped");
        }
    }

    async fn write(&self, runtime: &ActorRuntime, deliver: RemoteDeliver) {
        if self.failed.load(Ordering::SeqCst) {
            trace!(address = %self.address, target = %deliver.target, "link is down; message dropped");
            return;
        }

        let was_connected = self.sink.initialized();
        let sink = match self
            .sink
            .get_or_try_init(|| self.transport.connect(&self.address))
            .await
        {
            Ok(sink) => sink.clone(),
            Err(e) => {
                error!(address = %self.address, error = %e, "dial failed");
                self.terminate();
                return;
            }
        };
        if !was_connected {
            debug!(address = %self.address, "endpoint connected");
            self.publish(EndpointConnectedEvent {
                address: self.address.clone(),
            });
        }

        let registry = runtime.registry();
        let qualified = qualify_system(registry, &*deliver.message);
        let payload: &dyn CourierMessage = match &qualified {
            Some(system) => system,
            None => &*deliver.message,
        };
        let serializer_id = runtime.config().remote.default_serializer_id;
        let (type_name, bytes) = match runtime.serializers().serialize(payload, serializer_id) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(target = %deliver.target, error = %e, "message not serializable; dropped");
                return;
            }
        };

        let batch = MessageBatch::single(
            deliver.target.id(),
            type_name,
            serializer_id,
            bytes,
            deliver.header,
            deliver.sender.map(|sender| registry.qualify(&sender)),
        );
        if let Err(e) = sink.send_batch(batch).await {
            error!(address = %self.address, error = %e, "send failed");
            self.terminate();
        }
    }

    fn terminate(&self) {
        if self.failed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.publish(EndpointTerminatedEvent {
            address: self.address.clone(),
        });
    }
}

/// Publishes a link's lifecycle events in the order they happened, off the writer's
/// task: the manager's subscriber stops this writer, which must not wait on itself.
/// The relay ends once the link is dropped.
fn spawn_event_relay(runtime: &ActorRuntime) -> UnboundedSender<Arc<dyn CourierMessage>> {
    let (events, mut pending) = unbounded_channel::<Arc<dyn CourierMessage>>();
    let runtime = runtime.clone();
    tokio::spawn(async move {
        while let Some(event) = pending.recv().await {
            runtime.event_stream().publish_arc(event).await;
        }
    });
    events
}

/// Pids inside system messages must name this node before they leave it.
fn qualify_system(registry: &ProcessRegistry, message: &dyn CourierMessage) -> Option<SystemMessage> {
    let system = message.as_any().downcast_ref::<SystemMessage>()?;
    Some(match system {
        SystemMessage::Watch { watcher } => SystemMessage::Watch {
            watcher: registry.qualify(watcher),
        },
        SystemMessage::Unwatch { watcher } => SystemMessage::Unwatch {
            watcher: registry.qualify(watcher),
        },
        SystemMessage::Terminated(terminated) => SystemMessage::Terminated(Terminated {
            who: registry.qualify(&terminated.who),
            address_terminated: terminated.address_terminated,
        }),
        other => other.clone(),
    })
}

/// Creates the idle writer actor for `address` under `supervisor`.
pub(crate) fn spawn_writer(
    supervisor: &ManagedActor<Started, EndpointSupervisor>,
    address: &str,
    transport: Arc<dyn RemoteTransport>,
) -> Result<ManagedActor<Idle, EndpointWriter>, RegistryError> {
    let mut actor = supervisor.create_child::<EndpointWriter>(None)?;

    let address = address.to_string();
    let runtime = supervisor.runtime().clone();
    actor.with_producer(move || EndpointWriter {
        link: Some(WriterLink::new(address.clone(), transport.clone(), &runtime)),
    });

    actor.mutate_on::<RemoteDeliver>(|actor, ctx| {
        let link = actor.model.link.clone();
        let runtime = actor.runtime().clone();
        let deliver = ctx.message().clone();
        Box::pin(async move {
            if let Some(link) = link {
                link.write(&runtime, deliver).await;
            }
        })
    });

    Ok(actor)
}
