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
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, error, instrument, trace, warn};

use crate::actor::{ActorConfig, RestartLimiterConfig, SupervisionStrategy};
use crate::common::runtime_inner::RuntimeInner;
use crate::common::{ActorHandle, ActorRuntime, Subscription};
use crate::message::{MessageEnvelope, MessageError, Pid, SystemMessage};
use crate::remote::endpoint_watcher::spawn_watcher;
use crate::remote::endpoint_writer::spawn_writer;
use crate::remote::messages::{EndpointRefused, EnsureEndpoint};
use crate::remote::transport::RemoteTransport;
use crate::remote::{
    Endpoint, EndpointConnectedEvent, EndpointError, EndpointTerminatedEvent, RemoteDeliver,
    RemoteTerminate, RemoteUnwatch, RemoteWatch,
};
use crate::traits::CourierMessage;

/// Model of the actor that builds and supervises every writer/watcher pair.
#[derive(Debug, Default)]
pub(crate) struct EndpointSupervisor {
    transport: Option<Arc<dyn RemoteTransport>>,
}

#[derive(Debug, Default)]
struct EndpointLazy {
    cell: OnceCell<Endpoint>,
    unloaded: AtomicBool,
}

struct ManagerInner {
    runtime: Weak<RuntimeInner>,
    endpoints: DashMap<String, Arc<EndpointLazy>>,
    supervisor: ActorHandle,
    subscription: Mutex<Option<Subscription>>,
    constructed: AtomicUsize,
    stopped: AtomicBool,
}

impl fmt::Debug for ManagerInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerInner")
            .field("endpoints", &self.endpoints.len())
            .field("supervisor", self.supervisor.pid())
            .field("constructed", &self.constructed.load(Ordering::Relaxed))
            .field("stopped", &self.stopped.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Directory of remote endpoints, keyed by address.
///
/// An endpoint is built on first use by asking the endpoint supervisor for a writer and
/// a watcher. Concurrent first callers for one address share a single construction.
/// When an [`EndpointTerminatedEvent`] is published the endpoint is torn down exactly
/// once and the next caller builds a fresh one.
#[derive(Debug, Clone)]
pub struct EndpointManager(Arc<ManagerInner>);

impl EndpointManager {
    /// Starts the endpoint supervisor and subscribes to endpoint lifecycle events.
    #[instrument(skip(runtime, transport))]
    pub async fn start(
        runtime: &ActorRuntime,
        transport: Arc<dyn RemoteTransport>,
    ) -> anyhow::Result<Self> {
        let config = ActorConfig::new_with_name(runtime.config().defaults.endpoint_supervisor_name.clone())
            .with_supervision_strategy(SupervisionStrategy::OneForOne)
            .with_restart_limiter(RestartLimiterConfig::disabled());
        let mut supervisor = runtime.new_actor_with_config::<EndpointSupervisor>(config)?;
        supervisor.with_producer(move || EndpointSupervisor {
            transport: Some(transport.clone()),
        });

        supervisor.mutate_on::<EnsureEndpoint>(|actor, ctx| {
            let address = ctx.message().address.clone();
            let responder = ctx.responder();
            let handle = actor.handle().clone();

            let Some(transport) = actor.model.transport.clone() else {
                return Box::pin(async move {
                    responder
                        .respond(EndpointRefused {
                            reason: "no transport configured".into(),
                        })
                        .await;
                });
            };
            let parent = &*actor;
            let built = spawn_writer(parent, &address, transport).and_then(|writer| {
                let watcher = spawn_watcher(parent, &address, writer.pid())?;
                Ok((writer, watcher))
            });

            Box::pin(async move {
                let (writer, watcher) = match built {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!(address = %address, error = %e, "endpoint actors not created");
                        responder
                            .respond(EndpointRefused {
                                reason: e.to_string(),
                            })
                            .await;
                        return;
                    }
                };
                let supervised = async {
                    let writer = handle.supervise(writer).await?;
                    let watcher = handle.supervise(watcher).await?;
                    anyhow::Ok(Endpoint {
                        writer: writer.pid().clone(),
                        watcher: watcher.pid().clone(),
                    })
                };
                match supervised.await {
                    Ok(endpoint) => {
                        trace!(address = %address, writer = %endpoint.writer, watcher = %endpoint.watcher, "endpoint built");
                        responder.respond(endpoint).await;
                    }
                    Err(e) => {
                        error!(address = %address, error = %e, "endpoint actors not started");
                        responder
                            .respond(EndpointRefused {
                                reason: e.to_string(),
                            })
                            .await;
                    }
                }
            })
        });

        let supervisor = supervisor.start().await;
        let inner = Arc::new(ManagerInner {
            runtime: runtime.downgrade(),
            endpoints: DashMap::new(),
            supervisor,
            subscription: Mutex::new(None),
            constructed: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
        });

        let weak: Weak<ManagerInner> = Arc::downgrade(&inner);
        let subscription = runtime.event_stream().subscribe_with_predicate(
            move |event| {
                let manager = weak.upgrade().map(EndpointManager);
                Box::pin(async move {
                    if let Some(manager) = manager {
                        manager.on_endpoint_event(&*event).await;
                    }
                })
            },
            |event| {
                let any = event.as_any();
                any.is::<EndpointTerminatedEvent>() || any.is::<EndpointConnectedEvent>()
            },
        );
        *inner.subscription.lock() = Some(subscription);

        debug!("endpoint manager started");
        Ok(Self(inner))
    }

    /// Unsubscribes from lifecycle events and stops the supervisor, which stops every
    /// writer and watcher.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> anyhow::Result<()> {
        if self.0.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let subscription = self.0.subscription.lock().take();
        if let (Some(subscription), Ok(runtime)) = (subscription, self.runtime()) {
            runtime.event_stream().unsubscribe(&subscription);
        }
        self.0.supervisor.stop().await?;
        self.0.endpoints.clear();
        debug!("endpoint manager stopped");
        Ok(())
    }

    /// Returns the endpoint for `address`, building it if needed.
    ///
    /// At most one construction runs per address; every concurrent caller waits for it
    /// and receives the same endpoint. A failed construction is reported to the callers
    /// that waited on it and is not retried here.
    pub async fn ensure_connected(&self, address: &str) -> Result<Endpoint, EndpointError> {
        loop {
            if self.0.stopped.load(Ordering::SeqCst) {
                return Err(EndpointError::Stopped);
            }
            let lazy = self
                .0
                .endpoints
                .entry(address.to_string())
                .or_default()
                .value()
                .clone();
            // `None` means the entry was torn down before anyone built it.
            let built = lazy
                .cell
                .get_or_try_init(|| async {
                    if lazy.unloaded.load(Ordering::SeqCst) {
                        return Err(None);
                    }
                    self.construct(address).await.map_err(Some)
                })
                .await;
            match built {
                Ok(endpoint) => return Ok(endpoint.clone()),
                Err(Some(e)) => return Err(e),
                Err(None) => trace!(address = %address, "endpoint removed while connecting"),
            }
        }
    }

    fn runtime(&self) -> Result<ActorRuntime, EndpointError> {
        ActorRuntime::upgrade(&self.0.runtime).ok_or(EndpointError::Stopped)
    }

    async fn construct(&self, address: &str) -> Result<Endpoint, EndpointError> {
        self.0.constructed.fetch_add(1, Ordering::SeqCst);
        let runtime = self.runtime()?;
        let supervisor = &self.0.supervisor;

        let (future_pid, receiver) = runtime.spawn_future();
        let request = MessageEnvelope::new(EnsureEndpoint {
            address: address.to_string(),
        })
        .with_sender(Some(future_pid.clone()));
        if let Err(cause) = supervisor.send_envelope(request).await {
            runtime.registry().remove(&future_pid);
            return Err(EndpointError::Construction {
                address: address.to_string(),
                cause,
            });
        }

        let timeout = runtime.config().endpoint_request_timeout();
        let reply = runtime
            .await_future(supervisor.pid(), &future_pid, receiver, timeout)
            .await
            .map_err(|cause| match cause {
                MessageError::Timeout { after, .. } => EndpointError::SupervisorTimeout {
                    address: address.to_string(),
                    after,
                },
                cause => EndpointError::Construction {
                    address: address.to_string(),
                    cause,
                },
            })?;

        let any = reply.message().as_any();
        if let Some(endpoint) = any.downcast_ref::<Endpoint>() {
            return Ok(endpoint.clone());
        }
        if let Some(refused) = any.downcast_ref::<EndpointRefused>() {
            return Err(EndpointError::Refused {
                address: address.to_string(),
                reason: refused.reason.clone(),
            });
        }
        Err(EndpointError::Construction {
            address: address.to_string(),
            cause: MessageError::UnexpectedReply {
                expected: std::any::type_name::<Endpoint>(),
            },
        })
    }

    /// Registers a remote watch with the watchee's endpoint.
    pub async fn remote_watch(&self, watch: RemoteWatch) -> Result<(), EndpointError> {
        let endpoint = self.ensure_connected(watch.watchee.address()).await?;
        self.forward(&endpoint.watcher, watch).await
    }

    /// Removes a remote watch.
    pub async fn remote_unwatch(&self, unwatch: RemoteUnwatch) -> Result<(), EndpointError> {
        let endpoint = self.ensure_connected(unwatch.watchee.address()).await?;
        self.forward(&endpoint.watcher, unwatch).await
    }

    /// Reports that a remote watchee stopped.
    pub async fn remote_terminate(&self, terminate: RemoteTerminate) -> Result<(), EndpointError> {
        let endpoint = self.ensure_connected(terminate.watchee.address()).await?;
        self.forward(&endpoint.watcher, terminate).await
    }

    /// Hands a message to the target's writer.
    pub async fn remote_deliver(&self, deliver: RemoteDeliver) -> Result<(), EndpointError> {
        let endpoint = self.ensure_connected(deliver.target.address()).await?;
        self.forward(&endpoint.writer, deliver).await
    }

    async fn forward(&self, pid: &Pid, message: impl CourierMessage) -> Result<(), EndpointError> {
        let process = self
            .runtime()?
            .registry()
            .get_local(pid)
            .ok_or_else(|| EndpointError::Delivery(MessageError::DeadLetter(pid.clone())))?;
        process
            .send_user(MessageEnvelope::new(message))
            .await
            .map_err(EndpointError::Delivery)
    }

    /// Tears down the endpoint named by `event`.
    ///
    /// Only the first caller for a given endpoint does anything: it removes the entry,
    /// hands the event to the watcher and stops both actors. Returns `true` for that
    /// caller.
    pub async fn remove_endpoint(&self, event: &EndpointTerminatedEvent) -> bool {
        let Some(lazy) = self
            .0
            .endpoints
            .get(&event.address)
            .map(|entry| entry.value().clone())
        else {
            trace!(address = %event.address, "no endpoint to remove");
            return false;
        };
        if lazy
            .unloaded
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            trace!(address = %event.address, "endpoint already being removed");
            return false;
        }

        self.0
            .endpoints
            .remove_if(&event.address, |_, current| Arc::ptr_eq(current, &lazy));

        // Waits for a construction still in flight; never starts one.
        let endpoint = match lazy
            .cell
            .get_or_try_init(|| async { Err::<Endpoint, ()>(()) })
            .await
        {
            Ok(endpoint) => endpoint.clone(),
            Err(()) => {
                debug!(address = %event.address, "endpoint removed before it was built");
                return true;
            }
        };
        let Ok(runtime) = self.runtime() else {
            return true;
        };
        let registry = runtime.registry();
        if let Err(e) = self.forward(&endpoint.watcher, event.clone()).await {
            warn!(address = %event.address, error = %e, "watcher missed the termination");
        }
        for pid in [&endpoint.writer, &endpoint.watcher] {
            if let Some(process) = registry.get_local(pid) {
                if let Err(e) = process.send_system(SystemMessage::Stop) {
                    trace!(pid = %pid, error = %e, "endpoint actor already stopped");
                }
            }
        }
        debug!(address = %event.address, "endpoint removed");
        true
    }

    async fn on_endpoint_event(&self, event: &dyn CourierMessage) {
        let any = event.as_any();
        if let Some(terminated) = any.downcast_ref::<EndpointTerminatedEvent>() {
            self.remove_endpoint(terminated).await;
        } else if let Some(connected) = any.downcast_ref::<EndpointConnectedEvent>() {
            if let Some(endpoint) = self.endpoint(&connected.address) {
                if let Err(e) = self.forward(&endpoint.watcher, connected.clone()).await {
                    trace!(address = %connected.address, error = %e, "connected event not forwarded");
                }
            }
        }
    }

    /// The endpoint for `address`, if one has been built.
    pub fn endpoint(&self, address: &str) -> Option<Endpoint> {
        self.0
            .endpoints
            .get(address)
            .and_then(|entry| entry.value().cell.get().cloned())
    }

    /// Number of addresses with an entry.
    pub fn endpoint_count(&self) -> usize {
        self.0.endpoints.len()
    }

    /// How many endpoint constructions have been started.
    pub fn endpoints_constructed(&self) -> usize {
        self.0.constructed.load(Ordering::SeqCst)
    }

    /// The endpoint supervisor.
    pub fn supervisor(&self) -> &ActorHandle {
        &self.0.supervisor
    }
}
