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
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error, instrument, trace};

use crate::actor::{ActorConfig, Idle, ManagedActor, Started};
use crate::common::{ActorHandle, ActorRuntime, FutureBox};
use crate::message::{AutoReceive, MessageEnvelope, MessageError, Pid, PidSet, SystemMessage, Terminated};
use crate::router::messages::RouterReady;
use crate::router::{
    AddRoutee, BroadcastMessage, GetRoutees, RemoveRoutee, RouterKind, RouterState, Routees,
};
use crate::traits::CourierMessage;

/// Model of a router actor.
#[derive(Debug, Default)]
pub struct RouterModel {
    routees: PidSet,
    state: Option<Arc<dyn RouterState>>,
    grace: Duration,
}

impl RouterModel {
    /// Current routees.
    pub const fn routees(&self) -> &PidSet {
        &self.routees
    }

    fn refresh(&self) {
        if let Some(state) = &self.state {
            state.set_routees(&self.routees);
        }
    }
}

type ReadySlot = Arc<Mutex<Option<oneshot::Sender<()>>>>;

/// Builds the idle router actor; the caller adds the start hook.
fn build_router(
    runtime: &ActorRuntime,
    config: ActorConfig,
    state: Arc<dyn RouterState>,
    ready: ReadySlot,
) -> anyhow::Result<ManagedActor<Idle, RouterModel>> {
    let mut router = runtime.new_actor_with_config::<RouterModel>(config)?;

    let grace = runtime.config().routee_grace();
    router.with_producer(move || {
        state.set_routees(&PidSet::new());
        RouterModel {
            routees: PidSet::new(),
            state: Some(state.clone()),
            grace,
        }
    });

    router
        .mutate_on::<AddRoutee>(|actor, ctx| {
            let pid = ctx.message().pid.clone();
            if !actor.model.routees.add(pid.clone()) {
                return Box::pin(async {});
            }
            actor.model.refresh();
            trace!(router = %actor.pid(), routee = %pid, "routee added");
            let runtime = actor.runtime().clone();
            let watcher = actor.pid().clone();
            Box::pin(async move {
                runtime.send_system(&pid, SystemMessage::Watch { watcher }).await;
            })
        })
        .mutate_on::<RemoveRoutee>(|actor, ctx| {
            let pid = ctx.message().pid.clone();
            if !actor.model.routees.remove(&pid) {
                return Box::pin(async {});
            }
            actor.model.refresh();
            trace!(router = %actor.pid(), routee = %pid, "routee removed");
            let runtime = actor.runtime().clone();
            let watcher = actor.pid().clone();
            let is_child = actor.handle().find_child(&pid).is_some();
            let grace = actor.model.grace;
            Box::pin(async move {
                if !is_child {
                    runtime.send_system(&pid, SystemMessage::Unwatch { watcher }).await;
                }
                tokio::time::sleep(grace).await;
                runtime
                    .send_user(&pid, MessageEnvelope::new(AutoReceive::PoisonPill))
                    .await;
            })
        })
        .mutate_on::<BroadcastMessage>(|actor, ctx| {
            let targets = actor.model.routees.values();
            let envelope = MessageEnvelope::from_arc(ctx.message().message.clone())
                .with_header(ctx.header().cloned())
                .with_sender(ctx.sender().cloned());
            let runtime = actor.runtime().clone();
            Box::pin(async move {
                for target in targets {
                    runtime.send_user(&target, envelope.clone()).await;
                }
            })
        })
        .mutate_on::<GetRoutees>(|actor, ctx| {
            let routees = Routees {
                pids: actor.model.routees.values(),
            };
            let responder = ctx.responder();
            Box::pin(async move { responder.respond(routees).await })
        })
        .mutate_on::<Terminated>(|actor, ctx| {
            let who = &ctx.message().who;
            if actor.model.routees.remove(who) {
                actor.model.refresh();
                debug!(router = %actor.pid(), routee = %who, "routee terminated");
            }
            Box::pin(async {})
        })
        .mutate_on::<RouterReady>(move |actor, _ctx| {
            if let Some(ready) = ready.lock().take() {
                trace!(router = %actor.pid(), routees = actor.model.routees.len(), "router ready");
                if ready.send(()).is_err() {
                    trace!(router = %actor.pid(), "nobody waits for router readiness");
                }
            }
            Box::pin(async {})
        })
        .on_unhandled(|actor, envelope| {
            let state = actor.model.state.clone();
            let runtime = actor.runtime().clone();
            let envelope = envelope.clone();
            Box::pin(async move {
                if let Some(state) = state {
                    state.route_message(&runtime, envelope).await;
                }
            })
        });

    Ok(router)
}

/// Sends the initial routees and the readiness marker to the router's own inbox.
async fn announce(router: &ActorHandle, routees: Vec<Pid>) {
    for pid in routees {
        if let Err(e) = router.send(AddRoutee { pid }).await {
            error!(router = %router.pid(), error = %e, "initial routee not added");
        }
    }
    if let Err(e) = router.send(RouterReady).await {
        error!(router = %router.pid(), error = %e, "router readiness not signalled");
    }
}

async fn start_router(
    runtime: &ActorRuntime,
    router: ManagedActor<Idle, RouterModel>,
    state: Arc<dyn RouterState>,
    ready: oneshot::Receiver<()>,
) -> anyhow::Result<RouterHandle> {
    let handle = router.start().await;
    let timeout = runtime.config().request_timeout();
    match tokio::time::timeout(timeout, ready).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => anyhow::bail!("router {} stopped before it was ready", handle.pid()),
        Err(_) => anyhow::bail!("router {} not ready within {timeout:?}", handle.pid()),
    }
    Ok(RouterHandle {
        handle,
        state,
        runtime: runtime.clone(),
    })
}

/// Starts a router over a fixed initial set of routees.
#[instrument(skip(runtime, routees))]
pub async fn spawn_group(
    runtime: &ActorRuntime,
    kind: RouterKind,
    routees: impl IntoIterator<Item = Pid>,
) -> anyhow::Result<RouterHandle> {
    let state = kind.new_state();
    let (ready_tx, ready_rx) = oneshot::channel();
    let mut router = build_router(
        runtime,
        ActorConfig::default(),
        state.clone(),
        Arc::new(Mutex::new(Some(ready_tx))),
    )?;

    let initial: Vec<Pid> = routees.into_iter().collect();
    router.after_start(move |actor| {
        let handle = actor.handle().clone();
        let initial = initial.clone();
        async move { announce(&handle, initial).await }
    });

    start_router(runtime, router, state, ready_rx).await
}

/// Starts a router whose routees are `size` children built by `configure`.
///
/// The children are supervised by the router and respawned with it when it restarts.
#[instrument(skip(runtime, configure))]
pub async fn spawn_pool<W, F>(
    runtime: &ActorRuntime,
    kind: RouterKind,
    size: usize,
    configure: F,
) -> anyhow::Result<RouterHandle>
where
    W: Default + Send + Debug + 'static,
    F: Fn(&mut ManagedActor<Idle, W>) + Send + Sync + 'static,
{
    let state = kind.new_state();
    let (ready_tx, ready_rx) = oneshot::channel();
    let capacity = runtime.config().limits.actor_inbox_capacity.max(size + 1);
    let mut router = build_router(
        runtime,
        ActorConfig::default().with_inbox_capacity(capacity),
        state.clone(),
        Arc::new(Mutex::new(Some(ready_tx))),
    )?;

    let configure = Arc::new(configure);
    router.after_start(move |actor: &ManagedActor<Started, RouterModel>| -> FutureBox {
        let handle = actor.handle().clone();
        let mut children = Vec::with_capacity(size);
        for _ in 0..size {
            match actor.create_child::<W>(None) {
                Ok(mut child) => {
                    configure(&mut child);
                    children.push(child);
                }
                Err(e) => error!(router = %handle.pid(), error = %e, "routee not created"),
            }
        }
        Box::pin(async move {
            let mut pids = Vec::with_capacity(children.len());
            for child in children {
                match handle.supervise(child).await {
                    Ok(routee) => pids.push(routee.pid().clone()),
                    Err(e) => error!(router = %handle.pid(), error = %e, "routee not started"),
                }
            }
            announce(&handle, pids).await;
        })
    });

    start_router(runtime, router, state, ready_rx).await
}

/// A started router.
///
/// User messages sent through the handle are routed by the calling task; membership
/// and broadcast messages go through the router actor.
#[derive(Debug, Clone)]
pub struct RouterHandle {
    handle: ActorHandle,
    state: Arc<dyn RouterState>,
    runtime: ActorRuntime,
}

impl RouterHandle {
    /// The router's pid. Messages sent to it are routed too.
    pub const fn pid(&self) -> &Pid {
        self.handle.pid()
    }

    /// The router actor's handle.
    pub const fn handle(&self) -> &ActorHandle {
        &self.handle
    }

    /// Routes `message` with no sender.
    pub async fn tell(&self, message: impl CourierMessage) {
        self.state
            .route_message(&self.runtime, MessageEnvelope::new(message))
            .await;
    }

    /// Routes `message` with replies going to `sender`.
    pub async fn request(&self, message: impl CourierMessage, sender: &Pid) {
        let envelope = MessageEnvelope::new(message).with_sender(Some(sender.clone()));
        self.state.route_message(&self.runtime, envelope).await;
    }

    /// Adds a routee.
    pub async fn add_routee(&self, pid: Pid) -> Result<(), MessageError> {
        self.handle.send(AddRoutee { pid }).await
    }

    /// Removes a routee.
    pub async fn remove_routee(&self, pid: Pid) -> Result<(), MessageError> {
        self.handle.send(RemoveRoutee { pid }).await
    }

    /// Sends `message` to every routee.
    pub async fn broadcast(&self, message: impl CourierMessage) -> Result<(), MessageError> {
        self.handle.send(BroadcastMessage::new(message)).await
    }

    /// Asks the router for its routees.
    pub async fn routees(&self) -> Result<Vec<Pid>, MessageError> {
        let routees: Routees = self.runtime.ask(self.handle.pid(), GetRoutees).await?;
        Ok(routees.pids)
    }

    /// Stops the router and, for pools, its routees.
    pub async fn stop(&self) -> anyhow::Result<()> {
        self.handle.stop().await
    }
}
