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

use std::any::Any;
use std::fmt::Debug;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use tracing::{debug, error, instrument, trace, warn};

use crate::actor::{ManagedActor, SupervisionDecision, TerminationReason};
use crate::common::{ActorHandle, FutureHandler, ReactorItem, ReactorMap};
use crate::message::{
    classify, AutoReceive, Failure, MessageEnvelope, MessageKind, SystemMessage, Terminated,
};

/// Type-state marker for an actor whose message loop is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Started;

/// Handlers moved out of the actor when it starts, so they can be borrowed while the
/// actor itself is borrowed mutably.
pub(crate) struct Reactors<Model: Default + Send + Debug + 'static> {
    pub(crate) handlers: ReactorMap<Model>,
    pub(crate) unhandled: Option<Box<FutureHandler<Model>>>,
}

impl<Model: Default + Send + Debug + 'static> ManagedActor<Started, Model> {
    /// `true` while the actor waits for its supervisor to decide about a failure.
    #[inline]
    pub const fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Number of failures this actor has reported.
    #[inline]
    pub fn failure_count(&self) -> usize {
        self.restart_stats.failure_count()
    }

    #[instrument(skip(self, reactors), fields(pid = %self.handle.pid()))]
    pub(crate) async fn wake(mut self, reactors: Reactors<Model>) {
        let after_start = (self.after_start)(&self);
        after_start.await;

        let cancel_token = self.handle.cancellation_token.clone();
        let mut cancel = Box::pin(cancel_token.cancelled());

        loop {
            tokio::select! {
                biased;

                () = &mut cancel => {
                    trace!("forceful cancellation");
                    break;
                }

                Some(message) = self.system_inbox.recv() => {
                    self.handle_system(message, &reactors).await;
                }

                incoming = self.inbox.recv(), if !self.suspended => {
                    let Some(envelope) = incoming else { break; };
                    self.handle_envelope(envelope, &reactors).await;
                }
            }
        }

        self.finish().await;
    }

    async fn handle_envelope(&mut self, envelope: MessageEnvelope, reactors: &Reactors<Model>) {
        match classify(envelope.message()) {
            MessageKind::AutoReceive => {
                if let Some(AutoReceive::PoisonPill) =
                    envelope.message().as_any().downcast_ref::<AutoReceive>()
                {
                    trace!(pid = %self.handle.pid(), "poison pill received");
                    self.begin_stop().await;
                } else {
                    trace!(pid = %self.handle.pid(), message = ?envelope.message, "auto-receive message ignored");
                }
            }
            MessageKind::System => {
                if let Some(system) = envelope.message().as_any().downcast_ref::<SystemMessage>() {
                    self.handle_system(system.clone(), reactors).await;
                }
            }
            MessageKind::User => self.dispatch(&envelope, reactors).await,
        }
    }

    async fn dispatch(&mut self, envelope: &MessageEnvelope, reactors: &Reactors<Model>) {
        let type_id = envelope.message().as_any().type_id();
        let outcome = if let Some(reactor) = reactors.handlers.get(&type_id) {
            self.invoke(reactor, envelope).await
        } else if let Some(unhandled) = &reactors.unhandled {
            self.invoke_infallible(unhandled, envelope).await
        } else {
            trace!(pid = %self.handle.pid(), message = ?envelope.message, "no handler for message");
            Ok(())
        };

        if let Err(reason) = outcome {
            self.escalate_failure(reason).await;
        }
    }

    async fn invoke(
        &mut self,
        reactor: &ReactorItem<Model>,
        envelope: &MessageEnvelope,
    ) -> Result<(), TerminationReason> {
        match reactor {
            ReactorItem::Mutable(handler) => self.invoke_infallible(handler, envelope).await,
            ReactorItem::Fallible(handler) => {
                let future = catch_unwind(AssertUnwindSafe(|| handler(self, envelope)))
                    .map_err(panic_reason)?;
                match AssertUnwindSafe(future).catch_unwind().await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(TerminationReason::Error(e.to_string())),
                    Err(panic) => Err(panic_reason(panic)),
                }
            }
        }
    }

    async fn invoke_infallible(
        &mut self,
        handler: &FutureHandler<Model>,
        envelope: &MessageEnvelope,
    ) -> Result<(), TerminationReason> {
        let future =
            catch_unwind(AssertUnwindSafe(|| handler(self, envelope))).map_err(panic_reason)?;
        AssertUnwindSafe(future)
            .catch_unwind()
            .await
            .map_err(panic_reason)
    }

    async fn handle_system(&mut self, message: SystemMessage, reactors: &Reactors<Model>) {
        trace!(pid = %self.handle.pid(), message = message.name(), "system message");
        match message {
            SystemMessage::Started => {}
            SystemMessage::Stop => self.begin_stop().await,
            SystemMessage::Watch { watcher } => {
                if self.stopping {
                    let terminated = Terminated {
                        who: self.handle.pid().clone(),
                        address_terminated: false,
                    };
                    self.runtime
                        .send_system(&watcher, SystemMessage::Terminated(terminated))
                        .await;
                } else {
                    self.watchers.add(watcher);
                }
            }
            SystemMessage::Unwatch { watcher } => {
                self.watchers.remove(&watcher);
            }
            SystemMessage::Terminated(terminated) => {
                self.handle.remove_child(&terminated.who);
                self.dispatch(&MessageEnvelope::new(terminated), reactors)
                    .await;
            }
            SystemMessage::Failure(failure) => self.handle_child_failure(failure).await,
            SystemMessage::Restart => self.restart().await,
        }
    }

    async fn begin_stop(&mut self) {
        if self.stopping {
            return;
        }
        self.stopping = true;
        self.suspended = false;
        let before_stop = (self.before_stop)(self);
        before_stop.await;
        self.inbox.close();
    }

    async fn finish(&mut self) {
        let pid = self.handle.pid().clone();
        terminate_children(&self.handle, self.runtime.config().actor_shutdown_timeout()).await;

        self.runtime.registry().remove(&pid);
        self.runtime.untrack_root(&pid);

        for watcher in self.watchers.values() {
            let terminated = Terminated {
                who: pid.clone(),
                address_terminated: false,
            };
            self.runtime
                .send_system(&watcher, SystemMessage::Terminated(terminated))
                .await;
        }
        self.watchers.clear();

        let after_stop = (self.after_stop)(self);
        after_stop.await;
        trace!(pid = %pid, "actor stopped");
    }

    async fn escalate_failure(&mut self, reason: TerminationReason) {
        self.restart_stats.fail();
        let Some(parent) = &self.parent else {
            error!(pid = %self.handle.pid(), %reason, "unsupervised actor failed; continuing");
            return;
        };

        warn!(pid = %self.handle.pid(), parent = %parent.pid(), %reason, "actor failed; suspending");
        let failure = Failure {
            who: self.handle.pid().clone(),
            reason,
            restart_stats: self.restart_stats.clone(),
        };
        if parent.send_system(SystemMessage::Failure(failure)).is_err() {
            error!(pid = %self.handle.pid(), "supervisor is gone; resuming");
        } else {
            self.suspended = true;
        }
    }

    #[instrument(skip(self, failure), fields(pid = %self.handle.pid(), child = %failure.who))]
    async fn handle_child_failure(&mut self, failure: Failure) {
        let Some(child) = self.handle.find_child(&failure.who) else {
            debug!("failure reported by an unknown child");
            return;
        };

        let (decision, backoff) = match self.restart_limiter.check(&failure.restart_stats) {
            Ok(backoff) => {
                // Start order only matters when more than the failed child restarts.
                let index = if self.supervision_strategy.requires_group_restart() {
                    self.handle
                        .children_in_start_order()
                        .iter()
                        .position(|c| c.pid() == &failure.who)
                        .unwrap_or_default()
                } else {
                    0
                };
                let decision = self.supervision_strategy.decide(
                    child.restart_policy(),
                    &failure.reason,
                    index,
                );
                (decision, backoff)
            }
            Err(exceeded) => {
                warn!(%exceeded, "restart limit reached");
                (SupervisionDecision::Escalate, Duration::ZERO)
            }
        };

        debug!(%decision, ?backoff, "supervision decision");
        match decision {
            SupervisionDecision::RestartChild => self.restart_children(vec![child], backoff),
            SupervisionDecision::RestartAll => {
                self.restart_children(self.handle.children_in_start_order(), backoff);
            }
            SupervisionDecision::RestartFrom(index) => {
                let children = self.handle.children_in_start_order();
                self.restart_children(children.into_iter().skip(index).collect(), backoff);
            }
            SupervisionDecision::NoRestart => stop_child(&child),
            SupervisionDecision::Escalate => {
                stop_child(&child);
                self.escalate_failure(failure.reason).await;
            }
        }
    }

    fn restart_children(&self, children: Vec<ActorHandle>, backoff: Duration) {
        if backoff.is_zero() {
            for child in &children {
                send_restart(child);
            }
            return;
        }
        self.handle.tracker().spawn(async move {
            tokio::time::sleep(backoff).await;
            for child in &children {
                send_restart(child);
            }
        });
    }

    #[instrument(skip(self), fields(pid = %self.handle.pid()))]
    async fn restart(&mut self) {
        let before_restart = (self.before_restart)(self);
        before_restart.await;

        terminate_children(&self.handle, self.runtime.config().actor_shutdown_timeout()).await;
        self.model = (self.producer)();
        self.suspended = false;

        let after_start = (self.after_start)(self);
        after_start.await;
        trace!("actor restarted");
    }
}

fn send_restart(child: &ActorHandle) {
    if child.send_system(SystemMessage::Restart).is_err() {
        debug!(child = %child.pid(), "child stopped before restart");
    }
}

fn stop_child(child: &ActorHandle) {
    if child.send_system(SystemMessage::Stop).is_err() {
        debug!(child = %child.pid(), "child already stopped");
    }
}

fn panic_reason(payload: Box<dyn Any + Send>) -> TerminationReason {
    let message = payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    TerminationReason::Panic(message)
}

enum ChildStopResult {
    Success,
    Error { child_id: String, error: String },
    Timeout { child_id: String },
}

#[instrument(skip(handle), fields(pid = %handle.pid()))]
async fn terminate_children(handle: &ActorHandle, timeout: Duration) {
    use tokio::time::timeout as tokio_timeout;

    let stop_futures: Vec<_> = handle
        .children_in_start_order()
        .into_iter()
        .map(|child_handle| async move {
            trace!(child = %child_handle.pid(), "stopping child");
            match tokio_timeout(timeout, child_handle.stop()).await {
                Ok(Ok(())) => ChildStopResult::Success,
                Ok(Err(e)) => ChildStopResult::Error {
                    child_id: child_handle.pid().to_string(),
                    error: format!("{e:?}"),
                },
                Err(_) => ChildStopResult::Timeout {
                    child_id: child_handle.pid().to_string(),
                },
            }
        })
        .collect();

    if stop_futures.is_empty() {
        return;
    }
    let results = join_all(stop_futures).await;

    let mut timeout_children: Vec<&str> = Vec::new();
    let mut error_children: Vec<(&str, &str)> = Vec::new();
    for result in &results {
        match result {
            ChildStopResult::Success => {}
            ChildStopResult::Timeout { child_id } => timeout_children.push(child_id),
            ChildStopResult::Error { child_id, error } => error_children.push((child_id, error)),
        }
    }

    if !timeout_children.is_empty() {
        error!(
            "Shutdown timeout ({:?}) for {} child(ren) of actor {}: [{}]",
            timeout,
            timeout_children.len(),
            handle.pid(),
            timeout_children.join(", ")
        );
    }

    if !error_children.is_empty() {
        error!(
            "Shutdown errors for {} child(ren) of actor {}: [{}]",
            error_children.len(),
            handle.pid(),
            error_children
                .iter()
                .map(|(id, err)| format!("{id}: {err}"))
                .collect::<Vec<_>>()
                .join("; ")
        );
    }

    for child in handle.children_in_start_order() {
        handle.remove_child(child.pid());
    }
}
