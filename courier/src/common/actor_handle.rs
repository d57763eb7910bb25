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
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{instrument, trace};

use crate::actor::{Idle, ManagedActor, RestartPolicy};
use crate::common::{ActorSender, SystemSender};
use crate::message::{MessageEnvelope, MessageError, Pid, SystemMessage};
use crate::traits::CourierMessage;

/// A cheap, clonable reference to a local actor.
///
/// The handle owns the sending halves of the actor's two inboxes, the tracker of its
/// main task and the map of children it supervises. Equality and hashing use the
/// actor's [`Pid`].
#[derive(Debug, Clone)]
pub struct ActorHandle {
    pub(crate) pid: Pid,
    pub(crate) seq: u64,
    pub(crate) outbox: ActorSender,
    pub(crate) system_outbox: SystemSender,
    tracker: TaskTracker,
    children: Arc<DashMap<Pid, ActorHandle>>,
    pub(crate) restart_policy: RestartPolicy,
    pub(crate) cancellation_token: CancellationToken,
}

impl PartialEq for ActorHandle {
    fn eq(&self, other: &Self) -> bool {
        self.pid == other.pid
    }
}

impl Eq for ActorHandle {}

impl Hash for ActorHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pid.hash(state);
    }
}

impl ActorHandle {
    pub(crate) fn new(
        pid: Pid,
        seq: u64,
        outbox: ActorSender,
        system_outbox: SystemSender,
        restart_policy: RestartPolicy,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            pid,
            seq,
            outbox,
            system_outbox,
            tracker: TaskTracker::new(),
            children: Arc::new(DashMap::new()),
            restart_policy,
            cancellation_token,
        }
    }

    /// The actor's process id.
    #[inline]
    pub const fn pid(&self) -> &Pid {
        &self.pid
    }

    /// The restart policy this actor was configured with.
    #[inline]
    pub const fn restart_policy(&self) -> RestartPolicy {
        self.restart_policy
    }

    /// Sends a user message with no sender.
    pub async fn send(&self, message: impl CourierMessage) -> Result<(), MessageError> {
        self.send_envelope(MessageEnvelope::new(message)).await
    }

    /// Sends a prepared envelope through the user inbox.
    pub async fn send_envelope(&self, envelope: MessageEnvelope) -> Result<(), MessageError> {
        self.outbox
            .send(envelope)
            .await
            .map_err(|_| MessageError::InboxClosed(self.pid.clone()))
    }

    /// Sends a system message. System messages are processed before any queued user
    /// message.
    pub fn send_system(&self, message: SystemMessage) -> Result<(), MessageError> {
        trace!(pid = %self.pid, message = message.name(), "sending system message");
        self.system_outbox
            .send(message)
            .map_err(|_| MessageError::InboxClosed(self.pid.clone()))
    }

    /// Stops the actor and waits for it to finish.
    ///
    /// Queued user messages are drained, children are stopped, and watchers are
    /// notified before this returns.
    #[instrument(skip(self), fields(pid = %self.pid))]
    pub async fn stop(&self) -> anyhow::Result<()> {
        if self.send_system(SystemMessage::Stop).is_err() {
            trace!(pid = %self.pid, "actor already stopped");
        }
        self.tracker.wait().await;
        trace!(pid = %self.pid, "actor stopped");
        Ok(())
    }

    /// Starts `child` under this actor and begins watching it.
    #[instrument(skip(self, child), fields(parent = %self.pid))]
    pub async fn supervise<State: Default + Send + Debug + 'static>(
        &self,
        child: ManagedActor<Idle, State>,
    ) -> anyhow::Result<Self> {
        let handle = child.start().await;
        handle.send_system(SystemMessage::Watch {
            watcher: self.pid.clone(),
        })?;
        trace!(child = %handle.pid, "child supervised");
        self.children.insert(handle.pid.clone(), handle.clone());
        Ok(handle)
    }

    /// The children currently supervised by this actor.
    #[inline]
    pub fn children(&self) -> &DashMap<Pid, Self> {
        &self.children
    }

    /// Looks up a supervised child.
    pub fn find_child(&self, pid: &Pid) -> Option<Self> {
        self.children.get(pid).map(|entry| entry.value().clone())
    }

    /// Children in the order they were created.
    pub(crate) fn children_in_start_order(&self) -> Vec<Self> {
        let mut children: Vec<Self> = self
            .children
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        children.sort_by_key(|child| child.seq);
        children
    }

    pub(crate) fn remove_child(&self, pid: &Pid) -> Option<Self> {
        self.children.remove(pid).map(|(_, child)| child)
    }

    /// Tracker of the actor's main task.
    #[inline]
    pub fn tracker(&self) -> TaskTracker {
        self.tracker.clone()
    }

    /// `true` once the actor's main task has exited.
    pub fn is_stopped(&self) -> bool {
        self.tracker.is_closed() && self.tracker.is_empty()
    }
}
