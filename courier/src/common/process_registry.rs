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

//! Resolves local process ids to something that can receive messages.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use tracing::trace;

use crate::common::ActorHandle;
use crate::message::{MessageEnvelope, MessageError, Pid, SystemMessage, LOCAL_ADDRESS};

/// Prefix of generated process ids. User-chosen names may not start with it.
pub const GENERATED_ID_PREFIX: char = '$';

/// Something registered in the [`ProcessRegistry`].
#[derive(Debug, Clone)]
pub enum ProcessRef {
    /// A running (or about to run) actor.
    Actor(ActorHandle),
    /// A one-shot reply slot waiting on a request.
    Future(FutureProcess),
}

impl ProcessRef {
    /// The pid this process was registered under.
    pub const fn pid(&self) -> &Pid {
        match self {
            Self::Actor(handle) => handle.pid(),
            Self::Future(future) => &future.pid,
        }
    }

    /// Delivers a user message.
    pub async fn send_user(&self, envelope: MessageEnvelope) -> Result<(), MessageError> {
        match self {
            Self::Actor(handle) => handle.send_envelope(envelope).await,
            Self::Future(future) => future.complete(envelope),
        }
    }

    /// Delivers a system message.
    pub fn send_system(&self, message: SystemMessage) -> Result<(), MessageError> {
        match self {
            Self::Actor(handle) => handle.send_system(message),
            Self::Future(future) => {
                trace!(pid = %future.pid, message = message.name(), "future ignores system message");
                Ok(())
            }
        }
    }
}

/// A registry entry standing in for the caller of a request until the reply arrives.
#[derive(Clone)]
pub struct FutureProcess {
    pid: Pid,
    slot: Arc<Mutex<Option<oneshot::Sender<MessageEnvelope>>>>,
}

impl FutureProcess {
    pub(crate) fn new(pid: Pid, reply: oneshot::Sender<MessageEnvelope>) -> Self {
        Self {
            pid,
            slot: Arc::new(Mutex::new(Some(reply))),
        }
    }

    fn complete(&self, envelope: MessageEnvelope) -> Result<(), MessageError> {
        let Some(reply) = self.slot.lock().take() else {
            trace!(pid = %self.pid, "future already completed; reply dropped");
            return Ok(());
        };
        reply
            .send(envelope)
            .map_err(|_| MessageError::ResponderDropped)
    }
}

impl fmt::Debug for FutureProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureProcess")
            .field("pid", &self.pid)
            .field("completed", &self.slot.lock().is_none())
            .finish()
    }
}

/// Errors raised when registering a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Another process is already registered under this id.
    NameExists(String),
    /// The id uses the prefix reserved for generated ids.
    ReservedName(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameExists(id) => write!(f, "a process named '{id}' is already registered"),
            Self::ReservedName(id) => {
                write!(f, "'{id}' starts with the reserved prefix '{GENERATED_ID_PREFIX}'")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Maps local process ids to [`ProcessRef`]s and knows this node's address.
#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry(Arc<RegistryInner>);

#[derive(Debug)]
struct RegistryInner {
    address: RwLock<String>,
    processes: DashMap<String, ProcessRef>,
    sequence: AtomicU64,
}

impl Default for RegistryInner {
    fn default() -> Self {
        Self {
            address: RwLock::new(LOCAL_ADDRESS.to_string()),
            processes: DashMap::new(),
            sequence: AtomicU64::new(0),
        }
    }
}

impl ProcessRegistry {
    /// The address of this node; `nonhost` until remoting is started.
    pub fn address(&self) -> String {
        self.0.address.read().clone()
    }

    pub(crate) fn set_address(&self, address: impl Into<String>) {
        *self.0.address.write() = address.into();
    }

    /// Next value of the process-wide sequence counter.
    pub(crate) fn next_sequence(&self) -> u64 {
        self.0.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// A fresh generated process id (`$1`, `$2`, ...).
    pub fn next_id(&self) -> String {
        format!("{GENERATED_ID_PREFIX}{}", self.next_sequence())
    }

    /// A pid on this node.
    pub fn new_local_pid(&self, id: impl Into<String>) -> Pid {
        Pid::new(self.address(), id)
    }

    /// `true` when `pid` lives on this node.
    pub fn is_local(&self, pid: &Pid) -> bool {
        pid.address() == LOCAL_ADDRESS || pid.address() == self.0.address.read().as_str()
    }

    /// Rewrites a pid still carrying the placeholder address to this node's address, so
    /// it can be handed to another node.
    pub fn qualify(&self, pid: &Pid) -> Pid {
        if pid.address() == LOCAL_ADDRESS {
            self.new_local_pid(pid.id())
        } else {
            pid.clone()
        }
    }

    /// Registers a process under a user-chosen id.
    pub fn add(&self, process: ProcessRef) -> Result<(), RegistryError> {
        let id = process.pid().id();
        if id.starts_with(GENERATED_ID_PREFIX) {
            return Err(RegistryError::ReservedName(id.to_string()));
        }
        self.add_qualified(process)
    }

    /// Registers a process under an id whose user-chosen part was already checked. A
    /// child of an unnamed parent lands here as `$N/name`.
    pub(crate) fn add_qualified(&self, process: ProcessRef) -> Result<(), RegistryError> {
        match self.0.processes.entry(process.pid().id().to_string()) {
            Entry::Occupied(entry) => Err(RegistryError::NameExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(process);
                Ok(())
            }
        }
    }

    /// Registers a process whose id came from [`ProcessRegistry::next_id`].
    pub(crate) fn add_generated(&self, process: ProcessRef) {
        self.0
            .processes
            .insert(process.pid().id().to_string(), process);
    }

    /// Removes a local process.
    pub fn remove(&self, pid: &Pid) -> Option<ProcessRef> {
        self.0.processes.remove(pid.id()).map(|(_, process)| process)
    }

    /// Resolves a local pid. Foreign pids always resolve to `None`.
    pub fn get_local(&self, pid: &Pid) -> Option<ProcessRef> {
        if !self.is_local(pid) {
            return None;
        }
        self.get(pid.id())
    }

    /// Resolves a local process by id alone.
    pub fn get(&self, id: &str) -> Option<ProcessRef> {
        self.0.processes.get(id).map(|entry| entry.value().clone())
    }

    /// Number of registered processes.
    pub fn len(&self) -> usize {
        self.0.processes.len()
    }

    /// `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.0.processes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn future_ref(registry: &ProcessRegistry, id: &str) -> ProcessRef {
        let (tx, _rx) = oneshot::channel();
        ProcessRef::Future(FutureProcess::new(registry.new_local_pid(id), tx))
    }

    #[test]
    fn duplicate_and_reserved_names_are_rejected() {
        let registry = ProcessRegistry::default();
        assert!(registry.add(future_ref(&registry, "worker")).is_ok());
        assert_eq!(
            registry.add(future_ref(&registry, "worker")),
            Err(RegistryError::NameExists("worker".into()))
        );
        assert!(matches!(
            registry.add(future_ref(&registry, "$7")),
            Err(RegistryError::ReservedName(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn qualified_child_ids_may_sit_under_generated_parents() {
        let registry = ProcessRegistry::default();
        assert!(registry.add_qualified(future_ref(&registry, "$3/helper")).is_ok());
        assert_eq!(
            registry.add_qualified(future_ref(&registry, "$3/helper")),
            Err(RegistryError::NameExists("$3/helper".into()))
        );
        assert!(registry.get("$3/helper").is_some());
    }

    #[test]
    fn locality_follows_node_address() {
        let registry = ProcessRegistry::default();
        assert!(registry.is_local(&Pid::new(LOCAL_ADDRESS, "a")));

        registry.set_address("127.0.0.1:8090");
        assert!(registry.is_local(&Pid::new("127.0.0.1:8090", "a")));
        assert!(registry.is_local(&Pid::new(LOCAL_ADDRESS, "a")));
        assert!(!registry.is_local(&Pid::new("127.0.0.1:8091", "a")));
        assert_eq!(registry.new_local_pid("a").address(), "127.0.0.1:8090");
    }

    #[test]
    fn foreign_pid_never_resolves_locally() {
        let registry = ProcessRegistry::default();
        registry.add_generated(future_ref(&registry, "$1"));
        assert!(registry.get_local(&Pid::new(LOCAL_ADDRESS, "$1")).is_some());
        assert!(registry.get_local(&Pid::new("elsewhere:1", "$1")).is_none());
    }

    #[tokio::test]
    async fn future_process_completes_once() {
        let registry = ProcessRegistry::default();
        let (tx, rx) = oneshot::channel();
        let future = ProcessRef::Future(FutureProcess::new(registry.new_local_pid("$9"), tx));

        future
            .send_user(MessageEnvelope::new(crate::message::AutoReceive::Stopped))
            .await
            .unwrap();
        future
            .send_user(MessageEnvelope::new(crate::message::AutoReceive::Stopping))
            .await
            .unwrap();

        let reply = rx.await.unwrap();
        assert!(reply.message().as_any().is::<crate::message::AutoReceive>());
    }
}
