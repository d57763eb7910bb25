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

use tracing::{debug, instrument, trace, warn};

use crate::common::ActorRuntime;
use crate::message::{MessageEnvelope, Pid, SystemMessage};
use crate::remote::transport::BatchStream;
use crate::remote::wire::{ConnectRequest, ConnectResponse, MessageBatch};
use crate::remote::{ReaderError, RemoteTerminate};

/// Terminates inbound streams and turns every envelope into a local delivery.
///
/// One reader serves every peer of a node; each accepted stream runs its own
/// [`EndpointReader::receive`] loop. Clones share the suspension flag.
#[derive(Debug, Clone)]
pub struct EndpointReader {
    runtime: ActorRuntime,
    suspended: Arc<AtomicBool>,
}

impl EndpointReader {
    /// Creates a reader delivering into `runtime`.
    pub fn new(runtime: ActorRuntime) -> Self {
        Self {
            runtime,
            suspended: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The runtime messages are delivered into.
    #[inline]
    pub const fn runtime(&self) -> &ActorRuntime {
        &self.runtime
    }

    /// Accepts a connection unless the reader is suspended.
    pub fn connect(&self, request: &ConnectRequest) -> Result<ConnectResponse, ReaderError> {
        if self.is_suspended() {
            debug!(peer = %request.address, "connection refused while suspended");
            return Err(ReaderError::Suspended);
        }
        trace!(peer = %request.address, "connection accepted");
        Ok(ConnectResponse {
            default_serializer_id: self.runtime.config().remote.default_serializer_id,
        })
    }

    /// Pauses or resumes ingestion. Running `receive` loops observe the flag before
    /// reading their next batch.
    pub fn suspend(&self, suspended: bool) {
        self.suspended.store(suspended, Ordering::SeqCst);
    }

    /// `true` while ingestion is paused.
    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    /// Reads batches from `stream` until it closes or fails.
    ///
    /// Returns `Ok(())` on a clean close. A transport error, an out-of-range table index
    /// or a payload that cannot be decoded ends the stream; envelopes before the bad one
    /// have already been delivered.
    #[instrument(skip(self, stream))]
    pub async fn receive<S: BatchStream>(&self, mut stream: S) -> Result<(), ReaderError> {
        let backoff = self.runtime.config().reader_suspend_backoff();
        let mut targets: Vec<Pid> = Vec::with_capacity(self.runtime.config().limits.reader_target_buffer);

        loop {
            while self.is_suspended() {
                tokio::time::sleep(backoff).await;
            }

            let batch = match stream.next_batch().await {
                None => {
                    trace!("inbound stream closed");
                    return Ok(());
                }
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(batch)) => batch,
            };

            self.deliver_batch(batch, &mut targets).await?;
        }
    }

    async fn deliver_batch(
        &self,
        batch: MessageBatch,
        targets: &mut Vec<Pid>,
    ) -> Result<(), ReaderError> {
        targets.clear();
        targets.reserve(batch.target_names.len());
        let registry = self.runtime.registry();
        targets.extend(
            batch
                .target_names
                .iter()
                .map(|name| registry.new_local_pid(name.as_str())),
        );

        for envelope in batch.envelopes {
            let target = lookup(targets, envelope.target, "target")?.clone();
            let type_name = lookup(&batch.type_names, envelope.type_id, "type")?;
            let message = self.runtime.serializers().deserialize(
                &envelope.message_data,
                type_name,
                envelope.serializer_id,
            )?;

            if let Some(system) = (*message).as_any().downcast_ref::<SystemMessage>() {
                self.deliver_system(target, system.clone()).await;
                continue;
            }

            let local = MessageEnvelope::from_arc(message)
                .with_header(envelope.header)
                .with_sender(envelope.sender);
            self.runtime.send_user(&target, local).await;
        }
        Ok(())
    }

    async fn deliver_system(&self, target: Pid, message: SystemMessage) {
        let SystemMessage::Terminated(terminated) = message else {
            self.runtime.send_system(&target, message).await;
            return;
        };

        let Some(manager) = self.runtime.endpoint_manager() else {
            warn!(watcher = %target, who = %terminated.who, "terminate received without an endpoint manager");
            self.runtime
                .send_system(&target, SystemMessage::Terminated(terminated))
                .await;
            return;
        };
        let terminate = RemoteTerminate {
            watcher: target,
            watchee: terminated.who,
        };
        if let Err(e) = manager.remote_terminate(terminate).await {
            warn!(error = %e, "remote terminate not forwarded");
        }
    }
}

fn lookup<'a, T>(table: &'a [T], index: u32, name: &'static str) -> Result<&'a T, ReaderError> {
    let index = index as usize;
    table.get(index).ok_or(ReaderError::BadIndex {
        table: name,
        index,
        len: table.len(),
    })
}
