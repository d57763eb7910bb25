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

//! The transport contract consumed by the remoting layer.
//!
//! Outbound traffic goes through a [`BatchSink`] obtained from a [`RemoteTransport`];
//! inbound traffic arrives at an [`EndpointReader`] as a [`BatchStream`]. The in-memory
//! [`ChannelNetwork`] implements both ends with tokio channels so several runtimes in
//! one process can talk to each other.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::remote::wire::{ConnectRequest, MessageBatch};
use crate::remote::{EndpointReader, TransportError};

/// Server-streaming side of a connection: yields batches until the peer goes away.
#[async_trait]
pub trait BatchStream: Send {
    /// The next batch, `None` when the stream closed cleanly.
    async fn next_batch(&mut self) -> Option<Result<MessageBatch, TransportError>>;
}

/// Client side of a connection.
#[async_trait]
pub trait BatchSink: Send + Sync + Debug {
    /// Sends one batch.
    async fn send_batch(&self, batch: MessageBatch) -> Result<(), TransportError>;
}

/// Dials remote nodes.
#[async_trait]
pub trait RemoteTransport: Send + Sync + Debug {
    /// Opens a connection to `address`.
    async fn connect(&self, address: &str) -> Result<Arc<dyn BatchSink>, TransportError>;
}

/// A [`BatchStream`] fed by a tokio channel.
#[derive(Debug)]
pub struct ChannelBatchStream {
    receiver: Receiver<MessageBatch>,
    shutdown: CancellationToken,
}

impl ChannelBatchStream {
    /// Wraps the receiving half of a batch channel.
    pub fn new(receiver: Receiver<MessageBatch>) -> Self {
        Self::with_shutdown(receiver, CancellationToken::new())
    }

    /// Wraps a receiver and fails the stream once `shutdown` is cancelled.
    pub fn with_shutdown(receiver: Receiver<MessageBatch>, shutdown: CancellationToken) -> Self {
        Self { receiver, shutdown }
    }
}

#[async_trait]
impl BatchStream for ChannelBatchStream {
    async fn next_batch(&mut self) -> Option<Result<MessageBatch, TransportError>> {
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => Some(Err(TransportError::Closed("listener unbound".into()))),
            batch = self.receiver.recv() => batch.map(Ok),
        }
    }
}

#[derive(Debug)]
struct ChannelSink {
    address: String,
    sender: Sender<MessageBatch>,
}

#[async_trait]
impl BatchSink for ChannelSink {
    async fn send_batch(&self, batch: MessageBatch) -> Result<(), TransportError> {
        self.sender
            .send(batch)
            .await
            .map_err(|_| TransportError::Closed(self.address.clone()))
    }
}

#[derive(Debug, Clone)]
struct Listener {
    reader: EndpointReader,
    shutdown: CancellationToken,
}

/// An in-process network of listening readers, keyed by address.
#[derive(Debug, Clone, Default)]
pub struct ChannelNetwork {
    listeners: Arc<DashMap<String, Listener>>,
}

impl ChannelNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that dials through this network on behalf of `local_address`.
    pub fn transport(&self, local_address: impl Into<String>) -> Arc<dyn RemoteTransport> {
        Arc::new(ChannelTransport {
            network: self.clone(),
            local_address: local_address.into(),
        })
    }

    /// Makes `reader` reachable at `address`, replacing any previous listener.
    pub fn listen(&self, address: impl Into<String>, reader: EndpointReader) {
        let address = address.into();
        trace!(address = %address, "listening");
        if let Some(previous) = self.listeners.insert(
            address,
            Listener {
                reader,
                shutdown: CancellationToken::new(),
            },
        ) {
            previous.shutdown.cancel();
        }
    }

    /// Takes `address` off the network and fails every stream it accepted.
    pub fn unbind(&self, address: &str) -> bool {
        let Some((_, listener)) = self.listeners.remove(address) else {
            return false;
        };
        debug!(address = %address, "listener unbound");
        listener.shutdown.cancel();
        true
    }

    /// `true` if something listens at `address`.
    pub fn is_listening(&self, address: &str) -> bool {
        self.listeners.contains_key(address)
    }
}

/// [`RemoteTransport`] over a [`ChannelNetwork`].
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    network: ChannelNetwork,
    local_address: String,
}

#[async_trait]
impl RemoteTransport for ChannelTransport {
    async fn connect(&self, address: &str) -> Result<Arc<dyn BatchSink>, TransportError> {
        let listener = self
            .network
            .listeners
            .get(address)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TransportError::Unreachable(address.to_string()))?;

        let request = ConnectRequest {
            address: self.local_address.clone(),
        };
        let response = listener
            .reader
            .connect(&request)
            .map_err(|e| TransportError::Rejected {
                address: address.to_string(),
                reason: e.to_string(),
            })?;
        trace!(address = %address, serializer = response.default_serializer_id, "connected");

        let capacity = listener
            .reader
            .runtime()
            .config()
            .limits
            .transport_channel_capacity;
        let (sender, receiver) = channel(capacity);
        let stream = ChannelBatchStream::with_shutdown(receiver, listener.shutdown.child_token());
        let reader = listener.reader.clone();
        let peer = self.local_address.clone();
        tokio::spawn(async move {
            if let Err(e) = reader.receive(stream).await {
                error!(peer = %peer, error = %e, "inbound stream ended with an error");
            }
        });

        Ok(Arc::new(ChannelSink {
            address: address.to_string(),
            sender,
        }))
    }
}
