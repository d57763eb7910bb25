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

//! Node-to-node messaging and distributed death-watch.
//!
//! A node that starts remoting gets an address, an [`EndpointManager`] for outbound
//! traffic and an [`EndpointReader`] for inbound traffic. From then on the runtime
//! routes every foreign pid through the manager:
//!
//! * user messages become [`RemoteDeliver`] and go to the address's writer,
//! * `Watch`/`Unwatch` become [`RemoteWatch`]/[`RemoteUnwatch`] and go to its watcher,
//! * other system messages are delivered like user messages.
//!
//! Message types that cross the wire must be registered with the runtime's
//! [`SerializerRegistry`].

use std::sync::Arc;

use tracing::{info, instrument};

use crate::common::ActorRuntime;

pub use endpoint_manager::EndpointManager;
pub use endpoint_reader::EndpointReader;
pub use endpoint_watcher::{WatchTable, WatcherEffect, WatcherFsm, WatcherInput, WatcherState};
pub use error::{EndpointError, ReaderError, SerializerError, TransportError};
pub use messages::{
    Endpoint, EndpointConnectedEvent, EndpointTerminatedEvent, RemoteDeliver, RemoteTerminate,
    RemoteUnwatch, RemoteWatch,
};
pub use serializer::{SerializerRegistry, JSON_SERIALIZER_ID, MSGPACK_SERIALIZER_ID};
pub use transport::{
    BatchSink, BatchStream, ChannelBatchStream, ChannelNetwork, ChannelTransport,
    RemoteTransport,
};
pub use wire::{ConnectRequest, ConnectResponse, MessageBatch, WireEnvelope};

pub(crate) mod endpoint_manager;
mod endpoint_reader;
mod endpoint_watcher;
mod endpoint_writer;
mod error;
pub(crate) mod messages;
mod serializer;
mod transport;
mod wire;

/// Entry points for turning a runtime into a networked node.
#[derive(Debug, Clone, Copy)]
pub struct Remote;

impl Remote {
    /// Binds `runtime` to `address` and starts the endpoint manager over `transport`.
    ///
    /// Returns the manager and the reader that should be handed to whatever accepts
    /// inbound connections (for [`ChannelNetwork`], pass it to
    /// [`ChannelNetwork::listen`]). Actors spawned before this call keep the
    /// placeholder address; their pids are qualified when they leave the node.
    #[instrument(skip(runtime, transport))]
    pub async fn start(
        runtime: &ActorRuntime,
        address: impl Into<String> + std::fmt::Debug,
        transport: Arc<dyn RemoteTransport>,
    ) -> anyhow::Result<(EndpointManager, EndpointReader)> {
        let address = address.into();
        runtime.registry().set_address(address.clone());
        let manager = EndpointManager::start(runtime, transport).await?;
        runtime.set_endpoint_manager(Some(manager.clone()));
        info!(address = %address, "remoting started");
        Ok((manager, EndpointReader::new(runtime.clone())))
    }

    /// Stops the endpoint manager and detaches it from `runtime`.
    pub async fn shutdown(runtime: &ActorRuntime) -> anyhow::Result<()> {
        if let Some(manager) = runtime.endpoint_manager() {
            runtime.set_endpoint_manager(None);
            manager.stop().await?;
        }
        Ok(())
    }
}
