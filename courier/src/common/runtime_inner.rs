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

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::common::{ActorHandle, CourierConfig, EventStream, ProcessRegistry};
use crate::message::Pid;
use crate::remote::{EndpointManager, SerializerRegistry};

/// Shared state behind an [`ActorRuntime`](crate::common::ActorRuntime).
pub struct RuntimeInner {
    pub(crate) registry: ProcessRegistry,
    pub(crate) event_stream: EventStream,
    pub(crate) serializers: SerializerRegistry,
    pub(crate) roots: DashMap<Pid, ActorHandle>,
    pub(crate) cancellation_token: CancellationToken,
    pub(crate) config: CourierConfig,
    pub(crate) endpoint_manager: RwLock<Option<EndpointManager>>,
}

impl fmt::Debug for RuntimeInner {
    // The endpoint manager points back at the runtime, so only its presence is shown.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeInner")
            .field("address", &self.registry.address())
            .field("processes", &self.registry.len())
            .field("roots", &self.roots.len())
            .field("event_stream", &self.event_stream)
            .field("cancelled", &self.cancellation_token.is_cancelled())
            .field("remoting", &self.endpoint_manager.read().is_some())
            .finish_non_exhaustive()
    }
}

impl RuntimeInner {
    pub(crate) fn new(config: CourierConfig) -> Self {
        Self {
            registry: ProcessRegistry::default(),
            event_stream: EventStream::default(),
            serializers: SerializerRegistry::with_defaults(),
            roots: DashMap::new(),
            cancellation_token: CancellationToken::new(),
            config,
            endpoint_manager: RwLock::new(None),
        }
    }
}
