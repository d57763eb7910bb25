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

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Courier
//!
//! An actor runtime with location-transparent process ids. An actor is addressed by a
//! [`Pid`](message::Pid) whether it lives on this node or another one; the runtime
//! decides per message whether to deliver locally or hand the message to the remoting
//! layer.
//!
//! ## Key Concepts
//!
//! - **Actors (`ManagedActor`)**: user state plus message handlers, built in the `Idle`
//!   state and turned into a running task by `start()`.
//! - **Handles (`ActorHandle`)**: clonable references used to send to, supervise and
//!   stop a local actor.
//! - **Runtime (`ActorRuntime`)**: owns the process registry, the event stream and, once
//!   remoting is started, the endpoint manager. Several runtimes can share a process.
//! - **Supervision**: children report failures to their parent, which restarts or stops
//!   them according to its `SupervisionStrategy` and their `RestartPolicy`.
//! - **Remoting (`Remote`)**: endpoint writers and watchers per remote address, an
//!   endpoint reader for inbound batches, and death-watch that survives losing a node.
//! - **Routers**: round-robin, random and broadcast routing over groups or pools.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! #[courier_message]
//! struct Ping;
//!
//! #[courier_actor]
//! struct Counter {
//!     seen: usize,
//! }
//!
//! let runtime = CourierApp::launch();
//! let mut counter = runtime.new_actor::<Counter>();
//! counter.mutate_on::<Ping>(|actor, _ctx| {
//!     actor.model.seen += 1;
//!     Box::pin(async {})
//! });
//! let handle = counter.start().await;
//! handle.send(Ping).await?;
//! runtime.shutdown_all().await?;
//! ```

/// Actors, lifecycle type-states and supervision.
pub mod actor;

/// Runtime, handles, registry, event stream and configuration.
pub mod common;

/// Process ids and the message taxonomy.
pub mod message;

/// Node-to-node transport and distributed death-watch.
pub mod remote;

/// Routers and routing policies.
pub mod router;

/// Core traits.
pub mod traits;

/// Commonly used items.
pub mod prelude {
    pub use courier_macro::*;

    pub use async_trait::async_trait;

    pub use crate::actor::{
        ActorConfig, Idle, ManagedActor, RestartPolicy, Started, SupervisionStrategy,
    };
    pub use crate::common::{ActorHandle, ActorRuntime, CourierApp, CourierConfig};
    pub use crate::message::{
        AutoReceive, MessageContext, MessageEnvelope, MessageError, Pid, PidSet, SystemMessage,
        Terminated,
    };
    pub use crate::remote::{ChannelNetwork, EndpointManager, EndpointReader, Remote};
    pub use crate::router::{spawn_group, spawn_pool, RouterHandle, RouterKind};
    pub use crate::traits::CourierMessage;
}
