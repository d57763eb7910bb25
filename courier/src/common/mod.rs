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

//! Runtime plumbing shared by actors, remoting and routers.
//!
//! * [`CourierApp`] launches an [`ActorRuntime`].
//! * [`ActorHandle`] is how running actors are addressed locally.
//! * [`ProcessRegistry`] resolves pids; [`EventStream`] is the process-wide event bus.
//! * [`CourierConfig`] holds every tunable.

pub use actor_handle::ActorHandle;
pub use actor_runtime::ActorRuntime;
pub use config::CourierConfig;
pub use courier_app::CourierApp;
pub use event_stream::{EventStream, Subscription};
pub use process_registry::{
    FutureProcess, ProcessRef, ProcessRegistry, RegistryError, GENERATED_ID_PREFIX,
};
pub use types::*;

mod types;

mod actor_handle;
mod actor_runtime;
/// Runtime configuration loaded from XDG locations.
pub mod config;
mod courier_app;
mod event_stream;
mod process_registry;
pub(crate) mod runtime_inner;
