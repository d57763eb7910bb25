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

//! Type aliases shared by the actor runtime.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc::{Sender, UnboundedSender};

use crate::actor::{ManagedActor, Started};
use crate::common::ActorHandle;
use crate::message::{MessageEnvelope, SystemMessage};

/// Handlers registered on an actor, keyed by message `TypeId`.
pub type ReactorMap<ActorEntity> = HashMap<TypeId, ReactorItem<ActorEntity>>;

/// A registered handler.
pub enum ReactorItem<ActorEntity: Default + Send + Debug + 'static> {
    /// Infallible handler.
    Mutable(Box<FutureHandler<ActorEntity>>),
    /// Handler whose future may fail; a failure is reported to the actor's supervisor.
    Fallible(Box<FutureHandlerResult<ActorEntity>>),
}

/// An infallible message handler.
pub type FutureHandler<ManagedEntity> = dyn for<'a, 'b> Fn(
        &'a mut ManagedActor<Started, ManagedEntity>,
        &'b MessageEnvelope,
    ) -> FutureBox
    + Send
    + Sync
    + 'static;

/// A fallible message handler.
pub type FutureHandlerResult<ManagedEntity> = dyn for<'a, 'b> Fn(
        &'a mut ManagedActor<Started, ManagedEntity>,
        &'b MessageEnvelope,
    ) -> FutureBoxResult
    + Send
    + Sync
    + 'static;

/// The future returned by handlers and lifecycle hooks.
pub type FutureBox = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Error type a fallible handler reports to its supervisor.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// The future returned by fallible handlers.
pub type FutureBoxResult = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'static>>;

/// A lifecycle hook (`before_start`, `after_stop`, ...).
pub type AsyncLifecycleHandler<ManagedEntity> =
    Box<dyn Fn(&ManagedActor<Started, ManagedEntity>) -> FutureBox + Send + Sync + 'static>;

/// Builds a fresh model when an actor is restarted.
pub type ModelProducer<ManagedEntity> = Arc<dyn Fn() -> ManagedEntity + Send + Sync + 'static>;

/// Sending half of an actor's user inbox.
pub type ActorSender = Sender<MessageEnvelope>;

/// Sending half of an actor's system inbox.
pub type SystemSender = UnboundedSender<SystemMessage>;

/// Handle to a supervising actor.
pub type ParentRef = ActorHandle;
