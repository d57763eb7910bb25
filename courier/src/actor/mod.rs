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

//! Actor definitions and supervision.
//!
//! A [`ManagedActor`] is configured in the [`Idle`] state and turned into a running
//! [`Started`] actor by `start`. While running it drains its system channel before its
//! user channel, reports handler failures to its parent, and applies its
//! [`SupervisionStrategy`] to failures reported by its own children.

pub use actor_config::ActorConfig;
pub use managed_actor::started::Started;
pub use managed_actor::Idle;
pub use managed_actor::ManagedActor;
pub use restart_limiter::{
    RestartLimitExceeded, RestartLimiter, RestartLimiterConfig, RestartStatistics,
};
pub use restart_policy::{RestartPolicy, TerminationReason};
pub use supervision::{SupervisionDecision, SupervisionStrategy};

mod actor_config;
mod managed_actor;
/// Failure history and restart throttling.
mod restart_limiter;
mod restart_policy;
/// Supervision strategies for managing child restarts.
mod supervision;
