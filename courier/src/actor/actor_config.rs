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

use crate::actor::{RestartLimiterConfig, RestartPolicy, SupervisionStrategy};
use crate::common::{ActorHandle, RegistryError, GENERATED_ID_PREFIX};

/// Construction-time settings for a [`ManagedActor`](crate::actor::ManagedActor).
///
/// A named actor is registered under that name, so the name must be unique in the
/// registry. A child's name is prefixed with its parent's id (`parent/child`). Unnamed
/// actors receive a generated `$N` id; a chosen name may not start with `$`, though its
/// parent's id may.
#[derive(Default, Debug, Clone)]
pub struct ActorConfig {
    name: Option<String>,
    parent: Option<ActorHandle>,
    inbox_capacity: Option<usize>,
    restart_policy: RestartPolicy,
    supervision_strategy: SupervisionStrategy,
    restart_limiter_config: Option<RestartLimiterConfig>,
}

impl ActorConfig {
    /// Creates a configuration for an actor with an optional registry name and parent.
    pub fn new(name: Option<impl Into<String>>, parent: Option<ActorHandle>) -> Self {
        Self {
            name: name.map(Into::into),
            parent,
            ..Self::default()
        }
    }

    /// Shorthand for a named top-level actor.
    pub fn new_with_name(name: impl Into<String>) -> Self {
        Self::new(Some(name), None)
    }

    /// Overrides the default user inbox capacity.
    #[must_use]
    pub const fn with_inbox_capacity(mut self, capacity: usize) -> Self {
        self.inbox_capacity = Some(capacity);
        self
    }

    /// Sets how this actor's supervisor treats its failures.
    #[must_use]
    pub const fn with_restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }

    /// Sets how this actor treats failures of its own children.
    #[must_use]
    pub const fn with_supervision_strategy(mut self, strategy: SupervisionStrategy) -> Self {
        self.supervision_strategy = strategy;
        self
    }

    /// Replaces the configured restart limiter for this actor's children.
    #[must_use]
    pub fn with_restart_limiter(mut self, config: RestartLimiterConfig) -> Self {
        self.restart_limiter_config = Some(config);
        self
    }

    #[must_use]
    pub(crate) fn with_parent(mut self, parent: ActorHandle) -> Self {
        self.parent = Some(parent);
        self
    }

    /// The registry id this configuration asks for, already prefixed by the parent's id.
    pub(crate) fn registry_name(&self) -> Result<Option<String>, RegistryError> {
        let Some(name) = self.name.as_ref() else {
            return Ok(None);
        };
        if name.starts_with(GENERATED_ID_PREFIX) {
            return Err(RegistryError::ReservedName(name.clone()));
        }
        Ok(Some(match &self.parent {
            Some(parent) => format!("{}/{}", parent.pid().id(), name),
            None => name.clone(),
        }))
    }

    #[inline]
    pub(crate) const fn parent(&self) -> Option<&ActorHandle> {
        self.parent.as_ref()
    }

    #[inline]
    pub(crate) const fn inbox_capacity(&self) -> Option<usize> {
        self.inbox_capacity
    }

    #[inline]
    pub(crate) const fn restart_policy(&self) -> RestartPolicy {
        self.restart_policy
    }

    #[inline]
    pub(crate) const fn supervision_strategy(&self) -> SupervisionStrategy {
        self.supervision_strategy
    }

    #[inline]
    pub(crate) const fn restart_limiter_config(&self) -> Option<&RestartLimiterConfig> {
        self.restart_limiter_config.as_ref()
    }
}
