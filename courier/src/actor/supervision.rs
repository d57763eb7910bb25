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

//! Supervision strategies.
//!
//! When a child reports a [`Failure`](crate::message::Failure) its supervisor combines its
//! own [`SupervisionStrategy`] with the child's [`RestartPolicy`] to pick a
//! [`SupervisionDecision`]. The restart limiter runs first and turns a child that fails
//! too often into an escalation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::actor::{RestartPolicy, TerminationReason};

/// Which children a supervisor rebuilds when one of them fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SupervisionStrategy {
    /// Restart only the failed child.
    #[default]
    OneForOne,
    /// Restart every child.
    OneForAll,
    /// Restart the failed child and every child started after it.
    RestForOne,
}

/// What a supervisor does about a failed child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisionDecision {
    /// Restart only the failed child.
    RestartChild,
    /// Restart all children.
    RestartAll,
    /// Restart children from this start-order index onwards.
    RestartFrom(usize),
    /// Stop the child.
    NoRestart,
    /// Stop the child and report the failure to the supervisor's own parent.
    Escalate,
}

impl SupervisionStrategy {
    /// Picks a decision for the child at `child_index` (start order) that failed for `reason`.
    #[must_use]
    pub const fn decide(
        &self,
        policy: RestartPolicy,
        reason: &TerminationReason,
        child_index: usize,
    ) -> SupervisionDecision {
        if !policy.should_restart(reason) {
            return SupervisionDecision::NoRestart;
        }

        match self {
            Self::OneForOne => SupervisionDecision::RestartChild,
            Self::OneForAll => SupervisionDecision::RestartAll,
            Self::RestForOne => SupervisionDecision::RestartFrom(child_index),
        }
    }

    /// `true` when a single failure can restart more than one child.
    #[must_use]
    pub const fn requires_group_restart(&self) -> bool {
        matches!(self, Self::OneForAll | Self::RestForOne)
    }
}

impl fmt::Display for SupervisionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneForOne => write!(f, "one_for_one"),
            Self::OneForAll => write!(f, "one_for_all"),
            Self::RestForOne => write!(f, "rest_for_one"),
        }
    }
}

impl fmt::Display for SupervisionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RestartChild => write!(f, "restart child"),
            Self::RestartAll => write!(f, "restart all children"),
            Self::RestartFrom(idx) => write!(f, "restart from child index {idx}"),
            Self::NoRestart => write!(f, "no restart"),
            Self::Escalate => write!(f, "escalate to parent"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panic_reason() -> TerminationReason {
        TerminationReason::Panic("test".into())
    }

    #[test]
    fn strategies_map_to_their_decisions() {
        let policy = RestartPolicy::Permanent;
        assert_eq!(
            SupervisionStrategy::OneForOne.decide(policy, &panic_reason(), 0),
            SupervisionDecision::RestartChild
        );
        assert_eq!(
            SupervisionStrategy::OneForAll.decide(policy, &panic_reason(), 0),
            SupervisionDecision::RestartAll
        );
        assert_eq!(
            SupervisionStrategy::RestForOne.decide(policy, &panic_reason(), 2),
            SupervisionDecision::RestartFrom(2)
        );
    }

    #[test]
    fn temporary_policy_prevents_restart_for_all_strategies() {
        for strategy in [
            SupervisionStrategy::OneForOne,
            SupervisionStrategy::OneForAll,
            SupervisionStrategy::RestForOne,
        ] {
            let decision = strategy.decide(RestartPolicy::Temporary, &panic_reason(), 0);
            assert_eq!(decision, SupervisionDecision::NoRestart);
        }
    }

    #[test]
    fn transient_child_stopping_normally_is_left_alone() {
        let decision = SupervisionStrategy::OneForOne.decide(
            RestartPolicy::Transient,
            &TerminationReason::Normal,
            0,
        );
        assert_eq!(decision, SupervisionDecision::NoRestart);
    }

    #[test]
    fn group_restart_flags() {
        assert!(!SupervisionStrategy::OneForOne.requires_group_restart());
        assert!(SupervisionStrategy::OneForAll.requires_group_restart());
        assert!(SupervisionStrategy::RestForOne.requires_group_restart());
    }
}
