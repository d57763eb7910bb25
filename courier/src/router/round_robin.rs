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

use std::sync::atomic::{AtomicI32, Ordering};

use crate::message::{Pid, PidSet};
use crate::router::state::{RouteeList, RouterState};

/// Cycles through the routees.
///
/// The cursor is shared by every task routing through this state. Membership changes
/// shift the cycle because the index is taken modulo the live routee count.
#[derive(Debug, Default)]
pub struct RoundRobinState {
    cursor: AtomicI32,
    routees: RouteeList,
}

impl RouterState for RoundRobinState {
    fn set_routees(&self, routees: &PidSet) {
        self.routees.set(routees);
    }

    fn routees(&self) -> PidSet {
        self.routees.snapshot()
    }

    fn select(&self) -> Vec<Pid> {
        self.routees
            .pick(|len| next_index(&self.cursor, len))
            .into_iter()
            .collect()
    }
}

/// Advances `cursor` and maps it onto `0..len`. A cursor that wrapped negative is reset
/// to zero.
pub(crate) fn next_index(cursor: &AtomicI32, len: usize) -> usize {
    let mut index = cursor.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
    if index < 0 {
        cursor.store(0, Ordering::SeqCst);
        index = 0;
    }
    usize::try_from(index).unwrap_or_default() % len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_picks_visit_every_routee_once() {
        let cursor = AtomicI32::new(0);
        let picks: Vec<usize> = (0..4).map(|_| next_index(&cursor, 4)).collect();
        assert_eq!(picks, vec![1, 2, 3, 0]);
    }

    #[test]
    fn overflow_resumes_at_zero() {
        let cursor = AtomicI32::new(i32::MAX - 1);
        let last = next_index(&cursor, 3);
        assert_eq!(last, (i32::MAX as usize) % 3);

        assert_eq!(next_index(&cursor, 3), 0);
        assert_eq!(cursor.load(Ordering::SeqCst), 0);
        assert_eq!(next_index(&cursor, 3), 1);
    }

    #[test]
    fn state_cycles_in_membership_order() {
        let state = RoundRobinState::default();
        let routees: PidSet = ["a", "b", "c"]
            .into_iter()
            .map(|id| Pid::new("nonhost", id))
            .collect();
        state.set_routees(&routees);

        let picks: Vec<String> = (0..3)
            .flat_map(|_| state.select())
            .map(|pid| pid.id().to_string())
            .collect();
        assert_eq!(picks, vec!["b", "c", "a"]);
    }

    #[test]
    fn empty_state_selects_nothing() {
        let state = RoundRobinState::default();
        assert!(state.select().is_empty());
    }
}
