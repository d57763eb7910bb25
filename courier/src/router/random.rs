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

use rand::Rng;

use crate::message::{Pid, PidSet};
use crate::router::state::{RouteeList, RouterState};

/// Picks a routee uniformly at random for every message.
#[derive(Debug, Default)]
pub struct RandomState {
    routees: RouteeList,
}

impl RouterState for RandomState {
    fn set_routees(&self, routees: &PidSet) {
        self.routees.set(routees);
    }

    fn routees(&self) -> PidSet {
        self.routees.snapshot()
    }

    fn select(&self) -> Vec<Pid> {
        self.routees
            .pick(|len| rand::rng().random_range(0..len))
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_only_members() {
        let state = RandomState::default();
        let routees: PidSet = (0..5).map(|i| Pid::new("nonhost", format!("r{i}"))).collect();
        state.set_routees(&routees);

        for _ in 0..100 {
            let picked = state.select();
            assert_eq!(picked.len(), 1);
            assert!(routees.contains(&picked[0]));
        }
    }
}
