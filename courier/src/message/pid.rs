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

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Address used by every process before the node is bound to a network address.
pub const LOCAL_ADDRESS: &str = "nonhost";

/// Process identifier: the address of the node hosting a process plus its id on that node.
///
/// Two PIDs are equal iff both fields match. A PID is immutable once created; whether it
/// is local or foreign is decided by the [`ProcessRegistry`](crate::common::ProcessRegistry)
/// comparing `address` with the node's own address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pid {
    /// Node address, e.g. `127.0.0.1:8080`, or [`LOCAL_ADDRESS`].
    pub address: String,
    /// Process id, unique on its node.
    pub id: String,
}

impl Pid {
    /// Creates a PID from its two parts.
    pub fn new(address: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            id: id.into(),
        }
    }

    /// Returns the node address.
    #[inline]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the process id.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.id)
    }
}

/// An unordered set of PIDs.
///
/// Keeps a dense vector alongside the membership index so iteration and indexed
/// selection stay cheap. Insertion order is retained for iteration but is not part of
/// the set's identity: equality compares membership only.
#[derive(Debug, Clone, Default)]
pub struct PidSet {
    pids: Vec<Pid>,
    lookup: HashSet<Pid>,
}

impl PidSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `pid`; returns `false` when it was already present.
    pub fn add(&mut self, pid: Pid) -> bool {
        if self.lookup.contains(&pid) {
            return false;
        }
        self.lookup.insert(pid.clone());
        self.pids.push(pid);
        true
    }

    /// Removes `pid`; returns `false` when it was absent.
    pub fn remove(&mut self, pid: &Pid) -> bool {
        if !self.lookup.remove(pid) {
            return false;
        }
        self.pids.retain(|member| member != pid);
        true
    }

    /// Returns `true` if `pid` is a member.
    #[inline]
    pub fn contains(&self, pid: &Pid) -> bool {
        self.lookup.contains(pid)
    }

    /// Number of members.
    #[inline]
    pub fn len(&self) -> usize {
        self.pids.len()
    }

    /// Returns `true` if the set has no members.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    /// Calls `f` with the position and value of every member.
    pub fn for_each(&self, mut f: impl FnMut(usize, &Pid)) {
        for (index, pid) in self.pids.iter().enumerate() {
            f(index, pid);
        }
    }

    /// Snapshot of the members.
    pub fn values(&self) -> Vec<Pid> {
        self.pids.clone()
    }

    /// Member at `index` in the dense view.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Pid> {
        self.pids.get(index)
    }

    /// Iterates over the members.
    pub fn iter(&self) -> impl Iterator<Item = &Pid> {
        self.pids.iter()
    }

    /// Removes every member.
    pub fn clear(&mut self) {
        self.pids.clear();
        self.lookup.clear();
    }
}

impl PartialEq for PidSet {
    fn eq(&self, other: &Self) -> bool {
        self.lookup == other.lookup
    }
}

impl Eq for PidSet {}

impl FromIterator<Pid> for PidSet {
    fn from_iter<I: IntoIterator<Item = Pid>>(iter: I) -> Self {
        let mut set = Self::new();
        for pid in iter {
            set.add(pid);
        }
        set
    }
}

impl<'a> IntoIterator for &'a PidSet {
    type Item = &'a Pid;
    type IntoIter = std::slice::Iter<'a, Pid>;

    fn into_iter(self) -> Self::IntoIter {
        self.pids.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(id: &str) -> Pid {
        Pid::new("node-a", id)
    }

    #[test]
    fn identity_is_address_and_id() {
        assert_eq!(Pid::new("a", "1"), Pid::new("a", "1"));
        assert_ne!(Pid::new("a", "1"), Pid::new("b", "1"));
        assert_ne!(Pid::new("a", "1"), Pid::new("a", "2"));
        assert_eq!(Pid::new("a", "1").to_string(), "a/1");
    }

    #[test]
    fn add_and_remove_are_idempotent() {
        let mut set = PidSet::new();
        assert!(set.add(pid("1")));
        assert!(!set.add(pid("1")));
        assert_eq!(set.len(), 1);

        assert!(!set.remove(&pid("2")));
        assert!(set.remove(&pid("1")));
        assert!(!set.remove(&pid("1")));
        assert!(set.is_empty());
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let left: PidSet = [pid("1"), pid("2"), pid("3")].into_iter().collect();
        let right: PidSet = [pid("3"), pid("1"), pid("2")].into_iter().collect();
        assert_eq!(left, right);
    }

    #[test]
    fn dense_view_tracks_removals() {
        let mut set: PidSet = [pid("1"), pid("2"), pid("3")].into_iter().collect();
        set.remove(&pid("2"));
        assert_eq!(set.values(), vec![pid("1"), pid("3")]);
        assert_eq!(set.get(1), Some(&pid("3")));

        let mut seen = Vec::new();
        set.for_each(|index, member| seen.push((index, member.id.clone())));
        assert_eq!(seen, vec![(0, "1".to_string()), (1, "3".to_string())]);
    }
}
