//! Liveness registry - which windows the launcher believes are alive.
//!
//! One entry per role with the latest time that role was seen. Updates are a
//! commutative fold: `last_seen` only ever moves forward, so duplicated or
//! reordered ready/heartbeat messages can't roll an entry back.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::protocol::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub role: Role,
    /// Epoch milliseconds.
    pub last_seen: i64,
}

/// What an observation did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The role had no entry; one was created.
    New,
    /// The entry moved forward to the observed time.
    Refreshed,
    /// The observed time was not newer; the entry is unchanged.
    Unchanged,
}

#[derive(Debug, Default, Clone)]
pub struct LivenessRegistry {
    entries: BTreeMap<Role, i64>,
}

impl LivenessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `role` was seen at `seen_at`.
    pub fn observe(&mut self, role: Role, seen_at: i64) -> Observation {
        match self.entries.get_mut(&role) {
            None => {
                self.entries.insert(role, seen_at);
                Observation::New
            }
            Some(last_seen) if seen_at > *last_seen => {
                *last_seen = seen_at;
                Observation::Refreshed
            }
            Some(_) => Observation::Unchanged,
        }
    }

    pub fn remove(&mut self, role: Role) -> Option<RegistryEntry> {
        self.entries
            .remove(&role)
            .map(|last_seen| RegistryEntry { role, last_seen })
    }

    /// Drop every entry not seen for more than `threshold_ms` and return them.
    pub fn evict_stale(&mut self, now: i64, threshold_ms: i64) -> Vec<RegistryEntry> {
        let stale: Vec<RegistryEntry> = self
            .entries
            .iter()
            .filter(|(_, last_seen)| now.saturating_sub(**last_seen) > threshold_ms)
            .map(|(role, last_seen)| RegistryEntry {
                role: *role,
                last_seen: *last_seen,
            })
            .collect();

        for entry in &stale {
            self.entries.remove(&entry.role);
        }
        stale
    }

    pub fn get(&self, role: Role) -> Option<RegistryEntry> {
        self.entries
            .get(&role)
            .map(|last_seen| RegistryEntry {
                role,
                last_seen: *last_seen,
            })
    }

    pub fn is_alive(&self, role: Role) -> bool {
        self.entries.contains_key(&role)
    }

    /// Snapshot of all entries, ordered by role.
    pub fn entries(&self) -> Vec<RegistryEntry> {
        self.entries
            .iter()
            .map(|(role, last_seen)| RegistryEntry {
                role: *role,
                last_seen: *last_seen,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
