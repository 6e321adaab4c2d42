//! Host registry
//!
//! Pure bookkeeping, no I/O. The service wraps it in a lock and performs
//! network calls outside that lock.

use std::collections::BTreeMap;

use super::host::{HostKey, HostNode, HostState};

/// Outcome of [`HostRegistry::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// The key was not present.
    Inserted,
    /// The record carried a newer heartbeat and replaced the stored one.
    Updated,
    /// The record was not newer; the stored one is kept.
    Stale,
}

/// Hosts keyed by host key, including the local host.
#[derive(Debug, Clone)]
pub struct HostRegistry {
    self_key: HostKey,
    hosts: BTreeMap<HostKey, HostNode>,
}

impl HostRegistry {
    /// Registry seeded with the local host, which is always `Known`.
    pub fn new(mut local: HostNode) -> Self {
        local.state = HostState::Known;
        let self_key = local.key.clone();
        let mut hosts = BTreeMap::new();
        hosts.insert(self_key.clone(), local);
        Self { self_key, hosts }
    }

    pub fn self_key(&self) -> &HostKey {
        &self.self_key
    }

    pub fn local(&self) -> Option<&HostNode> {
        self.hosts.get(&self.self_key)
    }

    /// Insert, or replace when the incoming heartbeat is strictly newer.
    /// A replacement keeps the locally observed liveness state.
    pub fn upsert(&mut self, node: HostNode) -> Upsert {
        match self.hosts.get_mut(&node.key) {
            None => {
                self.hosts.insert(node.key.clone(), node);
                Upsert::Inserted
            }
            Some(existing) if node.heartbeat > existing.heartbeat => {
                let state = existing.state;
                *existing = HostNode { state, ..node };
                Upsert::Updated
            }
            Some(_) => Upsert::Stale,
        }
    }

    /// Returns the previous state, or `None` when the host is unknown.
    pub fn set_state(&mut self, key: &HostKey, state: HostState) -> Option<HostState> {
        let node = self.hosts.get_mut(key)?;
        Some(std::mem::replace(&mut node.state, state))
    }

    /// The local host cannot be removed.
    pub fn remove(&mut self, key: &HostKey) -> Option<HostNode> {
        if key == &self.self_key {
            return None;
        }
        self.hosts.remove(key)
    }

    pub fn get(&self, key: &HostKey) -> Option<&HostNode> {
        self.hosts.get(key)
    }

    pub fn contains(&self, key: &HostKey) -> bool {
        self.hosts.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn snapshot(&self) -> Vec<HostNode> {
        self.hosts.values().cloned().collect()
    }

    /// Peers only, excluding the local host.
    pub fn peers(&self) -> Vec<HostNode> {
        self.hosts
            .values()
            .filter(|n| n.key != self.self_key)
            .cloned()
            .collect()
    }

    pub fn in_state(&self, state: HostState) -> Vec<HostNode> {
        self.hosts
            .values()
            .filter(|n| n.state == state)
            .cloned()
            .collect()
    }
}
