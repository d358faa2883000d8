use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::identity::Identity;
use crate::types::{Capability, ContainerDescriptor, ContainerId};

/// A container's descriptor plus the logical identity it's currently bound
/// to.
#[derive(Debug, Clone)]
pub struct ContainerBinding {
    pub descriptor: ContainerDescriptor,
    pub identity: Identity,
}

/// The live container-id → (descriptor, identity) map. Shared among the RM
/// callback path, the NM callback path, and the launch-pool tasks; all
/// operations are lock-free reads/writes through `DashMap`.
#[derive(Default)]
pub struct ContainerRecord(DashMap<ContainerId, ContainerBinding>);

impl ContainerRecord {
    pub fn new() -> Self {
        Self(DashMap::new())
    }

    /// Insert a binding *before* the asynchronous start is dispatched, so
    /// an early completion callback always finds the record (spec.md §4.1
    /// rule 2).
    pub fn insert(&self, container_id: ContainerId, binding: ContainerBinding) {
        self.0.insert(container_id, binding);
    }

    /// Remove a binding. Returns `None` if already removed: the first
    /// observer of a completion wins, the second is a no-op (spec.md
    /// §4.3, §9).
    pub fn remove(&self, container_id: &ContainerId) -> Option<ContainerBinding> {
        self.0.remove(container_id).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Snapshot of every currently-bound descriptor, for dispatching stop
    /// requests during shutdown.
    pub fn descriptors(&self) -> Vec<ContainerDescriptor> {
        self.0.iter().map(|entry| entry.value().descriptor.clone()).collect()
    }
}

/// Per-identity retry counts. Survives identity recycling; only reset by
/// restarting the supervisor.
#[derive(Default)]
pub struct RetryCounters(DashMap<Identity, AtomicU32>);

impl RetryCounters {
    pub fn new() -> Self {
        Self(DashMap::new())
    }

    /// Atomically get-or-create then increment, so two completions for the
    /// same identity always observe distinct post-increment values (spec.md
    /// §9's `putIfAbsent` fix).
    pub fn record_retry(&self, identity: &Identity) -> u32 {
        let counter = self.0.entry(identity.clone()).or_insert_with(|| AtomicU32::new(0));
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn get(&self, identity: &Identity) -> u32 {
        self.0.get(identity).map(|c| c.load(Ordering::SeqCst)).unwrap_or(0)
    }
}

/// The cluster's maximum capability, write-once by the registration path
/// and read everywhere else. The `RwLock` acts as the release fence.
#[derive(Default)]
pub struct CapabilitySnapshot(RwLock<Option<Capability>>);

impl CapabilitySnapshot {
    pub fn new() -> Self {
        Self(RwLock::new(None))
    }

    pub fn set(&self, capability: Capability) {
        *self.0.write() = Some(capability);
    }

    pub fn get(&self) -> Option<Capability> {
        *self.0.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContainerId;

    fn binding(host: &str) -> ContainerBinding {
        ContainerBinding {
            descriptor: ContainerDescriptor {
                container_id: ContainerId::from("c1"),
                node_host: host.to_string(),
                node_port: 1,
                capability: Capability::new(1024, 1),
                priority: 0,
            },
            identity: Identity::new("w", 1),
        }
    }

    #[test]
    fn second_removal_of_the_same_container_is_a_no_op() {
        let record = ContainerRecord::new();
        let id = ContainerId::from("c1");
        record.insert(id.clone(), binding("h1"));

        assert!(record.remove(&id).is_some());
        assert!(record.remove(&id).is_none());
    }

    #[test]
    fn retry_counter_starts_at_one_on_first_record() {
        let retries = RetryCounters::new();
        let identity = Identity::new("w", 1);
        assert_eq!(retries.record_retry(&identity), 1);
        assert_eq!(retries.record_retry(&identity), 2);
        assert_eq!(retries.get(&identity), 2);
    }

    #[test]
    fn capability_snapshot_is_absent_until_set() {
        let snapshot = CapabilitySnapshot::new();
        assert!(snapshot.get().is_none());
        snapshot.set(Capability::new(8192, 8));
        assert_eq!(snapshot.get(), Some(Capability::new(8192, 8)));
    }
}
