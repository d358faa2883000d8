use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::protocol::{ResourceManagerError, ResourceManagerProtocol, RmEvent};
use crate::types::{Capability, ContainerDescriptor, ContainerId, ExitStatus, FinalStatus};

/// An in-memory resource manager used by the supervisor's own tests. Tests
/// drive allocation/completion by calling `allocate`/`complete` directly
/// instead of waiting on a real heartbeat cadence.
pub struct FakeResourceManager {
    sender: broadcast::Sender<RmEvent>,
    max_capability: Capability,
    requests: Mutex<Vec<(Capability, Vec<String>, i32)>>,
    unregistered: Mutex<Option<FinalStatus>>,
}

impl FakeResourceManager {
    pub fn new(max_capability: Capability) -> Self {
        let (sender, _rx) = broadcast::channel(256);
        Self {
            sender,
            max_capability,
            requests: Mutex::new(Vec::new()),
            unregistered: Mutex::new(None),
        }
    }

    pub fn requests(&self) -> Vec<(Capability, Vec<String>, i32)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn unregistered_with(&self) -> Option<FinalStatus> {
        *self.unregistered.lock().unwrap()
    }

    /// Simulate the resource manager allocating `descriptors`.
    pub fn allocate(&self, descriptors: Vec<ContainerDescriptor>) {
        let _ = self.sender.send(RmEvent::ContainersAllocated(descriptors));
    }

    /// Simulate a container completing with `status`.
    pub fn complete(&self, container_id: ContainerId, status: ExitStatus) {
        let _ = self
            .sender
            .send(RmEvent::ContainersCompleted(vec![(container_id, status)]));
    }

    pub fn shutdown(&self) {
        let _ = self.sender.send(RmEvent::ShutdownRequested);
    }
}

#[async_trait]
impl ResourceManagerProtocol for FakeResourceManager {
    async fn start(&self) -> Result<(), ResourceManagerError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), ResourceManagerError> {
        Ok(())
    }

    async fn register(
        &self,
        _host: &str,
        _rpc_port: i32,
        _tracking_url: &str,
    ) -> Result<Capability, ResourceManagerError> {
        Ok(self.max_capability)
    }

    async fn request(
        &self,
        capability: Capability,
        preferred_nodes: Vec<String>,
        priority: i32,
    ) -> Result<(), ResourceManagerError> {
        self.requests.lock().unwrap().push((capability, preferred_nodes, priority));
        Ok(())
    }

    async fn unregister(
        &self,
        final_status: FinalStatus,
        _diagnostics: &str,
        _tracking_url: &str,
    ) -> Result<(), ResourceManagerError> {
        *self.unregistered.lock().unwrap() = Some(final_status);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<RmEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Capability;

    #[tokio::test]
    async fn register_returns_the_configured_max_capability() {
        let fake = FakeResourceManager::new(Capability::new(8192, 8));
        let cap = fake.register("host1", -1, "").await.unwrap();
        assert_eq!(cap, Capability::new(8192, 8));
    }

    #[tokio::test]
    async fn allocate_is_observed_by_subscribers() {
        let fake = FakeResourceManager::new(Capability::new(8192, 8));
        let mut rx = fake.subscribe();

        fake.allocate(vec![]);
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, RmEvent::ContainersAllocated(_)));
    }
}
