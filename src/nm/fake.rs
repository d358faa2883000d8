use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::protocol::{NmEvent, NodeManagerError, NodeManagerProtocol, RunState};
use crate::launch::LaunchContext;
use crate::types::ContainerDescriptor;

/// An in-memory node manager for the supervisor's own tests. `start_container`
/// immediately records the call and, unless told to fail, delivers
/// `Started`; tests drive `stopped`/`complete` explicitly to simulate the
/// node-manager callbacks spec.md §4.3 describes.
#[derive(Default)]
pub struct FakeNodeManager {
    sender_slot: Mutex<Option<broadcast::Sender<NmEvent>>>,
    started: Mutex<Vec<String>>,
    stopped: Mutex<Vec<String>>,
    fail_start: Mutex<bool>,
}

impl FakeNodeManager {
    pub fn new() -> Self {
        let (sender, _rx) = broadcast::channel(256);
        Self {
            sender_slot: Mutex::new(Some(sender)),
            started: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
            fail_start: Mutex::new(false),
        }
    }

    fn sender(&self) -> broadcast::Sender<NmEvent> {
        self.sender_slot.lock().unwrap().clone().expect("fake node manager not started")
    }

    pub fn set_fail_start(&self, fail: bool) {
        *self.fail_start.lock().unwrap() = fail;
    }

    pub fn started_containers(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn stopped_containers(&self) -> Vec<String> {
        self.stopped.lock().unwrap().clone()
    }

    /// Simulate a status callback reporting `COMPLETE` for `container_id`.
    pub fn report_complete(&self, container_id: &str) {
        let _ = self.sender().send(NmEvent::StatusReceived {
            container_id: container_id.to_string(),
            state: RunState::Complete,
        });
    }

    /// Simulate `onContainerStopped`.
    pub fn report_stopped(&self, container_id: &str) {
        let _ = self.sender().send(NmEvent::Stopped { container_id: container_id.to_string() });
    }
}

#[async_trait]
impl NodeManagerProtocol for FakeNodeManager {
    async fn start(&self) -> Result<(), NodeManagerError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), NodeManagerError> {
        Ok(())
    }

    async fn start_container(
        &self,
        descriptor: &ContainerDescriptor,
        _launch_context: &LaunchContext,
    ) -> Result<(), NodeManagerError> {
        let container_id = descriptor.container_id.to_string();
        self.started.lock().unwrap().push(container_id.clone());

        if *self.fail_start.lock().unwrap() {
            let _ = self
                .sender()
                .send(NmEvent::StartError { container_id, message: "simulated start failure".into() });
        } else {
            let _ = self.sender().send(NmEvent::Started { container_id });
        }
        Ok(())
    }

    async fn stop_container(
        &self,
        container_id: &str,
        _node_host: &str,
        _node_port: u32,
    ) -> Result<(), NodeManagerError> {
        self.stopped.lock().unwrap().push(container_id.to_string());
        Ok(())
    }

    async fn status(
        &self,
        _container_id: &str,
        _node_host: &str,
        _node_port: u32,
    ) -> Result<(), NodeManagerError> {
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<NmEvent> {
        self.sender().subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Capability, ContainerId};

    fn descriptor() -> ContainerDescriptor {
        ContainerDescriptor {
            container_id: ContainerId::from("c1"),
            node_host: "h1".to_string(),
            node_port: 1,
            capability: Capability::new(512, 1),
            priority: 0,
        }
    }

    #[tokio::test]
    async fn start_container_records_the_call_and_emits_started() {
        let nm = FakeNodeManager::new();
        let mut rx = nm.subscribe();
        let ctx = LaunchContext {
            local_resources: Default::default(),
            env: Default::default(),
            command: "true".into(),
            stdout_path: "/tmp/out".into(),
            stderr_path: "/tmp/err".into(),
            credentials: None,
        };

        nm.start_container(&descriptor(), &ctx).await.unwrap();
        assert_eq!(nm.started_containers(), vec!["c1".to_string()]);
        assert!(matches!(rx.recv().await.unwrap(), NmEvent::Started { .. }));
    }
}
