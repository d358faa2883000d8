use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions,
};
use bollard::Docker;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use super::protocol::{NmEvent, NodeManagerError, NodeManagerProtocol, RunState};
use crate::launch::LaunchContext;
use crate::types::ContainerDescriptor;

/// A node-manager client that realizes "a node-scoped execution slot with
/// a fixed capability" as one Docker container per supervised
/// container-id. A reasonable stand-in for a real YARN node manager in a
/// development or test cluster running under the Docker container
/// executor.
pub struct DockerNodeManagerClient {
    client: Docker,
    sender: broadcast::Sender<NmEvent>,
}

impl DockerNodeManagerClient {
    pub fn new() -> Result<Self, NodeManagerError> {
        let client = Docker::connect_with_local_defaults().map_err(NodeManagerError::Docker)?;
        let (sender, _rx) = broadcast::channel(256);
        Ok(Self { client, sender })
    }

    fn container_name(container_id: &str) -> String {
        format!("supervisor_{container_id}")
    }
}

#[async_trait]
impl NodeManagerProtocol for DockerNodeManagerClient {
    async fn start(&self) -> Result<(), NodeManagerError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), NodeManagerError> {
        Ok(())
    }

    async fn start_container(
        &self,
        descriptor: &ContainerDescriptor,
        launch_context: &LaunchContext,
    ) -> Result<(), NodeManagerError> {
        let name = Self::container_name(&descriptor.container_id.to_string());
        let env: Vec<String> = launch_context
            .env
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();

        let config = Config {
            image: Some("cluster-worker:latest".to_string()),
            cmd: Some(vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                launch_context.command.clone(),
            ]),
            env: Some(env),
            ..Default::default()
        };

        let options = CreateContainerOptions { name: name.clone(), platform: None };

        let container_id = descriptor.container_id.to_string();
        match self.client.create_container(Some(options), config).await {
            Ok(_) => {}
            Err(e) => {
                warn!(%container_id, %e, "failed to create worker container");
                let _ = self.sender.send(NmEvent::StartError {
                    container_id,
                    message: e.to_string(),
                });
                return Ok(());
            }
        }

        match self
            .client
            .start_container(&name, None::<StartContainerOptions<String>>)
            .await
        {
            Ok(()) => {
                info!(container_id = %descriptor.container_id, "worker container started");
                let _ = self.sender.send(NmEvent::Started {
                    container_id: descriptor.container_id.to_string(),
                });
            }
            Err(e) => {
                error!(%e, "failed to start worker container");
                let _ = self.sender.send(NmEvent::StartError {
                    container_id: descriptor.container_id.to_string(),
                    message: e.to_string(),
                });
            }
        }

        Ok(())
    }

    async fn stop_container(
        &self,
        container_id: &str,
        _node_host: &str,
        _node_port: u32,
    ) -> Result<(), NodeManagerError> {
        let name = Self::container_name(container_id);
        match self
            .client
            .stop_container(&name, Some(StopContainerOptions { t: 30 }))
            .await
        {
            Ok(()) => {
                let _ = self
                    .client
                    .remove_container(&name, Some(RemoveContainerOptions { force: true, ..Default::default() }))
                    .await;
                let _ = self.sender.send(NmEvent::Stopped { container_id: container_id.to_string() });
            }
            Err(e) => {
                let _ = self.sender.send(NmEvent::StopError {
                    container_id: container_id.to_string(),
                    message: e.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn status(
        &self,
        container_id: &str,
        _node_host: &str,
        _node_port: u32,
    ) -> Result<(), NodeManagerError> {
        let name = Self::container_name(container_id);
        match self.client.inspect_container(&name, None).await {
            Ok(info) => {
                let running = info
                    .state
                    .as_ref()
                    .and_then(|s| s.running)
                    .unwrap_or(false);
                let state = if running { RunState::Running } else { RunState::Complete };
                let _ = self.sender.send(NmEvent::StatusReceived {
                    container_id: container_id.to_string(),
                    state,
                });
            }
            Err(e) => {
                let _ = self.sender.send(NmEvent::StatusError {
                    container_id: container_id.to_string(),
                    message: e.to_string(),
                });
            }
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<NmEvent> {
        self.sender.subscribe()
    }
}
