use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::launch::LaunchContext;
use crate::types::ContainerDescriptor;

#[derive(Debug, Error)]
pub enum NodeManagerError {
    #[error("docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("container already exists: {0}")]
    ContainerExists(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Run state a status callback can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    /// Equivalent to the resource manager's own completion callback for
    /// the same container (spec.md §4.3).
    Complete,
}

/// Per-container callbacks the node-manager client delivers.
#[derive(Debug, Clone)]
pub enum NmEvent {
    Started { container_id: String },
    StatusReceived { container_id: String, state: RunState },
    Stopped { container_id: String },
    StartError { container_id: String, message: String },
    StatusError { container_id: String, message: String },
    StopError { container_id: String, message: String },
}

/// The node-manager async client surface the supervisor consumes.
#[async_trait]
pub trait NodeManagerProtocol: Send + Sync {
    async fn start(&self) -> Result<(), NodeManagerError>;
    async fn stop(&self) -> Result<(), NodeManagerError>;

    /// Start a container. Delivers `Started` or `StartError` on the
    /// callback channel; never blocks the caller past submission.
    async fn start_container(
        &self,
        descriptor: &ContainerDescriptor,
        launch_context: &LaunchContext,
    ) -> Result<(), NodeManagerError>;

    /// Stop a container. Delivers `Stopped` or `StopError`.
    async fn stop_container(
        &self,
        container_id: &str,
        node_host: &str,
        node_port: u32,
    ) -> Result<(), NodeManagerError>;

    /// Poll status. Delivers `StatusReceived` or `StatusError`.
    async fn status(
        &self,
        container_id: &str,
        node_host: &str,
        node_port: u32,
    ) -> Result<(), NodeManagerError>;

    fn subscribe(&self) -> broadcast::Receiver<NmEvent>;
}
