use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::types::{Capability, ContainerDescriptor, ContainerId, ExitStatus, FinalStatus};

#[derive(Debug, Error)]
pub enum ResourceManagerError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("resource manager returned an error response ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("all retry attempts exhausted: {0}")]
    RetryExhausted(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("not registered with the resource manager yet")]
    NotRegistered,
}

impl ResourceManagerError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ResourceManagerError::Request(e) => e.is_connect() || e.is_timeout(),
            ResourceManagerError::Server { status, .. } => *status >= 500,
            ResourceManagerError::Timeout => true,
            _ => false,
        }
    }
}

/// Callbacks the resource manager client delivers on a single dedicated
/// channel (spec.md §4.2: "Callbacks are delivered on a single dedicated
/// thread").
#[derive(Debug, Clone)]
pub enum RmEvent {
    ContainersAllocated(Vec<ContainerDescriptor>),
    ContainersCompleted(Vec<(ContainerId, ExitStatus)>),
    ShutdownRequested,
    TransportError(String),
}

/// The resource-manager async client surface the supervisor consumes.
/// Modeled as a trait so a real cluster RM and an in-memory fake can share
/// call sites in the supervisor and in tests.
#[async_trait]
pub trait ResourceManagerProtocol: Send + Sync {
    /// Start the client's background heartbeat/callback task.
    async fn start(&self) -> Result<(), ResourceManagerError>;

    /// Stop the background task.
    async fn stop(&self) -> Result<(), ResourceManagerError>;

    /// Register this application master, publishing `(host, rpc_port,
    /// tracking_url)` as the AM contact. Returns the maximum cluster
    /// capability.
    async fn register(
        &self,
        host: &str,
        rpc_port: i32,
        tracking_url: &str,
    ) -> Result<Capability, ResourceManagerError>;

    /// Request a container with the given capability, preferred nodes, and
    /// priority.
    async fn request(
        &self,
        capability: Capability,
        preferred_nodes: Vec<String>,
        priority: i32,
    ) -> Result<(), ResourceManagerError>;

    /// Unregister the application master with a final status.
    async fn unregister(
        &self,
        final_status: FinalStatus,
        diagnostics: &str,
        tracking_url: &str,
    ) -> Result<(), ResourceManagerError>;

    /// Subscribe to the callback channel (containers-allocated,
    /// containers-completed, shutdown-requested, transport-error).
    fn subscribe(&self) -> broadcast::Receiver<RmEvent>;
}
