use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use super::heartbeat::{self, HeartbeatHandle};
use super::protocol::{ResourceManagerError, ResourceManagerProtocol, RmEvent};
use crate::types::{Capability, ContainerDescriptor, ContainerId, ExitStatus, FinalStatus};

const MAX_RETRIES: u32 = 3;
const BASE_RETRY_DELAY: Duration = Duration::from_millis(500);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Reference cadence: once per second (spec.md §4.2).
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    host: &'a str,
    rpc_port: i32,
    tracking_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    max_memory_mb: u32,
    max_v_cores: u32,
}

#[derive(Debug, Serialize)]
struct ContainerRequestDto {
    memory_mb: u32,
    v_cores: u32,
    preferred_nodes: Vec<String>,
    priority: i32,
}

#[derive(Debug, Serialize)]
struct UnregisterRequest<'a> {
    final_status: String,
    diagnostics: &'a str,
    tracking_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct AllocatedContainerDto {
    container_id: String,
    node_host: String,
    node_port: u32,
    memory_mb: u32,
    v_cores: u32,
    priority: i32,
}

#[derive(Debug, Deserialize)]
struct CompletedContainerDto {
    container_id: String,
    exit_status: String,
    exit_code: Option<i32>,
}

#[derive(Debug, Deserialize, Default)]
struct HeartbeatResponse {
    #[serde(default)]
    allocated: Vec<AllocatedContainerDto>,
    #[serde(default)]
    completed: Vec<CompletedContainerDto>,
    #[serde(default)]
    shutdown: bool,
}

fn parse_exit_status(raw: &str, exit_code: Option<i32>) -> ExitStatus {
    match raw {
        "DISKS_FAILED" => ExitStatus::DisksFailed,
        "ABORTED" => ExitStatus::Aborted,
        "KILLED" => ExitStatus::Killed,
        _ => ExitStatus::Completed(exit_code.unwrap_or(0)),
    }
}

/// The HTTP-backed resource-manager client: a `reqwest::Client` with
/// bounded retry/backoff on transient failures, and a background task that
/// owns the heartbeat interval and delivers callbacks on a single channel.
pub struct HttpResourceManagerClient {
    client: Client,
    endpoint: String,
    sender: broadcast::Sender<RmEvent>,
    heartbeat: std::sync::Mutex<Option<HeartbeatHandle>>,
}

impl HttpResourceManagerClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ResourceManagerError> {
        let endpoint = endpoint.into();
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ResourceManagerError::InvalidEndpoint(endpoint));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(ResourceManagerError::Request)?;

        let (sender, _rx) = broadcast::channel(256);

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            sender,
            heartbeat: std::sync::Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    async fn request_json<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ResourceManagerError> {
        let url = self.url(path);
        let mut last_error: Option<ResourceManagerError> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = std::cmp::min(BASE_RETRY_DELAY * 2u32.pow(attempt - 1), MAX_RETRY_DELAY);
                debug!(attempt, ?delay, path, "retrying resource manager request");
                tokio::time::sleep(delay).await;
            }

            let outcome = self
                .client
                .request(method.clone(), &url)
                .json(body)
                .send()
                .await;

            let response = match outcome {
                Ok(r) => r,
                Err(e) => {
                    let err = if e.is_timeout() {
                        ResourceManagerError::Timeout
                    } else {
                        ResourceManagerError::Request(e)
                    };
                    if err.is_retryable() && attempt < MAX_RETRIES {
                        warn!(attempt, %err, "transient resource manager error");
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
            };

            let status = response.status();
            if status.is_server_error() {
                let message = response.text().await.unwrap_or_default();
                let err = ResourceManagerError::Server { status: status.as_u16(), message };
                if attempt < MAX_RETRIES {
                    warn!(attempt, %err, "transient resource manager error");
                    last_error = Some(err);
                    continue;
                }
                return Err(err);
            }
            if status.is_client_error() {
                let message = response.text().await.unwrap_or_default();
                return Err(ResourceManagerError::Server { status: status.as_u16(), message });
            }

            let text = response.text().await.map_err(ResourceManagerError::Request)?;
            return serde_json::from_str(&text).map_err(ResourceManagerError::Parse);
        }

        Err(ResourceManagerError::RetryExhausted(
            last_error.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }
}

#[async_trait]
impl ResourceManagerProtocol for HttpResourceManagerClient {
    async fn start(&self) -> Result<(), ResourceManagerError> {
        let mut guard = self.heartbeat.lock().unwrap();
        if guard.is_some() {
            return Ok(());
        }

        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let sender = self.sender.clone();

        let handle = heartbeat::spawn("resource-manager", HEARTBEAT_INTERVAL, move || {
            let client = client.clone();
            let endpoint = endpoint.clone();
            let sender = sender.clone();
            async move {
                let url = format!("{endpoint}/heartbeat");
                match client.get(&url).send().await {
                    Ok(response) => match response.json::<HeartbeatResponse>().await {
                        Ok(body) => {
                            if !body.allocated.is_empty() {
                                let descriptors = body
                                    .allocated
                                    .into_iter()
                                    .map(|a| ContainerDescriptor {
                                        container_id: ContainerId::from(a.container_id),
                                        node_host: a.node_host,
                                        node_port: a.node_port,
                                        capability: Capability::new(a.memory_mb, a.v_cores),
                                        priority: a.priority,
                                    })
                                    .collect();
                                let _ = sender.send(RmEvent::ContainersAllocated(descriptors));
                            }
                            if !body.completed.is_empty() {
                                let completed = body
                                    .completed
                                    .into_iter()
                                    .map(|c| {
                                        (
                                            ContainerId::from(c.container_id),
                                            parse_exit_status(&c.exit_status, c.exit_code),
                                        )
                                    })
                                    .collect();
                                let _ = sender.send(RmEvent::ContainersCompleted(completed));
                            }
                            if body.shutdown {
                                let _ = sender.send(RmEvent::ShutdownRequested);
                            }
                        }
                        Err(e) => {
                            error!(%e, "malformed heartbeat response");
                            let _ = sender.send(RmEvent::TransportError(e.to_string()));
                        }
                    },
                    Err(e) => {
                        error!(%e, "heartbeat request failed");
                        let _ = sender.send(RmEvent::TransportError(e.to_string()));
                    }
                }
            }
        });

        *guard = Some(handle);
        Ok(())
    }

    async fn stop(&self) -> Result<(), ResourceManagerError> {
        if let Some(handle) = self.heartbeat.lock().unwrap().take() {
            handle.cancel();
        }
        Ok(())
    }

    async fn register(
        &self,
        host: &str,
        rpc_port: i32,
        tracking_url: &str,
    ) -> Result<Capability, ResourceManagerError> {
        let body = RegisterRequest { host, rpc_port, tracking_url };
        let response: RegisterResponse =
            self.request_json(Method::POST, "register", &body).await?;
        Ok(Capability::new(response.max_memory_mb, response.max_v_cores))
    }

    async fn request(
        &self,
        capability: Capability,
        preferred_nodes: Vec<String>,
        priority: i32,
    ) -> Result<(), ResourceManagerError> {
        let body = ContainerRequestDto {
            memory_mb: capability.memory_mb,
            v_cores: capability.v_cores,
            preferred_nodes,
            priority,
        };
        self.request_json::<_, serde_json::Value>(Method::POST, "requests", &body)
            .await?;
        Ok(())
    }

    async fn unregister(
        &self,
        final_status: FinalStatus,
        diagnostics: &str,
        tracking_url: &str,
    ) -> Result<(), ResourceManagerError> {
        let body = UnregisterRequest {
            final_status: final_status.to_string(),
            diagnostics,
            tracking_url,
        };
        self.request_json::<_, serde_json::Value>(Method::POST, "unregister", &body)
            .await?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<RmEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_endpoints_without_a_scheme() {
        let err = HttpResourceManagerClient::new("rm.cluster.internal:8088").unwrap_err();
        assert!(matches!(err, ResourceManagerError::InvalidEndpoint(_)));
    }

    #[test]
    fn trims_trailing_slash_from_endpoint() {
        let client = HttpResourceManagerClient::new("http://rm.cluster.internal:8088/").unwrap();
        assert_eq!(client.endpoint, "http://rm.cluster.internal:8088");
    }
}
