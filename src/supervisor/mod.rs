//! Container supervisor module
//!
//! The core orchestrator (C5): owns the container record, retry counters,
//! capability snapshot, and shutdown latch, and drives the state machine
//! described in spec.md §4.1 by reconciling resource-manager callbacks,
//! node-manager callbacks, and its own event-bus messages on a single task.

mod latch;
mod record;

pub use latch::ShutdownLatch;
pub use record::{CapabilitySnapshot, ContainerBinding, ContainerRecord, RetryCounters};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::credentials::{CredentialBlob, CredentialPacker, CredentialsSource};
use crate::events::{Event, EventBus};
use crate::identity::IdentityRegistry;
use crate::launch::{ClusterFs, LaunchConfig, LaunchContextBuilder};
use crate::nm::{NmEvent, NodeManagerError, NodeManagerProtocol, RunState};
use crate::rm::{ResourceManagerError, ResourceManagerProtocol, RmEvent};
use crate::types::{Capability, ContainerDescriptor, ContainerId, ExitStatus, FinalStatus};

/// Bounded launch worker pool size (spec.md §4.1 rule 3).
const LAUNCH_POOL_SIZE: usize = 10;

/// Shutdown latch timeout (spec.md §5).
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("resource manager error: {0}")]
    ResourceManager(#[from] ResourceManagerError),

    #[error("node manager error: {0}")]
    NodeManager(#[from] NodeManagerError),

    #[error("launch context error: {0}")]
    Launch(#[from] crate::launch::LaunchContextError),

    #[error("failed to pack credentials: {0}")]
    Credentials(#[from] crate::error::DaemonError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Registering,
    Filling,
    Running,
    Stopping,
    Stopped,
}

/// Operator-configured policy knobs (spec.md §6 "Recognized configuration
/// keys", plus the registration contact info).
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub host: String,
    pub rpc_port: i32,
    pub tracking_url: String,
    pub initial_containers: u32,
    pub container_memory_mb: u32,
    pub container_cores: u32,
    pub host_affinity_enabled: bool,
    /// 0 disables the cap.
    pub max_retries: u32,
    pub process_kind: String,
}

/// The application-master-level controller: requests containers from the
/// resource manager, launches workers in them via the node manager, and
/// keeps the fleet at `config.initial_containers` across churn.
pub struct ClusterSupervisor<RM, NM> {
    rm: Arc<RM>,
    nm: Arc<NM>,
    events: EventBus,
    identities: IdentityRegistry,
    record: ContainerRecord,
    retries: RetryCounters,
    capability: CapabilitySnapshot,
    latch: ShutdownLatch,
    launch_pool: Arc<Semaphore>,
    config: SupervisorConfig,
    launch_config: Arc<LaunchConfig>,
    cluster_fs: Arc<dyn ClusterFs>,
    credential_blob: Option<CredentialBlob>,
    phase: RwLock<Phase>,
}

impl<RM, NM> ClusterSupervisor<RM, NM>
where
    RM: ResourceManagerProtocol + 'static,
    NM: NodeManagerProtocol + 'static,
{
    pub fn new(
        rm: Arc<RM>,
        nm: Arc<NM>,
        config: SupervisorConfig,
        launch_config: LaunchConfig,
        cluster_fs: Arc<dyn ClusterFs>,
        credentials: Option<&dyn CredentialsSource>,
    ) -> Result<Self, SupervisorError> {
        let credential_blob = match credentials {
            Some(source) if launch_config.security_enabled => {
                Some(CredentialPacker::pack(source)?)
            }
            _ => None,
        };

        Ok(Self {
            identities: IdentityRegistry::new(config.process_kind.clone()),
            rm,
            nm,
            events: EventBus::new(),
            record: ContainerRecord::new(),
            retries: RetryCounters::new(),
            capability: CapabilitySnapshot::new(),
            latch: ShutdownLatch::new(),
            launch_pool: Arc::new(Semaphore::new(LAUNCH_POOL_SIZE)),
            config,
            launch_config: Arc::new(launch_config),
            cluster_fs,
            credential_blob,
            phase: RwLock::new(Phase::Init),
        })
    }

    pub fn phase(&self) -> Phase {
        *self.phase.read()
    }

    /// Number of containers currently bound to a live identity.
    pub fn container_count(&self) -> usize {
        self.record.len()
    }

    /// Ask the supervisor to shut down gracefully; drives the same path a
    /// resource-manager shutdown callback would.
    pub fn request_shutdown(&self) {
        self.events.publish(Event::ApplicationMasterShutdownRequest);
    }

    /// Run the full lifecycle: register, fill to `initial_containers`, then
    /// service callbacks until a shutdown is requested, then drain and
    /// unregister. Returns once `Stopped`.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), SupervisorError> {
        *self.phase.write() = Phase::Registering;

        // Subscribe before starting any client so no callback delivered
        // during start/register/fill is ever dropped for want of a receiver.
        let mut rm_rx = self.rm.subscribe();
        let mut nm_rx = self.nm.subscribe();
        let mut bus_rx = self.events.subscribe();

        self.rm.start().await?;
        self.nm.start().await?;

        let capability = self
            .rm
            .register(&self.config.host, self.config.rpc_port, &self.config.tracking_url)
            .await?;
        self.capability.set(capability);
        info!(?capability, "registered with resource manager");

        *self.phase.write() = Phase::Filling;
        for _ in 0..self.config.initial_containers {
            self.issue_request(None).await?;
        }
        *self.phase.write() = Phase::Running;

        // Sentinel deadline for the non-shutting-down case; replaced with a
        // real deadline once a shutdown is requested.
        let mut shutdown_deadline = Instant::now() + Duration::from_secs(60 * 60 * 24 * 365 * 10);
        let mut shutting_down = false;

        loop {
            if shutting_down && self.record.is_empty() {
                break;
            }

            tokio::select! {
                Ok(event) = rm_rx.recv() => {
                    self.handle_rm_event(event).await?;
                }
                Ok(event) = nm_rx.recv() => {
                    self.handle_nm_event(event).await?;
                }
                Ok(event) = bus_rx.recv() => {
                    match event {
                        Event::ApplicationMasterShutdownRequest => {
                            if !shutting_down {
                                shutting_down = true;
                                shutdown_deadline = Instant::now() + SHUTDOWN_TIMEOUT;
                                self.stop_all_containers().await;
                            }
                        }
                        other => self.handle_bus_event(other).await?,
                    }
                }
                _ = tokio::time::sleep_until(shutdown_deadline), if shutting_down => {
                    warn!("shutdown timed out after 5 minutes; proceeding with residual container records");
                    break;
                }
                else => break,
            }
        }

        self.finish_shutdown().await
    }

    async fn handle_rm_event(&self, event: RmEvent) -> Result<(), SupervisorError> {
        match event {
            RmEvent::ContainersAllocated(descriptors) => {
                for descriptor in descriptors {
                    self.handle_allocated(descriptor);
                }
            }
            RmEvent::ContainersCompleted(completions) => {
                for (container_id, exit_status) in completions {
                    self.handle_completed(container_id, exit_status);
                }
            }
            RmEvent::ShutdownRequested => {
                info!("resource manager requested shutdown");
                self.events.publish(Event::ApplicationMasterShutdownRequest);
            }
            RmEvent::TransportError(message) => {
                warn!(message, "resource manager transport error; shutting down");
                self.events.publish(Event::ApplicationMasterShutdownRequest);
            }
        }
        Ok(())
    }

    async fn handle_nm_event(&self, event: NmEvent) -> Result<(), SupervisorError> {
        match event {
            NmEvent::Started { container_id } => {
                debug!(container_id, "worker container started");
            }
            NmEvent::StatusReceived { container_id, state } => {
                if state == RunState::Complete {
                    // Equivalent to the RM completion path for the same
                    // container (spec.md §4.3); idempotent via
                    // ContainerRecord::remove's first-observer-wins.
                    self.handle_completed(ContainerId::from(container_id), ExitStatus::Completed(0));
                }
            }
            NmEvent::Stopped { container_id } => {
                self.record.remove(&ContainerId::from(container_id));
                self.latch.notify_if_drained(self.record.len());
            }
            NmEvent::StartError { container_id, message } => {
                warn!(container_id, message, "container start failed; identity not requeued");
                self.record.remove(&ContainerId::from(container_id));
            }
            NmEvent::StatusError { container_id, message } => {
                warn!(container_id, message, "status poll failed");
            }
            NmEvent::StopError { container_id, message } => {
                warn!(container_id, message, "stop request failed");
            }
        }
        Ok(())
    }

    async fn handle_bus_event(&self, event: Event) -> Result<(), SupervisorError> {
        match event {
            Event::NewContainerRequest { replaced_container } => {
                let preferred = replaced_container.map(|d| d.node_host);
                self.issue_request(preferred).await?;
            }
            Event::ContainerShutdownRequest { containers } => {
                for descriptor in containers {
                    self.dispatch_stop(&descriptor).await;
                }
            }
            // Handled directly in `run`'s reconcile loop, which needs to
            // flip into drain mode without breaking out of event service.
            Event::ApplicationMasterShutdownRequest => {}
        }
        Ok(())
    }

    /// Allocation handling (spec.md §4.1): bind an identity, insert the
    /// record before dispatching the start, then hand the build+start work
    /// to the bounded launch pool so the RM callback thread never blocks.
    fn handle_allocated(&self, descriptor: ContainerDescriptor) {
        let identity = self.identities.acquire();
        self.record.insert(
            descriptor.container_id.clone(),
            ContainerBinding { descriptor: descriptor.clone(), identity: identity.clone() },
        );

        let nm = self.nm.clone();
        let cluster_fs = self.cluster_fs.clone();
        let launch_config = self.launch_config.clone();
        let credential_blob = self.credential_blob.clone();
        let pool = self.launch_pool.clone();

        tokio::spawn(async move {
            let _permit = match pool.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            let builder = LaunchContextBuilder::new(&launch_config, cluster_fs.as_ref());
            match builder.build(&descriptor, &identity, credential_blob.as_ref()).await {
                Ok(ctx) => {
                    if let Err(e) = nm.start_container(&descriptor, &ctx).await {
                        warn!(%e, container_id = %descriptor.container_id, "failed to submit start to node manager");
                    }
                }
                Err(e) => {
                    warn!(%e, container_id = %descriptor.container_id, "failed to build launch context");
                }
            }
        });
    }

    /// Completion handling (spec.md §4.1).
    fn handle_completed(&self, container_id: ContainerId, exit_status: ExitStatus) {
        let binding = match self.record.remove(&container_id) {
            Some(binding) => binding,
            None => return, // second observer of the same completion: no-op
        };

        let retry_count = self.retries.record_retry(&binding.identity);

        if self.config.max_retries > 0 && retry_count > self.config.max_retries {
            warn!(identity = %binding.identity, retry_count, "retry cap exceeded; retiring identity");
            return;
        }

        self.identities.recycle(binding.identity);

        // Host-affinity rule (spec.md §4.1.1).
        let preferred = if exit_status.is_node_attributable() {
            None
        } else if self.config.host_affinity_enabled {
            Some(binding.descriptor)
        } else {
            None
        };

        self.events.publish(Event::NewContainerRequest { replaced_container: preferred });
    }

    /// Request issuance (spec.md §4.1.2).
    async fn issue_request(&self, preferred_node: Option<String>) -> Result<(), SupervisorError> {
        let snapshot = match self.capability.get() {
            Some(snapshot) => snapshot,
            None => {
                warn!("cluster capability snapshot not yet known; dropping container request");
                return Ok(());
            }
        };

        let requested = Capability::new(self.config.container_memory_mb, self.config.container_cores);
        let clamped = requested.clamp_to(snapshot);
        let preferred_nodes = preferred_node.into_iter().collect::<Vec<_>>();

        self.rm.request(clamped, preferred_nodes, 0).await?;
        Ok(())
    }

    async fn dispatch_stop(&self, descriptor: &ContainerDescriptor) {
        if let Err(e) = self
            .nm
            .stop_container(&descriptor.container_id.to_string(), &descriptor.node_host, descriptor.node_port)
            .await
        {
            warn!(%e, container_id = %descriptor.container_id, "stop_container failed");
        }
    }

    /// Dispatches a stop to every currently-recorded container directly
    /// (not via the event bus) so the drain-by-timeout loop in `run` can
    /// observe the fleet starting to shrink without depending on bus
    /// delivery order relative to node-manager callbacks.
    async fn stop_all_containers(&self) {
        *self.phase.write() = Phase::Stopping;
        for descriptor in self.record.descriptors() {
            self.dispatch_stop(&descriptor).await;
        }
    }

    async fn finish_shutdown(&self) -> Result<(), SupervisorError> {
        if !self.record.is_empty() {
            warn!("shutdown timed out after 5 minutes; unregistering with residual container records");
        }

        if let Err(e) = self.rm.unregister(FinalStatus::Succeeded, "", "").await {
            warn!(%e, "unregister failed; suppressing and continuing shutdown");
        }
        let _ = self.rm.stop().await;
        let _ = self.nm.stop().await;

        *self.phase.write() = Phase::Stopped;
        Ok(())
    }
}

/// Convenience bundle the CLI entry point assembles from configuration,
/// standing in for the original Hadoop `ApplicationMaster`'s various
/// constructor parameters (work directory, log directory).
pub struct SupervisorPaths {
    pub work_dir: PathBuf,
    pub log_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentials;
    use crate::launch::LocalClusterFs;
    use crate::nm::FakeNodeManager;
    use crate::rm::FakeResourceManager;
    use crate::types::ExitStatus;

    fn launch_config() -> LaunchConfig {
        LaunchConfig {
            application_name: "test-app".to_string(),
            process_kind: "worker".to_string(),
            worker_main_class: "com.cluster.Worker".to_string(),
            java_home: "/usr/lib/jvm/java-17".to_string(),
            log_dir: PathBuf::from("/tmp"),
            extra_jvm_args: String::new(),
            security_enabled: false,
            remote_files: vec![],
        }
    }

    fn supervisor_config(initial: u32, max_retries: u32, host_affinity: bool) -> SupervisorConfig {
        SupervisorConfig {
            host: "am-host".to_string(),
            rpc_port: -1,
            tracking_url: String::new(),
            initial_containers: initial,
            container_memory_mb: 1024,
            container_cores: 1,
            host_affinity_enabled: host_affinity,
            max_retries,
            process_kind: "worker".to_string(),
        }
    }

    fn make_supervisor(
        rm: Arc<FakeResourceManager>,
        nm: Arc<FakeNodeManager>,
        initial: u32,
        max_retries: u32,
        host_affinity: bool,
    ) -> ClusterSupervisor<FakeResourceManager, FakeNodeManager> {
        let fs = Arc::new(LocalClusterFs::new(std::env::temp_dir()));
        let source = StaticCredentials(vec![]);
        ClusterSupervisor::new(
            rm,
            nm,
            supervisor_config(initial, max_retries, host_affinity),
            launch_config(),
            fs,
            Some(&source),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn happy_fill_issues_n_requests_at_priority_zero() {
        let rm = Arc::new(FakeResourceManager::new(Capability::new(8192, 8)));
        let nm = Arc::new(FakeNodeManager::new());
        let supervisor = make_supervisor(rm.clone(), nm.clone(), 2, 0, false);

        let run = tokio::spawn(async move {
            let _ = supervisor.run().await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        rm.shutdown();
        let _ = run.await;

        let requests = rm.requests();
        assert_eq!(requests.len(), 2);
        for (capability, preferred_nodes, priority) in requests {
            assert_eq!(capability, Capability::new(1024, 1));
            assert!(preferred_nodes.is_empty());
            assert_eq!(priority, 0);
        }
    }

    #[tokio::test]
    async fn initial_containers_zero_stops_immediately() {
        let rm = Arc::new(FakeResourceManager::new(Capability::new(8192, 8)));
        let nm = Arc::new(FakeNodeManager::new());
        let supervisor = Arc::new(make_supervisor(rm.clone(), nm.clone(), 0, 0, false));

        let sup2 = supervisor.clone();
        let run = tokio::spawn(async move { sup2.run().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        supervisor.request_shutdown();

        let result = tokio::time::timeout(Duration::from_secs(5), run).await;
        assert!(result.is_ok());
        assert_eq!(rm.unregistered_with(), Some(FinalStatus::Succeeded));
    }

    #[tokio::test]
    async fn clamps_requested_capability_to_the_snapshot() {
        let rm = Arc::new(FakeResourceManager::new(Capability::new(2048, 8)));
        let nm = Arc::new(FakeNodeManager::new());
        let mut config = supervisor_config(1, 0, false);
        config.container_memory_mb = 8192;
        let fs = Arc::new(LocalClusterFs::new(std::env::temp_dir()));
        let source = StaticCredentials(vec![]);
        let supervisor =
            ClusterSupervisor::new(rm.clone(), nm.clone(), config, launch_config(), fs, Some(&source)).unwrap();

        let run = tokio::spawn(async move {
            let _ = supervisor.run().await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        rm.shutdown();
        let _ = run.await;

        let requests = rm.requests();
        assert_eq!(requests[0].0, Capability::new(2048, 8));
    }

    #[tokio::test]
    async fn replacement_on_normal_failure_carries_preferred_node_when_affinity_enabled() {
        let rm = Arc::new(FakeResourceManager::new(Capability::new(8192, 8)));
        let nm = Arc::new(FakeNodeManager::new());
        let supervisor = Arc::new(make_supervisor(rm.clone(), nm.clone(), 1, 0, true));

        let sup2 = supervisor.clone();
        let run = tokio::spawn(async move { sup2.run().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let descriptor = ContainerDescriptor {
            container_id: ContainerId::from("c1"),
            node_host: "h1".to_string(),
            node_port: 1,
            capability: Capability::new(1024, 1),
            priority: 0,
        };
        rm.allocate(vec![descriptor.clone()]);
        tokio::time::sleep(Duration::from_millis(20)).await;
        rm.complete(descriptor.container_id.clone(), ExitStatus::Completed(137));
        tokio::time::sleep(Duration::from_millis(20)).await;

        supervisor.request_shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(5), run).await;

        let requests = rm.requests();
        // One initial fill request with no preferred node, one replacement
        // request with the completed container's host.
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].1, vec!["h1".to_string()]);
    }

    #[tokio::test]
    async fn disk_failure_never_carries_a_preferred_node_even_with_affinity_enabled() {
        let rm = Arc::new(FakeResourceManager::new(Capability::new(8192, 8)));
        let nm = Arc::new(FakeNodeManager::new());
        let supervisor = Arc::new(make_supervisor(rm.clone(), nm.clone(), 1, 0, true));

        let sup2 = supervisor.clone();
        let run = tokio::spawn(async move { sup2.run().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let descriptor = ContainerDescriptor {
            container_id: ContainerId::from("c2"),
            node_host: "h2".to_string(),
            node_port: 1,
            capability: Capability::new(1024, 1),
            priority: 0,
        };
        rm.allocate(vec![descriptor.clone()]);
        tokio::time::sleep(Duration::from_millis(20)).await;
        rm.complete(descriptor.container_id.clone(), ExitStatus::DisksFailed);
        tokio::time::sleep(Duration::from_millis(20)).await;

        supervisor.request_shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(5), run).await;

        let requests = rm.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].1.is_empty());
    }

    #[tokio::test]
    async fn retry_exhaustion_retires_the_identity_without_a_replacement() {
        let rm = Arc::new(FakeResourceManager::new(Capability::new(8192, 8)));
        let nm = Arc::new(FakeNodeManager::new());
        let supervisor = Arc::new(make_supervisor(rm.clone(), nm.clone(), 1, 2, false));

        let sup2 = supervisor.clone();
        let run = tokio::spawn(async move { sup2.run().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut container_id = ContainerId::from("c5-0");
        for i in 0..3u32 {
            let descriptor = ContainerDescriptor {
                container_id: ContainerId::from(format!("c5-{i}")),
                node_host: "h5".to_string(),
                node_port: 1,
                capability: Capability::new(1024, 1),
                priority: 0,
            };
            container_id = descriptor.container_id.clone();
            rm.allocate(vec![descriptor.clone()]);
            tokio::time::sleep(Duration::from_millis(15)).await;
            rm.complete(descriptor.container_id.clone(), ExitStatus::Completed(1));
            tokio::time::sleep(Duration::from_millis(15)).await;
        }
        let _ = container_id;

        supervisor.request_shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(5), run).await;

        // 1 initial fill request + 2 replacement requests (third completion
        // exceeds max_retries=2 and is retired, no fourth request).
        assert_eq!(rm.requests().len(), 3);
    }

    #[tokio::test]
    async fn graceful_stop_dispatches_stop_to_every_running_container() {
        let rm = Arc::new(FakeResourceManager::new(Capability::new(8192, 8)));
        let nm = Arc::new(FakeNodeManager::new());
        let supervisor = Arc::new(make_supervisor(rm.clone(), nm.clone(), 3, 0, false));

        let sup2 = supervisor.clone();
        let run = tokio::spawn(async move { sup2.run().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let descriptors: Vec<_> = (0..3)
            .map(|i| ContainerDescriptor {
                container_id: ContainerId::from(format!("r{i}")),
                node_host: format!("h{i}"),
                node_port: 1,
                capability: Capability::new(1024, 1),
                priority: 0,
            })
            .collect();
        rm.allocate(descriptors.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;

        supervisor.request_shutdown();
        for d in &descriptors {
            nm.report_stopped(&d.container_id.to_string());
        }
        let result = tokio::time::timeout(Duration::from_secs(5), run).await;
        assert!(result.is_ok());

        let mut stopped = nm.stopped_containers();
        stopped.sort();
        assert_eq!(stopped, vec!["r0".to_string(), "r1".to_string(), "r2".to_string()]);
    }
}
