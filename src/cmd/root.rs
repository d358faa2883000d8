//! Main daemon command - starts the container supervisor

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use cluster_container_supervisor::config::Configuration;
use cluster_container_supervisor::credentials::StaticCredentials;
use cluster_container_supervisor::launch::{LaunchConfig, LocalClusterFs};
use cluster_container_supervisor::nm::DockerNodeManagerClient;
use cluster_container_supervisor::rm::HttpResourceManagerClient;
use cluster_container_supervisor::supervisor::{ClusterSupervisor, SupervisorConfig};

/// Run the supervisor daemon.
pub async fn run(config_path: &str) -> Result<()> {
    info!("loading configuration from {config_path}");
    let config = Configuration::load(config_path)?;

    info!(
        host = %config.supervisor.host,
        initial_containers = config.supervisor.initial_containers,
        rm_endpoint = %config.cluster.resource_manager_endpoint,
        "configuration loaded",
    );

    let rm = Arc::new(HttpResourceManagerClient::new(&config.cluster.resource_manager_endpoint)?);
    let nm = Arc::new(DockerNodeManagerClient::new()?);

    let supervisor_config = SupervisorConfig {
        host: config.supervisor.host.clone(),
        rpc_port: config.supervisor.rpc_port,
        tracking_url: config.supervisor.tracking_url.clone(),
        initial_containers: config.supervisor.initial_containers,
        container_memory_mb: config.supervisor.container_memory_mbs,
        container_cores: config.supervisor.container_cores,
        host_affinity_enabled: config.supervisor.container_host_affinity_enabled,
        max_retries: config.supervisor.helix_instance_max_retries,
        process_kind: config.launch.process_kind.clone(),
    };

    let launch_config = LaunchConfig {
        application_name: config.launch.application_name.clone(),
        process_kind: config.launch.process_kind.clone(),
        worker_main_class: config.launch.worker_main_class.clone(),
        java_home: config.launch.java_home.clone(),
        log_dir: config.launch.log_dir.clone(),
        extra_jvm_args: config.launch.container_jvm_args.clone(),
        security_enabled: config.launch.security_enabled,
        remote_files: config.launch.container_files_remote.clone(),
    };

    let cluster_fs = Arc::new(LocalClusterFs::new(config.launch.cluster_fs_root.clone()));

    // No external token source is wired up yet; an empty credential set
    // still exercises the security-enabled/disabled branch correctly.
    let credentials = StaticCredentials::default();

    let supervisor = Arc::new(ClusterSupervisor::new(
        rm,
        nm,
        supervisor_config,
        launch_config,
        cluster_fs,
        Some(&credentials),
    )?);

    let shutdown_supervisor = supervisor.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("received shutdown signal, stopping supervisor");
            shutdown_supervisor.request_shutdown();
        }
    });

    supervisor.run().await?;
    info!("supervisor stopped");
    Ok(())
}
