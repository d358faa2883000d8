//! Configuration structures and loading

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level daemon configuration, loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Configuration {
    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,

    /// Registration contact info and fleet policy
    pub supervisor: SupervisorConfiguration,

    /// Worker launch settings
    pub launch: LaunchConfiguration,

    /// Resource-manager and node-manager endpoints
    pub cluster: ClusterConfiguration,
}

impl Configuration {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {path}"))?;
        let config: Configuration =
            toml::from_str(&content).with_context(|| "failed to parse configuration")?;
        Ok(config)
    }
}

/// Registration contact info and fleet-sizing/failure policy (spec.md §6
/// "Recognized configuration keys").
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorConfiguration {
    /// Host the application master advertises to the resource manager.
    pub host: String,

    /// RPC port the application master advertises; -1 if none.
    #[serde(default = "default_rpc_port")]
    pub rpc_port: i32,

    #[serde(default)]
    pub tracking_url: String,

    /// initial-containers: initial fleet size.
    #[serde(rename = "initial-containers")]
    pub initial_containers: u32,

    /// container-memory-mbs: requested per-container memory, clamped to
    /// cluster max.
    #[serde(rename = "container-memory-mbs")]
    pub container_memory_mbs: u32,

    /// container-cores: requested vCPUs, clamped to cluster max.
    #[serde(rename = "container-cores")]
    pub container_cores: u32,

    /// container-host-affinity-enabled: policy in spec.md §4.1.1.
    #[serde(rename = "container-host-affinity-enabled", default)]
    pub container_host_affinity_enabled: bool,

    /// helix-instance-max-retries: retry cap; 0 disables the cap.
    #[serde(rename = "helix-instance-max-retries", default)]
    pub helix_instance_max_retries: u32,
}

fn default_rpc_port() -> i32 {
    -1
}

/// Worker launch settings (spec.md §4.4, SPEC_FULL.md §6 ambient keys).
#[derive(Debug, Clone, Deserialize)]
pub struct LaunchConfiguration {
    #[serde(rename = "application-name")]
    pub application_name: String,

    #[serde(rename = "process-kind")]
    pub process_kind: String,

    #[serde(rename = "worker-main-class")]
    pub worker_main_class: String,

    #[serde(rename = "java-home", default = "default_java_home")]
    pub java_home: String,

    #[serde(rename = "log-dir")]
    pub log_dir: PathBuf,

    /// container-jvm-args: appended verbatim to the worker command.
    #[serde(rename = "container-jvm-args", default)]
    pub container_jvm_args: String,

    /// container-files-remote: extra remote files to localize.
    #[serde(rename = "container-files-remote", default)]
    pub container_files_remote: Vec<String>,

    #[serde(rename = "security-enabled", default)]
    pub security_enabled: bool,

    /// Root cluster-filesystem directory the application's work directory
    /// is rooted under.
    #[serde(rename = "cluster-fs-root", default = "default_cluster_fs_root")]
    pub cluster_fs_root: PathBuf,
}

fn default_java_home() -> String {
    std::env::var("JAVA_HOME").unwrap_or_else(|_| "/usr/lib/jvm/default".to_string())
}

fn default_cluster_fs_root() -> PathBuf {
    PathBuf::from("/cluster-fs")
}

/// Endpoints for the HTTP-backed resource-manager client and the
/// Docker-backed node-manager client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfiguration {
    #[serde(rename = "resource-manager-endpoint")]
    pub resource_manager_endpoint: String,

    /// Unused by the Docker-backed node-manager client, which talks to the
    /// local Docker daemon directly; kept for a future non-Docker backend.
    #[serde(rename = "node-manager-endpoint", default)]
    pub node_manager_endpoint: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_configuration() {
        let toml = r#"
            [supervisor]
            host = "am-host"
            initial-containers = 2
            container-memory-mbs = 1024
            container-cores = 1

            [launch]
            application-name = "my-app"
            process-kind = "worker"
            worker-main-class = "com.cluster.Worker"
            log-dir = "/var/log/cluster"

            [cluster]
            resource-manager-endpoint = "http://rm.cluster.internal:8088"
        "#;

        let config: Configuration = toml::from_str(toml).unwrap();
        assert_eq!(config.supervisor.initial_containers, 2);
        assert_eq!(config.supervisor.rpc_port, -1);
        assert!(!config.supervisor.container_host_affinity_enabled);
        assert_eq!(config.launch.application_name, "my-app");
        assert!(config.launch.container_files_remote.is_empty());
    }
}
