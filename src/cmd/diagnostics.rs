//! Diagnostics command - checks node-manager and resource-manager connectivity

use anyhow::Result;
use bollard::Docker;

use cluster_container_supervisor::config::Configuration;

/// Check connectivity to the local Docker daemon (node manager) and the
/// configured resource-manager endpoint.
pub async fn run() -> Result<()> {
    println!("Cluster Container Supervisor Diagnostics");
    println!("=========================================\n");

    println!("Node manager (Docker):");
    println!("----------------------");
    match Docker::connect_with_local_defaults() {
        Ok(docker) => match docker.version().await {
            Ok(version) => {
                println!("  connected");
                println!("  Version: {}", version.version.unwrap_or_default());
                println!("  API Version: {}", version.api_version.unwrap_or_default());
            }
            Err(e) => println!("  connected, but version query failed: {e}"),
        },
        Err(e) => {
            println!("  failed to connect: {e}");
            println!("  make sure Docker is running and accessible");
        }
    }

    println!("\nResource manager:");
    println!("-----------------");
    match Configuration::load("config.toml") {
        Ok(config) => {
            let endpoint = &config.cluster.resource_manager_endpoint;
            println!("  endpoint: {endpoint}");
            let client = reqwest::Client::new();
            match client.get(format!("{endpoint}/heartbeat")).send().await {
                Ok(resp) => println!("  reachable (status {})", resp.status()),
                Err(e) => println!("  unreachable: {e}"),
            }
        }
        Err(e) => println!("  could not load config.toml: {e}"),
    }

    println!("\nDiagnostics complete.");
    Ok(())
}
