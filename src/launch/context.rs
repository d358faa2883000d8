use std::collections::HashMap;
use std::path::PathBuf;

use bytes::Bytes;
use thiserror::Error;

use super::cluster_fs::{ClusterFs, ClusterFsError};
use crate::credentials::CredentialBlob;
use crate::identity::Identity;
use crate::types::ContainerDescriptor;

#[derive(Debug, Error)]
pub enum LaunchContextError {
    #[error("cluster filesystem error: {0}")]
    ClusterFs(#[from] ClusterFsError),

    #[error("malformed extra jvm args: {0}")]
    InvalidJvmArgs(#[from] shell_words::ParseError),
}

/// Operator-supplied settings that shape every launch context: names,
/// the worker's main class, and where it logs.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub application_name: String,
    pub process_kind: String,
    pub worker_main_class: String,
    pub java_home: String,
    pub log_dir: PathBuf,
    /// Raw, unsplit operator-supplied JVM args (e.g. `"-verbose:gc -Dfoo=bar"`).
    pub extra_jvm_args: String,
    pub security_enabled: bool,
    /// Comma-separated list of additional remote files to stage as local
    /// resources, beyond the deterministic application work directory.
    pub remote_files: Vec<String>,
}

/// The per-container launch descriptor handed to the node-manager client.
#[derive(Debug, Clone)]
pub struct LaunchContext {
    pub local_resources: HashMap<String, PathBuf>,
    pub env: HashMap<String, String>,
    pub command: String,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
    pub credentials: Option<Bytes>,
}

pub struct LaunchContextBuilder<'a> {
    config: &'a LaunchConfig,
    cluster_fs: &'a dyn ClusterFs,
}

impl<'a> LaunchContextBuilder<'a> {
    pub fn new(config: &'a LaunchConfig, cluster_fs: &'a dyn ClusterFs) -> Self {
        Self { config, cluster_fs }
    }

    /// Build a launch context for `descriptor` bound to `identity`.
    /// `credential_blob` is attached (duplicated) only when security is
    /// enabled.
    pub async fn build(
        &self,
        descriptor: &ContainerDescriptor,
        identity: &Identity,
        credential_blob: Option<&CredentialBlob>,
    ) -> Result<LaunchContext, LaunchContextError> {
        let work_dir = self.cluster_fs.work_dir(&self.config.application_name);

        let mut local_resources = HashMap::new();
        if self.cluster_fs.exists(&work_dir).await? {
            for entry in self.cluster_fs.list_status(&work_dir).await? {
                if let Some(name) = entry.file_name().and_then(|n| n.to_str()) {
                    local_resources.insert(name.to_string(), entry);
                }
            }
        }
        for remote in &self.config.remote_files {
            let path = PathBuf::from(remote);
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                local_resources.insert(name.to_string(), path);
            }
        }

        let mut env = HashMap::new();
        env.insert("CLASSPATH".to_string(), format!("{}/*:$CLASSPATH", work_dir.display()));
        env.insert(
            "PATH".to_string(),
            format!("{}/bin:$PATH", self.config.java_home),
        );

        let jvm_args = shell_words::split(&self.config.extra_jvm_args)?;
        let max_heap_mb = descriptor.capability.memory_mb;

        let stdout_path = self
            .config
            .log_dir
            .join(format!("{}.stdout", self.config.process_kind));
        let stderr_path = self
            .config
            .log_dir
            .join(format!("{}.stderr", self.config.process_kind));

        let mut command_parts = vec![
            format!("{}/bin/java", self.config.java_home),
            format!("-Xmx{max_heap_mb}M"),
        ];
        command_parts.extend(jvm_args);
        command_parts.push(self.config.worker_main_class.clone());
        command_parts.push("--application-name".to_string());
        command_parts.push(self.config.application_name.clone());
        command_parts.push("--helix-instance-name".to_string());
        command_parts.push(identity.to_string());

        let mut command = shell_words::join(&command_parts);
        command.push_str(&format!(
            " 1>{} 2>{}",
            stdout_path.display(),
            stderr_path.display()
        ));

        let credentials = if self.config.security_enabled {
            credential_blob.map(|b| b.duplicate())
        } else {
            None
        };

        Ok(LaunchContext {
            local_resources,
            env,
            command,
            stdout_path,
            stderr_path,
            credentials,
        })
    }
}
