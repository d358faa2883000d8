use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterFsError {
    #[error("I/O error against cluster filesystem: {0}")]
    Io(#[from] std::io::Error),
}

/// The cluster filesystem surface the launch-context builder consumes:
/// `exists`/`listStatus` semantics, resolved against a runtime
/// configuration. The supervisor never writes through this trait.
#[async_trait]
pub trait ClusterFs: Send + Sync {
    async fn exists(&self, path: &Path) -> Result<bool, ClusterFsError>;
    async fn list_status(&self, path: &Path) -> Result<Vec<PathBuf>, ClusterFsError>;

    /// The deterministic application work directory local resources are
    /// rooted at.
    fn work_dir(&self, application_name: &str) -> PathBuf;
}

/// A local-filesystem-backed `ClusterFs`, standing in for a real cluster
/// filesystem in tests and single-node deployments.
pub struct LocalClusterFs {
    root: PathBuf,
}

impl LocalClusterFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ClusterFs for LocalClusterFs {
    async fn exists(&self, path: &Path) -> Result<bool, ClusterFsError> {
        Ok(tokio::fs::metadata(path).await.is_ok())
    }

    async fn list_status(&self, path: &Path) -> Result<Vec<PathBuf>, ClusterFsError> {
        let mut entries = tokio::fs::read_dir(path).await?;
        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            out.push(entry.path());
        }
        Ok(out)
    }

    fn work_dir(&self, application_name: &str) -> PathBuf {
        self.root.join(application_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn work_dir_is_rooted_at_the_configured_directory() {
        let fs = LocalClusterFs::new("/tmp/cluster-fs-root");
        assert_eq!(
            fs.work_dir("my-app"),
            PathBuf::from("/tmp/cluster-fs-root/my-app")
        );
    }

    #[tokio::test]
    async fn exists_is_false_for_a_missing_path() {
        let fs = LocalClusterFs::new(std::env::temp_dir());
        let missing = std::env::temp_dir().join("definitely-does-not-exist-xyz");
        assert!(!fs.exists(&missing).await.unwrap());
    }
}
