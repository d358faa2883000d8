//! Top-level crate error type

use thiserror::Error;

use crate::nm::NodeManagerError;
use crate::rm::ResourceManagerError;
use crate::supervisor::SupervisorError;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("resource manager error: {0}")]
    ResourceManager(#[from] ResourceManagerError),

    #[error("node manager error: {0}")]
    NodeManager(#[from] NodeManagerError),

    #[error("supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DaemonError>;
