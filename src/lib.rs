//! Cluster Container Supervisor library
//!
//! Core functionality for the application-master-style daemon that keeps a
//! fleet of worker containers at a configured size across a
//! resource-managed cluster.

pub mod cmd;
pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod identity;
pub mod launch;
pub mod nm;
pub mod rm;
pub mod supervisor;
pub mod system;
pub mod types;

// Re-export commonly used types
pub use config::Configuration;
pub use error::{DaemonError, Result};
pub use events::EventBus;
pub use supervisor::ClusterSupervisor;
