//! Launch-context builder module
//!
//! Builds the per-container launch descriptor handed to the node-manager
//! client: local resources, environment, command line, and (when security
//! is enabled) a duplicated credential blob.

mod cluster_fs;
mod context;

pub use cluster_fs::{ClusterFs, LocalClusterFs};
pub use context::{LaunchContext, LaunchContextBuilder, LaunchContextError, LaunchConfig};
