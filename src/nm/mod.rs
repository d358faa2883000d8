//! Node-manager client module
//!
//! Exposes the node manager's start/stop/status surface as a trait, a
//! Docker-backed implementation, and an in-memory test double, plus the
//! per-container callback event shape they deliver.

mod docker;
mod fake;
mod protocol;

pub use docker::DockerNodeManagerClient;
pub use fake::FakeNodeManager;
pub use protocol::{NmEvent, NodeManagerError, NodeManagerProtocol, RunState};
