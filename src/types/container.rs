use serde::{Deserialize, Serialize};

/// Opaque container identifier assigned by the resource manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerId(pub String);

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ContainerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ContainerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A (memory, virtual-cores) pair advertised and enforced by the resource
/// manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub memory_mb: u32,
    pub v_cores: u32,
}

impl Capability {
    pub fn new(memory_mb: u32, v_cores: u32) -> Self {
        Self { memory_mb, v_cores }
    }

    /// Clamp both dimensions to a cluster capability snapshot. Spec
    /// invariant 2: the supervisor never issues a request whose requested
    /// (memory, cores) exceeds the snapshot.
    pub fn clamp_to(&self, max: Capability) -> Capability {
        Capability {
            memory_mb: self.memory_mb.min(max.memory_mb),
            v_cores: self.v_cores.min(max.v_cores),
        }
    }
}

/// Node-scoped execution slot with a fixed capability, as reported by the
/// resource manager on allocation or completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDescriptor {
    pub container_id: ContainerId,
    pub node_host: String,
    pub node_port: u32,
    pub capability: Capability,
    pub priority: i32,
}

/// Exit status reported by the resource manager or node manager for a
/// completed container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitStatus {
    /// Clean or application-level exit, code carried for diagnostics.
    Completed(i32),
    /// Container's host lost its disks. Host-affinity rule: do not stick to
    /// the node.
    DisksFailed,
    /// Container was aborted (e.g. by the resource manager). Host-affinity
    /// rule: do not stick to the node.
    Aborted,
    /// Container was explicitly killed (by the supervisor, during shutdown
    /// or otherwise).
    Killed,
}

impl ExitStatus {
    /// Spec 4.1.1: DISKS_FAILED or ABORTED are treated as node failures and
    /// never get a preferred-node hint on replacement.
    pub fn is_node_attributable(&self) -> bool {
        matches!(self, ExitStatus::DisksFailed | ExitStatus::Aborted)
    }
}

/// Final status the supervisor reports to the resource manager when
/// unregistering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalStatus {
    Succeeded,
    Failed,
    Killed,
}

impl std::fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinalStatus::Succeeded => write!(f, "SUCCEEDED"),
            FinalStatus::Failed => write!(f, "FAILED"),
            FinalStatus::Killed => write!(f, "KILLED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_each_dimension_independently() {
        let requested = Capability::new(8192, 4);
        let max = Capability::new(2048, 8);
        let clamped = requested.clamp_to(max);
        assert_eq!(clamped.memory_mb, 2048);
        assert_eq!(clamped.v_cores, 4);
    }

    #[test]
    fn node_attributable_exits() {
        assert!(ExitStatus::DisksFailed.is_node_attributable());
        assert!(ExitStatus::Aborted.is_node_attributable());
        assert!(!ExitStatus::Completed(137).is_node_attributable());
        assert!(!ExitStatus::Killed.is_node_attributable());
    }
}
