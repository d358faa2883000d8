//! Shared cluster types
//!
//! Small, dependency-free types referenced by the resource-manager client,
//! the node-manager client, the event bus, and the supervisor alike, kept in
//! one place so none of those modules has to depend on another just to
//! name a container.

mod container;

pub use container::{Capability, ContainerDescriptor, ContainerId, ExitStatus, FinalStatus};
