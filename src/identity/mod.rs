//! Identity registry module
//!
//! Generates, recycles, and retry-counts the logical worker identities
//! that outlive any single container.

mod registry;

pub use registry::{Identity, IdentityRegistry};
