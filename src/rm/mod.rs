//! Resource-manager client module
//!
//! Exposes the resource manager's register/request/unregister surface as a
//! trait, a heartbeat-driven HTTP implementation, and an in-memory test
//! double, plus the callback event shape they all deliver on a single
//! dedicated channel.

mod fake;
pub mod heartbeat;
mod http;
mod protocol;

pub use fake::FakeResourceManager;
pub use http::HttpResourceManagerClient;
pub use protocol::{ResourceManagerError, ResourceManagerProtocol, RmEvent};
