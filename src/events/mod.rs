//! Event system module
//!
//! Provides a pub/sub event bus for broadcasting the control events that
//! drive the supervisor's container lifecycle.

mod bus;

pub use bus::{Event, EventBus};
