//! Event bus for pub/sub messaging
//!
//! In-process publish/subscribe surface for the control events the
//! container supervisor both produces and consumes (spec.md §4.6).
//! Delivery is synchronous to subscribers and ordered per publisher;
//! subscribers may re-publish (e.g. the supervisor re-enters itself when a
//! completion handler publishes `NewContainerRequest`), which is why the
//! bus is built on `tokio::sync::broadcast` rather than a single mpsc: a
//! broadcast send never blocks on a slow or re-entrant subscriber.

use tracing::debug;

use crate::types::ContainerDescriptor;
use tokio::sync::broadcast;

/// Control events carried by the bus.
#[derive(Debug, Clone)]
pub enum Event {
    /// A container completed (or failed to start) and the supervisor wants
    /// a replacement. `replaced_container` carries the completed
    /// container's descriptor when the host-affinity rule (spec.md
    /// §4.1.1) applies it as a preferred-node hint; `None` otherwise.
    NewContainerRequest {
        replaced_container: Option<ContainerDescriptor>,
    },

    /// Stop every container named here. Published during the transition to
    /// the `Stopping` phase.
    ContainerShutdownRequest { containers: Vec<ContainerDescriptor> },

    /// The application master itself should shut down: published on a
    /// resource-manager shutdown callback or RM transport error.
    ApplicationMasterShutdownRequest,
}

/// Event bus for broadcasting control events to multiple subscribers.
///
/// Uses a tokio broadcast channel for efficient pub/sub messaging.
/// Subscribers that fall behind will lose messages (lagged).
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    // Keep a receiver alive so the channel never closes even with zero
    // external subscribers.
    _receiver: broadcast::Receiver<Event>,
}

impl EventBus {
    /// Create a new event bus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new event bus with custom capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender, _receiver }
    }

    /// Subscribe to the event bus.
    ///
    /// Returns a receiver that will receive all events published after
    /// subscribing. If the subscriber falls behind, it will receive a
    /// `RecvError::Lagged` error.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers.
    ///
    /// If there are no subscribers, the event is silently dropped. Returns
    /// the number of receivers that received the event.
    pub fn publish(&self, event: Event) -> usize {
        let receivers = self.sender.send(event).unwrap_or(0);
        debug!(receivers, "published control event");
        receivers
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            _receiver: self.sender.subscribe(),
        }
    }
}
