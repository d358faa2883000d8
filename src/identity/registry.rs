use std::fmt;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::system::AtomicCounter;

/// A stable logical-worker name derived from `(process-kind, monotonically
/// increasing integer)`, decoupled from any particular container that
/// currently embodies it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(String);

impl Identity {
    pub(crate) fn new(process_kind: &str, counter: u64) -> Self {
        Self(format!("{process_kind}_{counter}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generates and recycles logical worker identities.
///
/// Generation: identity = `<process-kind>_<counter>` where the counter is
/// a process-wide monotonic integer starting at 1. Recycling preserves
/// insertion order on the unused queue (FIFO). Retry state belongs to the
/// supervisor's container record (`supervisor::record::RetryCounters`), not
/// here, since it must survive recycling of the identity this registry hands
/// back out.
pub struct IdentityRegistry {
    process_kind: String,
    counter: AtomicCounter,
    unused: (Sender<Identity>, Receiver<Identity>),
}

impl IdentityRegistry {
    pub fn new(process_kind: impl Into<String>) -> Self {
        Self {
            process_kind: process_kind.into(),
            // increment() returns the pre-increment value, so seed at 1 to
            // match spec.md's "starting at 1".
            counter: AtomicCounter::new(1),
            unused: unbounded(),
        }
    }

    /// Take the next identity: a recycled one if the unused queue is
    /// non-empty (FIFO), otherwise a freshly generated one.
    pub fn acquire(&self) -> Identity {
        match self.unused.1.try_recv() {
            Ok(identity) => identity,
            Err(_) => {
                let n = self.counter.increment();
                Identity::new(&self.process_kind, n)
            }
        }
    }

    /// Return an identity to the unused queue so a future `acquire` can
    /// reuse it.
    pub fn recycle(&self, identity: Identity) {
        // An unbounded channel send only fails if every receiver has been
        // dropped, which can't happen while `self` is alive.
        let _ = self.unused.0.send(identity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_starts_at_one_and_increments() {
        let reg = IdentityRegistry::new("worker");
        assert_eq!(reg.acquire().as_str(), "worker_1");
        assert_eq!(reg.acquire().as_str(), "worker_2");
    }

    #[test]
    fn recycled_identities_are_reused_before_new_ones_in_fifo_order() {
        let reg = IdentityRegistry::new("worker");
        let a = reg.acquire();
        let b = reg.acquire();
        reg.recycle(a.clone());
        reg.recycle(b.clone());

        assert_eq!(reg.acquire(), a);
        assert_eq!(reg.acquire(), b);
        assert_eq!(reg.acquire().as_str(), "worker_3");
    }
}
