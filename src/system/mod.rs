//! System utilities module
//!
//! Thread-safe primitives shared by the identity registry and protocol
//! clients.

use std::sync::atomic::{AtomicU64, Ordering};

/// Wrapper around AtomicU64 for convenience
pub struct AtomicCounter(AtomicU64);

impl AtomicCounter {
    pub fn new(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, value: u64) {
        self.0.store(value, Ordering::SeqCst);
    }

    pub fn increment(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for AtomicCounter {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_returns_the_pre_increment_value() {
        let counter = AtomicCounter::new(1);
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.get(), 2);
    }
}
