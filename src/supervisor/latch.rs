use std::time::Duration;

use tokio::sync::Notify;

/// Wait/notify discipline for graceful shutdown: the supervisor waits up to
/// 5 minutes for the container record to drain, and is woken the moment it
/// does. Notification is level-based on the caller-supplied drained check,
/// not edge-triggered, so a drain that completes before `wait` is ever
/// called is still observed correctly.
#[derive(Default)]
pub struct ShutdownLatch {
    notify: Notify,
}

impl ShutdownLatch {
    pub fn new() -> Self {
        Self { notify: Notify::new() }
    }

    /// Called from the NM `onContainerStopped` handler once the container
    /// record shrinks. Wakes anyone waiting iff the record is now empty.
    pub fn notify_if_drained(&self, remaining: usize) {
        if remaining == 0 {
            self.notify.notify_waiters();
        }
    }

    /// Wait for `already_drained` to become true, or for `timeout` to
    /// elapse. Returns whether the record was observed drained.
    pub async fn wait_until(&self, already_drained: impl Fn() -> bool, timeout: Duration) -> bool {
        // Register the notified future before checking the condition so a
        // notify_if_drained call racing with this one is never missed.
        let notified = self.notify.notified();
        tokio::pin!(notified);

        if already_drained() {
            return true;
        }

        match tokio::time::timeout(timeout, notified).await {
            Ok(()) => true,
            Err(_) => already_drained(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn returns_immediately_when_already_drained() {
        let latch = ShutdownLatch::new();
        let drained = latch.wait_until(|| true, Duration::from_secs(1)).await;
        assert!(drained);
    }

    #[tokio::test]
    async fn wakes_up_when_notified_before_timeout() {
        let latch = Arc::new(ShutdownLatch::new());
        let remaining = Arc::new(std::sync::atomic::AtomicUsize::new(1));

        let latch2 = latch.clone();
        let remaining2 = remaining.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            remaining2.store(0, std::sync::atomic::Ordering::SeqCst);
            latch2.notify_if_drained(0);
        });

        let drained = latch
            .wait_until(|| remaining.load(std::sync::atomic::Ordering::SeqCst) == 0, Duration::from_secs(5))
            .await;
        assert!(drained);
    }

    #[tokio::test]
    async fn times_out_when_never_notified() {
        let latch = ShutdownLatch::new();
        let drained = latch.wait_until(|| false, Duration::from_millis(20)).await;
        assert!(!drained);
    }
}
