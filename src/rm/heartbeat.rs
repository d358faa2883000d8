//! Heartbeat cadence for the resource-manager client, adapted from this
//! repository's cron job scheduler: a single named, cancellable interval
//! task rather than the full multi-job `Scheduler`, since the resource
//! manager only ever needs one.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

/// Handle to a running heartbeat task; dropping it does not stop the task,
/// `cancel` must be called explicitly (mirrors `cron::scheduler::JobHandle`).
pub struct HeartbeatHandle {
    cancelled: Arc<AtomicBool>,
}

impl HeartbeatHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Spawn a task that invokes `tick` on `interval`, stopping once the
/// returned handle is cancelled.
pub fn spawn<F, Fut>(name: &'static str, interval: Duration, tick: F) -> HeartbeatHandle
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let cancelled = Arc::new(AtomicBool::new(false));
    let handle = HeartbeatHandle { cancelled: cancelled.clone() };

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if cancelled.load(Ordering::SeqCst) {
                debug!(name, "heartbeat stopping");
                break;
            }
            tick().await;
        }
    });

    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn cancelling_the_handle_stops_further_ticks() {
        let count = Arc::new(AtomicU32::new(0));
        let count2 = count.clone();

        let handle = spawn("test", Duration::from_millis(5), move || {
            let count = count2.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.cancel();
        let observed = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), observed);
        assert!(observed > 0);
    }
}
