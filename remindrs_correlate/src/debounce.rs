//! Fire-and-forget delayed execution.
//!
//! There is deliberately no cancellation API: scheduled work re-checks
//! buffer state at fire time and is a no-op when its target entry is gone
//! or already consumed, so a stale wake-up is harmless.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Run `task` once, after `delay`, without blocking the caller.
pub fn after<F>(delay: Duration, task: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        sleep(delay).await;
        task.await;
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay_not_before() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        after(Duration::from_secs(5), async move {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(!fired.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(fired.load(Ordering::SeqCst));
    }
}
