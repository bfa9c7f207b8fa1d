use crate::domain_port::{DeferredEffect, DeferredTaskScheduler};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

/// Runs deferred effects on the current Tokio runtime.
///
/// On [`shutdown`](TokioTaskScheduler::shutdown) every pending effect runs
/// right away instead of waiting out its delay, so no superseded token is
/// orphaned by a restart.
#[derive(Debug, Default, Clone)]
pub struct TokioTaskScheduler {
    tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl TokioTaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    pub async fn shutdown(&self) {
        info!(pending = self.tracker.len(), "flushing deferred tasks");
        self.cancellation_token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl DeferredTaskScheduler for TokioTaskScheduler {
    fn schedule(&self, effect: DeferredEffect, delay: Duration) {
        let cancellation_token = self.cancellation_token.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancellation_token.cancelled() => {}
            }
            effect.await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> DeferredEffect {
        let counter = counter.clone();
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn effects_run_after_their_delay() {
        let scheduler = TokioTaskScheduler::new();
        let ran = Arc::new(AtomicUsize::new(0));
        scheduler.schedule(counting(&ran), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_flushes_pending_effects() {
        let scheduler = TokioTaskScheduler::new();
        let ran = Arc::new(AtomicUsize::new(0));
        scheduler.schedule(counting(&ran), Duration::from_secs(3600));
        scheduler.schedule(counting(&ran), Duration::from_secs(7200));

        let started = tokio::time::Instant::now();
        scheduler.shutdown().await;

        assert_eq!(ran.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
