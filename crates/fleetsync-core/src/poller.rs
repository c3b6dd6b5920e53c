// ── Fallback poller ──
//
// Fixed-interval full refresh while the push channel is down.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Shortest accepted period; smaller values, zero included, are raised to it.
pub const MIN_POLL_PERIOD: Duration = Duration::from_secs(1);

/// Repeating timer that invokes a tick callback at a fixed period.
///
/// The callback only requests work (the engine performs the refresh), so
/// a slow or failed refresh never delays the next tick.
#[derive(Debug, Default)]
pub struct FallbackPoller {
    running: Option<(CancellationToken, JoinHandle<()>)>,
}

impl FallbackPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking. The first tick comes one full `period` after start.
    /// No-op while already running.
    pub fn start<F>(&mut self, period: Duration, on_tick: F)
    where
        F: Fn() + Send + 'static,
    {
        if self.is_running() {
            return;
        }
        if period < MIN_POLL_PERIOD {
            tracing::warn!(?period, "poll period too short, using the minimum");
        }
        let period = period.max(MIN_POLL_PERIOD);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = task_cancel.cancelled() => break,
                    _ = interval.tick() => on_tick(),
                }
            }
        });
        self.running = Some((cancel, handle));
        tracing::info!(period_secs = period.as_secs(), "fallback polling started");
    }

    /// Stop ticking. Safe to call when not running.
    pub fn stop(&mut self) {
        if let Some((cancel, handle)) = self.running.take() {
            cancel.cancel();
            handle.abort();
            tracing::info!("fallback polling stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

impl Drop for FallbackPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        (count, move || {
            sink.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_after_one_period() {
        let mut poller = FallbackPoller::new();
        let (count, on_tick) = counter();
        poller.start(Duration::from_secs(30), on_tick);

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_is_raised_to_the_minimum() {
        let mut poller = FallbackPoller::new();
        let (count, on_tick) = counter();
        poller.start(Duration::ZERO, on_tick);

        tokio::time::sleep(MIN_POLL_PERIOD * 3 + Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_running_is_noop() {
        let mut poller = FallbackPoller::new();
        let (count, on_tick) = counter();
        poller.start(Duration::from_secs(10), on_tick);
        let (other, on_tick) = counter();
        poller.start(Duration::from_secs(1), on_tick);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(other.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_halts_ticks() {
        let mut poller = FallbackPoller::new();
        poller.stop();

        let (count, on_tick) = counter();
        poller.start(Duration::from_secs(5), on_tick);
        poller.stop();
        poller.stop();
        assert!(!poller.is_running());

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
