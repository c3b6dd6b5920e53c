// ── Reconnect scheduler ──
//
// Backoff table, cursor and the single armed timer. Knows nothing about
// why a reconnect is wanted; the engine decides that.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::DEFAULT_BACKOFF_SECS;

/// Computes reconnect delays from a fixed ascending table and owns at most
/// one armed timer.
///
/// The cursor advances on every [`schedule`](Self::schedule) and saturates
/// on the last table entry. A success is expressed as
/// [`reset`](Self::reset) plus [`cancel`](Self::cancel).
#[derive(Debug)]
pub struct ReconnectScheduler {
    delays: Vec<Duration>,
    cursor: usize,
    last_ticket: u64,
    timer: Option<(u64, JoinHandle<()>)>,
}

impl ReconnectScheduler {
    /// An empty table falls back to the default delays.
    pub fn new(delays: Vec<Duration>) -> Self {
        let delays = if delays.is_empty() {
            DEFAULT_BACKOFF_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect()
        } else {
            delays
        };
        Self {
            delays,
            cursor: 0,
            last_ticket: 0,
            timer: None,
        }
    }

    /// Arm the timer for the delay at the cursor, replacing any armed one.
    ///
    /// `on_fire` runs on the runtime once the delay elapses and receives
    /// the ticket returned here. Returns `(ticket, delay)`.
    pub fn schedule<F>(&mut self, on_fire: F) -> (u64, Duration)
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();

        let delay = self.next_delay();
        self.cursor = (self.cursor + 1).min(self.delays.len() - 1);
        self.last_ticket += 1;
        let ticket = self.last_ticket;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(ticket);
        });
        self.timer = Some((ticket, handle));

        tracing::debug!(ticket, delay_ms = delay.as_millis(), "reconnect armed");
        (ticket, delay)
    }

    /// Disarm the timer. Idempotent.
    pub fn cancel(&mut self) {
        if let Some((ticket, handle)) = self.timer.take() {
            handle.abort();
            tracing::trace!(ticket, "reconnect timer cancelled");
        }
    }

    /// Zero the cursor. An armed timer stays armed.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Claim a fired timer. `false` when the ticket was cancelled or
    /// superseded after it fired.
    pub fn take_if_current(&mut self, ticket: u64) -> bool {
        match self.timer {
            Some((armed, _)) if armed == ticket => {
                self.timer = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    /// Delay the next `schedule` will use.
    pub fn next_delay(&self) -> Duration {
        self.delays[self.cursor]
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl Drop for ReconnectScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
