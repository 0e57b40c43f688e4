//! Retry timing for connect loops.

use std::time::Duration;

/// Shortest wait a backoff sequence produces.
const MIN_DELAY: Duration = Duration::from_millis(1);

/// Timing of the bulk-connect and per-client reconnect loops.
///
/// The wait between attempts starts at `initial_delay` and grows by
/// `multiplier` after every wait, capped at `max_delay`. Attempts are never
/// exhausted; a loop only ends when its client connects or the registry is
/// cancelled.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Wait before the first retry.
    pub initial_delay: Duration,

    /// Upper bound on the wait between attempts.
    pub max_delay: Duration,

    /// Growth factor applied after each wait (1.0 = fixed interval).
    pub multiplier: f64,

    /// Bulk connect logs the pending clients every this many ticks.
    pub bulk_progress_every: u32,

    /// A single-client reconnect logs progress every this many attempts.
    pub reconnect_progress_every: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            bulk_progress_every: 100,
            reconnect_progress_every: 10,
        }
    }
}

impl RetryPolicy {
    /// A policy polling at a fixed interval.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial_delay: interval,
            max_delay: interval,
            multiplier: 1.0,
            ..Self::default()
        }
    }

    /// Starts a fresh backoff sequence.
    pub fn backoff(&self) -> Backoff {
        let initial = self.initial_delay.max(MIN_DELAY);
        Backoff {
            current: initial,
            max: self.max_delay.max(initial),
            multiplier: self.multiplier.max(1.0),
        }
    }
}

/// Sequence of waits produced by a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max: Duration,
    multiplier: f64,
}

impl Backoff {
    /// Returns the next wait and advances the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.multiplier)
            .map_or(self.max, |next| next.min(self.max));
        delay
    }
}

/// True on every `every`-th tick; never when `every` is zero.
pub(crate) fn is_progress_tick(tick: u32, every: u32) -> bool {
    every != 0 && tick % every == 0
}
