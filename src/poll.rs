//! Bounded fixed-interval polling.
//!
//! Both waits in a search session are instances of the same pattern: probe an
//! external condition, sleep a fixed interval, give up after a fixed number
//! of attempts. `PollPolicy` makes the interval and attempt cap explicit, and
//! `poll_until` runs the loop on the tokio clock so callers never block a
//! thread and tests can drive it with a paused clock.

use std::future::Future;
use std::time::Duration;

/// Outcome of a single poll probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    /// The awaited value is available.
    Ready(T),
    /// Not available yet; retry after the interval.
    NotReady,
    /// A hard failure; stop polling immediately.
    Abort,
}

/// A fixed-interval, fixed-attempt-cap polling budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between consecutive probes.
    pub interval: Duration,
    /// Maximum number of probes before giving up.
    pub max_attempts: u32,
}

impl PollPolicy {
    /// Creates a new polling policy.
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Result-slot polling budget: 1s interval, 60 attempts.
    pub const fn result_slot() -> Self {
        Self::new(Duration::from_secs(1), 60)
    }

    /// Challenge-solving budget: 5s interval, 30 attempts.
    pub const fn challenge() -> Self {
        Self::new(Duration::from_secs(5), 30)
    }

    /// Total time this policy can spend sleeping.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

/// Polls `probe` under the given policy until it yields `Ready`, aborts, or
/// the attempt cap is exhausted.
///
/// The probe runs once per attempt; the interval sleep is skipped after the
/// final attempt. `NotReady` after the last attempt and `Abort` both yield
/// `None`.
pub async fn poll_until<T, F, Fut>(policy: PollPolicy, mut probe: F) -> Option<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Probe<T>>,
{
    for attempt in 0..policy.max_attempts {
        match probe(attempt).await {
            Probe::Ready(value) => return Some(value),
            Probe::Abort => return None,
            Probe::NotReady => {}
        }
        if attempt + 1 < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }
    None
}
