//! Time source for the throttle
//!
//! Every "now" read and every wait in the throttle goes through a [`Clock`],
//! so day rollover and pacing can be tested without real sleeping.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Injectable clock used by [`Throttle`](super::Throttle)
///
/// `sleep` is the only suspension point in the scheduler. It is async so the
/// same throttle runs on a current-thread or a multi-threaded runtime.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current wall-clock time
    fn now(&self) -> SystemTime;

    /// Suspend the caller for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by [`tokio::time::sleep`]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Simulated clock for tests and dry runs
///
/// Clones share the same underlying time, so a test can keep one handle
/// while the throttle owns another. Sleeping advances time instantly.
///
/// # Example
///
/// ```
/// use dispatchcrab::{Clock, ManualClock};
/// use std::time::{Duration, SystemTime};
///
/// let clock = ManualClock::new(SystemTime::UNIX_EPOCH);
/// clock.advance(Duration::from_secs(90));
/// assert_eq!(clock.now(), SystemTime::UNIX_EPOCH + Duration::from_secs(90));
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Debug)]
struct ManualState {
    now: SystemTime,
    slept: Duration,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: SystemTime) -> Self {
        ManualClock {
            inner: Arc::new(Mutex::new(ManualState {
                now: start,
                slept: Duration::ZERO,
            })),
        }
    }

    /// Move time forward without counting it as sleep
    pub fn advance(&self, by: Duration) {
        self.inner.lock().now += by;
    }

    /// Total time spent in [`Clock::sleep`] so far
    pub fn total_slept(&self) -> Duration {
        self.inner.lock().slept
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(SystemTime::now())
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        self.inner.lock().now
    }

    async fn sleep(&self, duration: Duration) {
        let mut state = self.inner.lock();
        state.now += duration;
        state.slept += duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_sleep_advances_time() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let clock = ManualClock::new(start);
        let handle = clock.clone();

        clock.sleep(Duration::from_secs(6)).await;
        handle.advance(Duration::from_secs(4));

        assert_eq!(clock.now(), start + Duration::from_secs(10));
        assert_eq!(handle.total_slept(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_sleep_uses_runtime_timer() {
        let before = tokio::time::Instant::now();
        TokioClock.sleep(Duration::from_secs(30)).await;
        assert!(before.elapsed() >= Duration::from_secs(30));
    }
}
