//! Token-bucket throttle with a rolling daily quota
//!
//! A [`Throttle`] bounds both the instantaneous rate (a minimum delay
//! between dispatches) and the cumulative rate (a 24 hour quota). The
//! dispatch loop calls [`Throttle::acquire`] before each unit, or
//! [`Throttle::acquire_batch`] before each provider bulk send.
//!
//! # Concurrency
//!
//! A throttle is owned by exactly one dispatch loop for the duration of one
//! bulk operation. All acquisitions take `&mut self` and there is no
//! internal locking. Sharing one throttle between tasks requires an
//! external mutex or a single-writer actor that owns it.

use super::clock::{Clock, TokioClock};
use super::config::{ENV_RATE_PER_MINUTE, positive_or};
use super::decompose::DAY;
use super::rate::delay_for_rate;
use super::{ConfigError, ThrottleError};
use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, SystemTime};


pub const ENV_MAX_PER_DAY: &str = "DISPATCHCRAB_MAX_PER_DAY";
pub const ENV_BULK_WAIT_FRACTION: &str = "DISPATCHCRAB_BULK_WAIT_FRACTION";

/// Provider-side ceiling on one bulk send
pub const DEFAULT_BULK_CEILING: usize = 50;

/// Share of the naive per-unit wait applied to a provider-paced bulk send.
/// Heuristic; re-tune against real provider behaviour.
pub const PROVIDER_PACED_WAIT_FRACTION: f64 = 0.1;

/// How [`Throttle::acquire_batch`] sizes and paces bulk sends
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BulkPolicy {
    /// Largest batch the provider accepts in one bulk call
    pub max_batch_size: usize,
    /// Fraction of `batch_size * delay_per_unit` to wait before a bulk send
    pub wait_fraction: f64,
}

impl BulkPolicy {
    /// Batches are N sequential sends: wait the full per-unit delay for each
    pub fn sequential() -> Self {
        BulkPolicy {
            max_batch_size: DEFAULT_BULK_CEILING,
            wait_fraction: 1.0,
        }
    }

    /// The provider paces units inside a bulk call, so only a fraction of
    /// the naive wait is needed up front
    pub fn provider_paced() -> Self {
        BulkPolicy {
            max_batch_size: DEFAULT_BULK_CEILING,
            wait_fraction: PROVIDER_PACED_WAIT_FRACTION,
        }
    }

    /// Minimum gap to keep before a bulk send of `batch_size` units
    pub fn batch_wait(&self, delay_per_unit: Duration, batch_size: usize) -> Duration {
        let naive_ns = delay_per_unit.as_nanos() as f64 * batch_size as f64;
        Duration::from_nanos((naive_ns * self.wait_fraction).round() as u64)
    }
}

impl Default for BulkPolicy {
    fn default() -> Self {
        Self::sequential()
    }
}

/// Parameters of one throttle instance
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThrottleConfig {
    pub rate_per_minute: u32,
    pub max_per_day: u64,
    pub bulk: BulkPolicy,
}

impl ThrottleConfig {
    /// Generative content endpoint: slow, single calls
    pub fn generation() -> Self {
        ThrottleConfig {
            rate_per_minute: 10,
            max_per_day: 1_500,
            bulk: BulkPolicy::sequential(),
        }
    }

    /// Bulk email endpoint: faster, provider-paced batch sends
    pub fn bulk_email() -> Self {
        ThrottleConfig {
            rate_per_minute: 120,
            max_per_day: 3_000,
            bulk: BulkPolicy::provider_paced(),
        }
    }

    /// Apply environment overrides on top of this preset
    ///
    /// Unusable values are logged and ignored, leaving the preset value.
    pub fn from_lookup<F>(self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut wait_fraction = positive_or(&lookup, ENV_BULK_WAIT_FRACTION, self.bulk.wait_fraction);
        if wait_fraction > 1.0 {
            tracing::warn!(
                key = ENV_BULK_WAIT_FRACTION,
                value = wait_fraction,
                "bulk wait fraction above 1, using preset"
            );
            wait_fraction = self.bulk.wait_fraction;
        }

        ThrottleConfig {
            rate_per_minute: positive_or(&lookup, ENV_RATE_PER_MINUTE, self.rate_per_minute),
            max_per_day: positive_or(&lookup, ENV_MAX_PER_DAY, self.max_per_day),
            bulk: BulkPolicy {
                wait_fraction,
                ..self.bulk
            },
        }
    }

    /// Check a hand-built config
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_per_minute == 0 {
            return Err(ConfigError::Zero("rate_per_minute"));
        }
        if self.max_per_day == 0 {
            return Err(ConfigError::Zero("max_per_day"));
        }
        if self.bulk.max_batch_size == 0 {
            return Err(ConfigError::Zero("bulk.max_batch_size"));
        }
        let fraction = self.bulk.wait_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ConfigError::WaitFraction(fraction.to_string()));
        }
        Ok(())
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self::generation()
    }
}

/// Outcome of a successful acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acquisition {
    /// Units admitted by this acquisition
    pub units: usize,
    /// Time spent suspended before admission
    pub waited: Duration,
    /// When the dispatch was recorded
    pub dispatched_at: SystemTime,
    /// Daily counter after admission
    pub dispatched_today: u64,
}

/// Read-only view of a throttle's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThrottleStats {
    pub dispatched_today: u64,
    pub remaining_today: u64,
    pub max_per_day: u64,
    pub rate_per_minute: u32,
    pub delay_per_unit: Duration,
    pub last_dispatch_at: Option<SystemTime>,
    pub day_window_start: SystemTime,
    pub resets_at: SystemTime,
}

#[derive(Debug, Clone, Copy)]
struct ThrottleState {
    last_dispatch_at: Option<SystemTime>,
    dispatched_today: u64,
    day_window_start: SystemTime,
}

impl ThrottleState {
    fn fresh(now: SystemTime) -> Self {
        ThrottleState {
            last_dispatch_at: None,
            dispatched_today: 0,
            day_window_start: now,
        }
    }
}

/// Anything a dispatch loop can ask for admission
///
/// Implemented by [`Throttle`] itself and by handles that forward to a
/// throttle owned elsewhere, such as a single-writer task.
#[async_trait]
pub trait Gate: Send {
    /// Admit one unit
    async fn acquire(&mut self) -> Result<Acquisition, ThrottleError>;

    /// Admit a whole bulk send atomically
    async fn acquire_batch(&mut self, batch_size: usize) -> Result<Acquisition, ThrottleError>;
}

/// Token-bucket gate for one bulk operation
///
/// # Example
///
/// ```
/// use dispatchcrab::{ManualClock, Throttle, ThrottleConfig};
/// use std::time::{Duration, SystemTime};
///
/// # tokio_test::block_on(async {
/// let clock = ManualClock::new(SystemTime::UNIX_EPOCH);
/// let mut throttle = Throttle::with_clock(ThrottleConfig::generation(), clock.clone());
///
/// throttle.acquire().await.unwrap();
/// let second = throttle.acquire().await.unwrap();
///
/// // 10 per minute: the second call waited out the 6.01s delay
/// assert_eq!(second.waited, Duration::from_millis(6_010));
/// assert_eq!(throttle.stats().dispatched_today, 2);
/// # });
/// ```
pub struct Throttle<C: Clock = TokioClock> {
    config: ThrottleConfig,
    delay_per_unit: Duration,
    clock: C,
    state: ThrottleState,
}

impl Throttle<TokioClock> {
    /// Create a throttle on the wall clock
    pub fn new(config: ThrottleConfig) -> Self {
        Self::with_clock(config, TokioClock)
    }
}

impl<C: Clock> Throttle<C> {
    /// Create a throttle on an injected clock
    pub fn with_clock(config: ThrottleConfig, clock: C) -> Self {
        let state = ThrottleState::fresh(clock.now());
        Throttle {
            delay_per_unit: delay_for_rate(config.rate_per_minute),
            config,
            clock,
            state,
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    pub fn delay_per_unit(&self) -> Duration {
        self.delay_per_unit
    }

    /// Admit one unit, waiting out the per-unit delay if needed
    ///
    /// # Errors
    ///
    /// - [`ThrottleError::DailyQuotaExceeded`]: the daily quota is spent;
    ///   no counters or timestamps are changed
    pub async fn acquire(&mut self) -> Result<Acquisition, ThrottleError> {
        let now = self.clock.now();
        self.roll_day(now);
        self.check_quota(1)?;

        let waited = self.wait_for_gap(now, self.delay_per_unit).await;
        Ok(self.record(1, waited))
    }

    /// Admit a whole bulk send of `batch_size` units atomically
    ///
    /// # Errors
    ///
    /// - [`ThrottleError::InvalidBatchSize`]: `batch_size` is zero
    /// - [`ThrottleError::BatchSizeTooLarge`]: above the provider bulk ceiling
    /// - [`ThrottleError::DailyQuotaExceeded`]: the batch does not fit in
    ///   today's remaining quota; nothing is admitted
    pub async fn acquire_batch(&mut self, batch_size: usize) -> Result<Acquisition, ThrottleError> {
        if batch_size == 0 {
            return Err(ThrottleError::InvalidBatchSize(batch_size));
        }
        if batch_size > self.config.bulk.max_batch_size {
            return Err(ThrottleError::BatchSizeTooLarge {
                requested: batch_size,
                max: self.config.bulk.max_batch_size,
            });
        }

        let now = self.clock.now();
        self.roll_day(now);
        self.check_quota(batch_size as u64)?;

        let gap = self.config.bulk.batch_wait(self.delay_per_unit, batch_size);
        let waited = self.wait_for_gap(now, gap).await;
        Ok(self.record(batch_size, waited))
    }

    /// Current counters, without side effects
    pub fn stats(&self) -> ThrottleStats {
        ThrottleStats {
            dispatched_today: self.state.dispatched_today,
            remaining_today: self
                .config
                .max_per_day
                .saturating_sub(self.state.dispatched_today),
            max_per_day: self.config.max_per_day,
            rate_per_minute: self.config.rate_per_minute,
            delay_per_unit: self.delay_per_unit,
            last_dispatch_at: self.state.last_dispatch_at,
            day_window_start: self.state.day_window_start,
            resets_at: self.resets_at(),
        }
    }

    /// Clear all counters and restart the day window now
    ///
    /// Meant for test harnesses.
    pub fn reset(&mut self) {
        self.state = ThrottleState::fresh(self.clock.now());
    }

    fn resets_at(&self) -> SystemTime {
        self.state.day_window_start + DAY
    }

    fn roll_day(&mut self, now: SystemTime) {
        let expired = now
            .duration_since(self.state.day_window_start)
            .is_ok_and(|age| age >= DAY);

        if expired {
            tracing::info!(
                dispatched = self.state.dispatched_today,
                "daily quota window rolled over"
            );
            self.state.dispatched_today = 0;
            self.state.day_window_start = now;
        }
    }

    fn check_quota(&self, units: u64) -> Result<(), ThrottleError> {
        let dispatched = self.state.dispatched_today;
        let limit = self.config.max_per_day;

        if dispatched.saturating_add(units) > limit {
            let resets_at = self.resets_at();
            tracing::warn!(dispatched, limit, units, "daily quota exceeded");
            return Err(ThrottleError::DailyQuotaExceeded {
                resets_at,
                dispatched,
                limit,
            });
        }
        Ok(())
    }

    async fn wait_for_gap(&self, now: SystemTime, gap: Duration) -> Duration {
        let Some(last) = self.state.last_dispatch_at else {
            return Duration::ZERO;
        };

        // A clock that stepped backwards counts as no time elapsed
        let elapsed = now.duration_since(last).unwrap_or(Duration::ZERO);
        if elapsed >= gap {
            return Duration::ZERO;
        }

        let wait = gap - elapsed;
        tracing::debug!(wait_ms = wait.as_millis() as u64, "throttling dispatch");
        self.clock.sleep(wait).await;
        wait
    }

    fn record(&mut self, units: usize, waited: Duration) -> Acquisition {
        let dispatched_at = self.clock.now();
        self.state.last_dispatch_at = Some(dispatched_at);
        self.state.dispatched_today += units as u64;

        tracing::debug!(
            units,
            dispatched_today = self.state.dispatched_today,
            "dispatch admitted"
        );

        Acquisition {
            units,
            waited,
            dispatched_at,
            dispatched_today: self.state.dispatched_today,
        }
    }
}

#[async_trait]
impl<C: Clock> Gate for Throttle<C> {
    async fn acquire(&mut self) -> Result<Acquisition, ThrottleError> {
        Throttle::acquire(self).await
    }

    async fn acquire_batch(&mut self, batch_size: usize) -> Result<Acquisition, ThrottleError> {
        Throttle::acquire_batch(self, batch_size).await
    }
}
