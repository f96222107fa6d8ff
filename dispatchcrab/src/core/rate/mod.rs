//! Rate derivation for bulk dispatch
//!
//! This module provides the [`RateModel`] type, a pure function of the
//! provider quota and the host execution budget. It converts
//! "N requests per minute within a W second window" into the delay to keep
//! between dispatches and the largest batch that fits the window.

use super::RateLimitConfig;
use serde::Serialize;
use std::time::Duration;


/// Padding added to every per-unit delay so rounding never under-throttles
pub const SAFETY_PADDING: Duration = Duration::from_millis(10);

/// Absolute ceiling on batch size, whatever the rate tier allows
pub const MAX_BATCH_CEILING: usize = 50;

/// Inter-dispatch delay and safe batch size for one configuration
///
/// Derive a fresh model whenever the configuration changes; a model is
/// never reused across provider tiers.
///
/// # Examples
///
/// ```
/// use dispatchcrab::RateModel;
/// use std::time::Duration;
///
/// // 10 requests per minute inside a 50 second budget
/// let model = RateModel::from_rate(10, 50);
/// assert_eq!(model.delay_per_unit(), Duration::from_millis(6_010));
/// assert_eq!(model.max_batch_size(), 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateModel {
    delay_per_unit: Duration,
    max_batch_size: usize,
}

impl RateModel {
    /// Derive the model from a validated configuration
    pub fn derive(config: &RateLimitConfig) -> Self {
        Self::from_rate(config.rate_per_minute(), config.safe_execution_window_secs())
    }

    /// Derive the model from raw rate and window values
    ///
    /// # Parameters
    ///
    /// - `rate_per_minute`: Provider throughput ceiling; zero is treated as one
    /// - `safe_window_secs`: Wall-clock budget for one dispatch loop
    pub fn from_rate(rate_per_minute: u32, safe_window_secs: u32) -> Self {
        let delay_per_unit = delay_for_rate(rate_per_minute);

        let window = Duration::from_secs(safe_window_secs as u64);
        let fits = (window.as_millis() / delay_per_unit.as_millis()) as usize;

        // A batch must always make progress, even in a pathological window
        let max_batch_size = fits.clamp(1, MAX_BATCH_CEILING);

        RateModel {
            delay_per_unit,
            max_batch_size,
        }
    }

    /// Minimum delay between two single-unit dispatches, padding included
    pub fn delay_per_unit(&self) -> Duration {
        self.delay_per_unit
    }

    /// Largest batch that fits the safe execution window
    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Estimated wall-clock seconds to dispatch `units` units, rounded up
    pub fn estimate_secs(&self, units: usize) -> u64 {
        let total = self.delay_per_unit.as_millis() * units as u128;
        total.div_ceil(1_000) as u64
    }
}

/// `ceil(60 / rate)` whole seconds plus [`SAFETY_PADDING`]
pub fn delay_for_rate(rate_per_minute: u32) -> Duration {
    let rate = rate_per_minute.max(1) as u64;
    Duration::from_secs(60u64.div_ceil(rate)) + SAFETY_PADDING
}
