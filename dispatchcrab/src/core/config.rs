//! Rate configuration
//!
//! [`RateLimitConfig`] is read once when a bulk operation starts and stays
//! fixed for its lifetime. Changing provider tier means building a new one.
//!
//! # Environment
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `DISPATCHCRAB_RATE_PER_MINUTE` | Provider throughput ceiling | 10 |
//! | `DISPATCHCRAB_SAFE_WINDOW_SECS` | Wall-clock budget for one run | 50 |
//! | `DISPATCHCRAB_HARD_UNIT_CAP` | Maximum units per bulk request | 90 |
//!
//! Missing, non-numeric or zero values fall back to the defaults above.

use super::ConfigError;
use serde::Serialize;
use std::str::FromStr;

pub const ENV_RATE_PER_MINUTE: &str = "DISPATCHCRAB_RATE_PER_MINUTE";
pub const ENV_SAFE_WINDOW_SECS: &str = "DISPATCHCRAB_SAFE_WINDOW_SECS";
pub const ENV_HARD_UNIT_CAP: &str = "DISPATCHCRAB_HARD_UNIT_CAP";

/// Conservative provider rate used when none is configured
pub const DEFAULT_RATE_PER_MINUTE: u32 = 10;
/// Leaves a margin under a 60 second host timeout
pub const DEFAULT_SAFE_WINDOW_SECS: u32 = 50;
/// Ninety daily slices, one quarter of periodic content
pub const DEFAULT_HARD_UNIT_CAP: u64 = 90;

/// Immutable provider quota and host execution budget
///
/// # Example
///
/// ```
/// use dispatchcrab::RateLimitConfig;
///
/// let config = RateLimitConfig::new(10, 50, 90).unwrap();
/// assert_eq!(config.rate_per_minute(), 10);
///
/// // Zero is rejected when building explicitly
/// assert!(RateLimitConfig::new(0, 50, 90).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitConfig {
    rate_per_minute: u32,
    safe_execution_window_secs: u32,
    hard_unit_cap: u64,
}

impl RateLimitConfig {
    /// Build a config, rejecting zero values
    pub fn new(
        rate_per_minute: u32,
        safe_execution_window_secs: u32,
        hard_unit_cap: u64,
    ) -> Result<Self, ConfigError> {
        if rate_per_minute == 0 {
            return Err(ConfigError::Zero("rate_per_minute"));
        }
        if safe_execution_window_secs == 0 {
            return Err(ConfigError::Zero("safe_execution_window_secs"));
        }
        if hard_unit_cap == 0 {
            return Err(ConfigError::Zero("hard_unit_cap"));
        }

        Ok(RateLimitConfig {
            rate_per_minute,
            safe_execution_window_secs,
            hard_unit_cap,
        })
    }

    /// Read the config from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the config through an arbitrary key lookup
    ///
    /// Never fails: every field that is missing or unusable falls back to
    /// its documented default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        RateLimitConfig {
            rate_per_minute: positive_or(&lookup, ENV_RATE_PER_MINUTE, DEFAULT_RATE_PER_MINUTE),
            safe_execution_window_secs: positive_or(
                &lookup,
                ENV_SAFE_WINDOW_SECS,
                DEFAULT_SAFE_WINDOW_SECS,
            ),
            hard_unit_cap: positive_or(&lookup, ENV_HARD_UNIT_CAP, DEFAULT_HARD_UNIT_CAP),
        }
    }

    pub fn rate_per_minute(&self) -> u32 {
        self.rate_per_minute
    }

    pub fn safe_execution_window_secs(&self) -> u32 {
        self.safe_execution_window_secs
    }

    pub fn hard_unit_cap(&self) -> u64 {
        self.hard_unit_cap
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            rate_per_minute: DEFAULT_RATE_PER_MINUTE,
            safe_execution_window_secs: DEFAULT_SAFE_WINDOW_SECS,
            hard_unit_cap: DEFAULT_HARD_UNIT_CAP,
        }
    }
}

/// Parse a strictly positive value, logging and falling back otherwise
pub(crate) fn positive_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default + Copy + std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };

    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => value,
        _ => {
            tracing::warn!(key, value = %raw, fallback = %default, "unusable config value, using default");
            default
        }
    }
}
