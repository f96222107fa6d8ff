//! Core components of the dispatchcrab scheduler
//!
//! This module contains the building blocks a bulk request flows through,
//! top-down:
//! - [`rate`]: Derives the inter-dispatch delay and safe batch size
//! - [`decompose`]: Splits a bounded range into ordered work units
//! - [`batch`]: Packs units into sequential batches with time estimates
//! - [`throttle`]: Token-bucket gate with a rolling daily quota
//!
//! plus the glue around them:
//! - [`clock`]: Injectable time source used by the throttle
//! - [`config`]: Rate configuration with lenient environment loading
//! - [`planner`]: One-call decompose and pack
//! - [`dispatch`]: Serial dispatch loop driving an opaque operation

pub mod batch;
pub mod clock;
pub mod config;
pub mod decompose;
pub mod dispatch;
pub mod planner;
pub mod rate;
pub mod throttle;

pub use batch::{Batch, ExecutionPlan, pack_batches};
pub use clock::{Clock, ManualClock, TokioClock};
pub use config::RateLimitConfig;
pub use decompose::{DAY, Decomposition, Span, WorkUnit, decompose};
pub use dispatch::{DispatchMode, DispatchOp, DispatchReport, Dispatcher, Flow, StopReason};
pub use planner::plan;
pub use rate::RateModel;
pub use throttle::{Acquisition, BulkPolicy, Gate, Throttle, ThrottleConfig, ThrottleStats};

use std::time::SystemTime;
use thiserror::Error;

/// Errors produced while turning a bulk range into work units
///
/// All variants are fatal to the call that produced them and no partial
/// result is returned alongside.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// `start >= end`, or the step is smaller than one unit
    #[error("invalid range: start must be before end and step must be at least 1")]
    InvalidRange,
    /// The range would produce more units than the hard cap allows
    #[error(
        "range needs {requested} units but at most {allowed} are allowed; reduce the range or increase the step"
    )]
    CapExceeded { requested: u64, allowed: u64 },
    /// A valid range produced no units
    #[error("decomposition produced no units")]
    EmptyResult,
}

/// Errors returned by [`Throttle`] acquisitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThrottleError {
    /// The rolling daily quota has no room for this acquisition
    #[error("daily quota exhausted ({dispatched}/{limit}); quota resets at {} (unix seconds)", unix_secs(.resets_at))]
    DailyQuotaExceeded {
        resets_at: SystemTime,
        dispatched: u64,
        limit: u64,
    },
    /// Batch acquisitions must cover at least one unit
    #[error("invalid batch size: {0}")]
    InvalidBatchSize(usize),
    /// The provider refuses bulk sends above this size
    #[error("batch size {requested} exceeds the provider bulk ceiling of {max}")]
    BatchSizeTooLarge { requested: usize, max: usize },
    /// The throttle owner is gone and can no longer admit anything
    #[error("throttle is no longer accepting acquisitions")]
    Closed,
}

/// Errors raised when constructing configuration explicitly
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A numeric field that must be positive was zero
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    /// The bulk wait fraction must be in (0, 1]
    #[error("bulk wait fraction must be in (0, 1], got {0}")]
    WaitFraction(String),
}

fn unix_secs(at: &SystemTime) -> u64 {
    at.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
