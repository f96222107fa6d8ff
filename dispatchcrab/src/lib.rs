//! # DispatchCrab
//!
//! A throttled bulk-dispatch scheduler for Rust.
//!
//! ## Overview
//!
//! DispatchCrab turns an oversized unit-of-work request ("generate 90 days of
//! content", "email 10 000 subscribers") into a sequence of rate-limited
//! dispatches that respect:
//! - **A provider quota**: requests per minute, enforced as a minimum delay
//! - **A daily cap**: a rolling 24 hour quota with day-boundary reset
//! - **A host execution window**: batches are sized to fit a fixed
//!   wall-clock budget, such as a serverless function timeout
//!
//! ## Quick Start
//!
//! ```
//! use dispatchcrab::{
//!     DispatchMode, DispatchOp, Dispatcher, ManualClock, RateLimitConfig, Throttle,
//!     ThrottleConfig, WorkUnit, plan,
//! };
//! use std::time::SystemTime;
//!
//! struct Notify;
//!
//! #[async_trait::async_trait]
//! impl DispatchOp<u64> for Notify {
//!     type Error = String;
//!
//!     async fn dispatch(&mut self, unit: &WorkUnit<u64>) -> Result<(), String> {
//!         println!("notify subscribers {}..{}", unit.range_start, unit.range_end);
//!         Ok(())
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! // 120 requests per minute, 50 second budget, at most 100 units
//! let config = RateLimitConfig::new(120, 50, 100).unwrap();
//!
//! // 10 000 subscribers in chunks of 250
//! let plan = plan(0u64, 10_000, 250, &config).unwrap();
//! assert_eq!(plan.total_units(), 40);
//!
//! let clock = ManualClock::new(SystemTime::UNIX_EPOCH);
//! let mut throttle = Throttle::with_clock(ThrottleConfig::bulk_email(), clock);
//! let report = Dispatcher::new(&mut throttle, DispatchMode::PerUnit)
//!     .run(&plan, &mut Notify)
//!     .await;
//!
//! assert!(report.is_complete());
//! assert_eq!(report.dispatched, 40);
//! # });
//! ```
//!
//! ## Components
//!
//! ### [`RateModel`]
//! Pure derivation of the per-unit delay (`ceil(60 / rate)` seconds plus a
//! small padding) and the largest batch that fits the execution window.
//!
//! ### [`decompose`]
//! Splits `[start, end)` into contiguous [`WorkUnit`]s, failing fast with
//! [`PlanError::CapExceeded`] as soon as the hard unit cap is crossed.
//!
//! ### [`pack_batches`]
//! Greedy, order-preserving packing into [`Batch`]es with per-batch and
//! total time estimates.
//!
//! ### [`Throttle`]
//! Token-bucket gate with single-unit and bulk acquisition, a rolling daily
//! quota and an injectable [`Clock`].
//!
//! ## Thread Safety
//!
//! The throttle is not thread-safe and is meant to be owned by one dispatch
//! loop. For concurrent access, wrap it in a mutex or give it to a single
//! task that serializes acquisitions.

pub mod core;

pub use core::{
    Acquisition, Batch, BulkPolicy, Clock, ConfigError, DAY, Decomposition, DispatchMode,
    DispatchOp, DispatchReport, Dispatcher, ExecutionPlan, Flow, Gate, ManualClock, PlanError,
    RateLimitConfig, RateModel, Span, StopReason, Throttle, ThrottleConfig, ThrottleError,
    ThrottleStats, TokioClock, WorkUnit, decompose, pack_batches, plan,
};
