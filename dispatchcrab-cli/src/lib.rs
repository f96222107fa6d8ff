//! # DispatchCrab CLI
//!
//! Plan, and optionally run, a throttled bulk dispatch from the command line.
//!
//! ## Purpose
//!
//! Given a bulk range ("90 days of content", "10 000 subscribers") and a
//! provider's limits, the binary prints the execution plan: how the range
//! splits into units, how units pack into batches that fit the host's
//! execution window, and how long each batch should take. With `--execute`
//! it then drives the plan through a shared throttle against a simulated
//! provider, which is useful for checking quota behaviour before wiring a
//! real one.
//!
//! ## Installation
//!
//! ```bash
//! cargo install dispatchcrab-cli
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # Show all available options
//! dispatchcrab --help
//!
//! # 30 days of content in weekly units
//! dispatchcrab --days 30 --step 7
//!
//! # 10 000 emails in units of 50, run on a simulated clock
//! dispatchcrab --provider bulk-email --count 10000 --step 50 --hard-unit-cap 500 \
//!     --execute --simulate
//!
//! # Machine-readable output
//! dispatchcrab --days 90 --json
//! ```
//!
//! ## Configuration
//!
//! Configure via CLI arguments or environment variables (CLI takes precedence):
//!
//! ```bash
//! export DISPATCHCRAB_RATE_PER_MINUTE=30
//! export DISPATCHCRAB_MAX_PER_DAY=500
//! dispatchcrab --days 60
//!
//! # List all available environment variables
//! dispatchcrab --list-env-vars
//! ```
//!
//! ## Architecture
//!
//! Jobs never touch the throttle directly. One actor task owns it and every
//! job holds a cloned handle, so all jobs draw from one provider quota:
//!
//! ```text
//! ┌─────────┐   ┌─────────┐   ┌─────────┐
//! │  Job 1  │   │  Job 2  │   │  Job N  │
//! └────┬────┘   └────┬────┘   └────┬────┘
//!      │             │             │
//!      └─────────────┴─────────────┘
//!                    │
//!              ┌─────▼─────┐
//!              │   Actor   │
//!              │ (Throttle)│
//!              └───────────┘
//! ```
//!
//! ## Library Use
//!
//! ```
//! use dispatchcrab::{ManualClock, Throttle, ThrottleConfig};
//! use dispatchcrab_cli::actor::ThrottleActor;
//! use std::time::SystemTime;
//!
//! # tokio_test::block_on(async {
//! let clock = ManualClock::new(SystemTime::UNIX_EPOCH);
//! let throttle = Throttle::with_clock(ThrottleConfig::bulk_email(), clock);
//! let handle = ThrottleActor::spawn(16, throttle);
//!
//! let acquisition = handle.acquire_batch(25).await.unwrap();
//! assert_eq!(acquisition.dispatched_today, 25);
//! # });
//! ```

pub mod actor;
pub mod config;
pub mod provider;
pub mod types;

#[cfg(test)]
mod actor_tests;
