//! CLI configuration and argument parsing
//!
//! This module handles all configuration through a layered system:
//! - Command-line arguments
//! - Environment variables (with DISPATCHCRAB_ prefix)
//! - Provider presets and documented defaults
//!
//! # Configuration Priority
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Provider preset / default values (lowest priority)
//!
//! Rate settings are parsed leniently: a missing, non-numeric or zero value
//! falls back to the preset instead of failing startup.
//!
//! # Example Usage
//!
//! ```bash
//! # Plan 90 days of daily content on the generation provider
//! dispatchcrab --days 90
//!
//! # Email 10 000 subscribers in slices of 50, simulated clock
//! export DISPATCHCRAB_PROVIDER=bulk-email
//! dispatchcrab --count 10000 --step 50 --hard-unit-cap 500 --execute --simulate
//! ```

use anyhow::{Result, anyhow};
use clap::Parser;
use dispatchcrab::core::config::{ENV_HARD_UNIT_CAP, ENV_RATE_PER_MINUTE, ENV_SAFE_WINDOW_SECS};
use dispatchcrab::core::throttle::{ENV_BULK_WAIT_FRACTION, ENV_MAX_PER_DAY};
use dispatchcrab::{DAY, DispatchMode, RateLimitConfig, ThrottleConfig};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

/// Main configuration structure
///
/// Built from CLI arguments and environment variables; contains everything
/// needed to plan and optionally run one bulk request.
#[derive(Debug, Clone)]
pub struct Config {
    /// The bulk range to decompose
    pub range: RangeSpec,
    /// Provider preset the throttle starts from
    pub provider: Provider,
    /// Planning inputs
    pub rate: RateLimitConfig,
    /// Throttle parameters
    pub throttle: ThrottleConfig,
    /// Dispatch loop settings
    pub run: RunConfig,
    /// Print the plan and reports as JSON
    pub json: bool,
    /// Channel buffer size for the throttle actor
    pub buffer_size: usize,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// The range a bulk request covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// `count` items starting at offset `start`, `step` items per unit
    Count { start: u64, count: u64, step: u64 },
    /// `days` days starting at `start`, `step_days` days per unit
    Days {
        start: SystemTime,
        days: u64,
        step_days: u64,
    },
}

impl RangeSpec {
    /// End of a count range, or an error on overflow
    pub fn count_bounds(start: u64, count: u64) -> Result<(u64, u64)> {
        let end = start
            .checked_add(count)
            .ok_or_else(|| anyhow!("range end overflows: {start} + {count}"))?;
        Ok((start, end))
    }

    /// End of a day range, or an error on overflow
    pub fn day_bounds(start: SystemTime, days: u64) -> Result<(SystemTime, SystemTime)> {
        let span = Duration::from_secs(days.saturating_mul(DAY.as_secs()));
        let end = start
            .checked_add(span)
            .ok_or_else(|| anyhow!("range end overflows: {days} days"))?;
        Ok((start, end))
    }
}

/// Dispatch loop settings
#[derive(Debug, Clone, Copy)]
pub struct RunConfig {
    /// Run the dispatch loop after planning
    pub execute: bool,
    /// Use a simulated clock instead of really waiting
    pub simulate: bool,
    /// Acquire per unit or per batch
    pub mode: DispatchMode,
    /// Independent bulk jobs sharing one provider quota
    pub jobs: usize,
    /// Simulated provider fails every Nth unit (0 = never)
    pub fail_every: u64,
    /// Stop a job at its first failed unit
    pub stop_on_failure: bool,
}

/// Provider presets
///
/// - **Generation**: slow single calls, one acquisition per unit
/// - **BulkEmail**: faster, provider-paced bulk sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Generation,
    BulkEmail,
}

impl Provider {
    /// Throttle parameters before any override
    pub fn preset(self) -> ThrottleConfig {
        match self {
            Provider::Generation => ThrottleConfig::generation(),
            Provider::BulkEmail => ThrottleConfig::bulk_email(),
        }
    }

    /// How this provider is normally driven
    pub fn default_mode(self) -> DispatchMode {
        match self {
            Provider::Generation => DispatchMode::PerUnit,
            Provider::BulkEmail => DispatchMode::PerBatch,
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "generation" => Ok(Provider::Generation),
            "bulk-email" | "email" => Ok(Provider::BulkEmail),
            _ => Err(anyhow!(
                "Invalid provider: {}. Valid options are: generation, bulk-email",
                s
            )),
        }
    }
}

/// Dispatch mode as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeArg(pub DispatchMode);

impl std::str::FromStr for ModeArg {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "per-unit" | "unit" => Ok(ModeArg(DispatchMode::PerUnit)),
            "per-batch" | "batch" => Ok(ModeArg(DispatchMode::PerBatch)),
            _ => Err(anyhow!(
                "Invalid mode: {}. Valid options are: per-unit, per-batch",
                s
            )),
        }
    }
}

/// Command-line arguments
///
/// All arguments can also be set via environment variables with the
/// DISPATCHCRAB_ prefix. CLI arguments take precedence over environment variables.
///
/// # Examples
///
/// Plan a quarter of daily content:
/// ```bash
/// dispatchcrab --days 90
/// ```
///
/// Run 10 000 emails on a simulated clock with debug logging:
/// ```bash
/// dispatchcrab --provider bulk-email --count 10000 --step 50 --hard-unit-cap 500 \
///     --execute --simulate --log-level debug
/// ```
#[derive(Parser, Debug)]
#[command(
    name = "dispatchcrab",
    about = "Plan and run throttled bulk dispatches",
    long_about = "Splits a bulk request into rate-limited batches that fit a provider quota, a daily cap and a host execution window.\n\nExactly one of --count or --days must be specified.\n\nEnvironment variables with DISPATCHCRAB_ prefix are supported. CLI arguments take precedence over environment variables."
)]
pub struct Args {
    // Range
    #[arg(
        long,
        value_name = "N",
        help = "Dispatch N items (abstract count range)",
        env = "DISPATCHCRAB_COUNT"
    )]
    pub count: Option<u64>,
    #[arg(
        long,
        value_name = "N",
        help = "Dispatch N days of periodic content (time range)",
        env = "DISPATCHCRAB_DAYS"
    )]
    pub days: Option<u64>,
    #[arg(
        long,
        value_name = "N",
        help = "Unit length: items per unit with --count, days per unit with --days",
        default_value_t = 1,
        env = "DISPATCHCRAB_STEP"
    )]
    pub step: u64,
    #[arg(
        long,
        value_name = "N",
        help = "Range start: item offset with --count, unix seconds with --days [default: 0 / now]",
        env = "DISPATCHCRAB_START"
    )]
    pub start: Option<u64>,

    // Provider
    #[arg(
        long,
        value_name = "PROVIDER",
        help = "Provider preset: generation, bulk-email",
        default_value = "generation",
        env = "DISPATCHCRAB_PROVIDER"
    )]
    pub provider: Provider,
    #[arg(
        long,
        value_name = "N",
        help = "Provider requests per minute [default: preset]",
        env = "DISPATCHCRAB_RATE_PER_MINUTE"
    )]
    pub rate_per_minute: Option<String>,
    #[arg(
        long,
        value_name = "SECS",
        help = "Wall-clock budget for one dispatch loop [default: 50]",
        env = "DISPATCHCRAB_SAFE_WINDOW_SECS"
    )]
    pub safe_window_secs: Option<String>,
    #[arg(
        long,
        value_name = "N",
        help = "Maximum units per bulk request [default: 90]",
        env = "DISPATCHCRAB_HARD_UNIT_CAP"
    )]
    pub hard_unit_cap: Option<String>,
    #[arg(
        long,
        value_name = "N",
        help = "Daily dispatch quota [default: preset]",
        env = "DISPATCHCRAB_MAX_PER_DAY"
    )]
    pub max_per_day: Option<String>,
    #[arg(
        long,
        value_name = "FRACTION",
        help = "Share of the per-unit wait applied to bulk sends, in (0, 1] [default: preset]",
        env = "DISPATCHCRAB_BULK_WAIT_FRACTION"
    )]
    pub bulk_wait_fraction: Option<String>,

    // Run
    #[arg(
        long,
        value_name = "MODE",
        help = "Acquisition mode: per-unit, per-batch [default: provider's]",
        env = "DISPATCHCRAB_MODE"
    )]
    pub mode: Option<ModeArg>,
    #[arg(long, help = "Run the dispatch loop after planning", env = "DISPATCHCRAB_EXECUTE")]
    pub execute: bool,
    #[arg(long, help = "Use a simulated clock instead of waiting", env = "DISPATCHCRAB_SIMULATE")]
    pub simulate: bool,
    #[arg(
        long,
        value_name = "N",
        help = "Independent jobs sharing one provider quota",
        default_value_t = 1,
        env = "DISPATCHCRAB_JOBS"
    )]
    pub jobs: usize,
    #[arg(
        long,
        value_name = "N",
        help = "Simulated provider fails every Nth unit (0 = never)",
        default_value_t = 0,
        env = "DISPATCHCRAB_FAIL_EVERY"
    )]
    pub fail_every: u64,
    #[arg(long, help = "Stop a job at its first failed unit", env = "DISPATCHCRAB_STOP_ON_FAILURE")]
    pub stop_on_failure: bool,

    // General options
    #[arg(long, help = "Print plan and reports as JSON", env = "DISPATCHCRAB_JSON")]
    pub json: bool,
    #[arg(
        long,
        value_name = "SIZE",
        help = "Throttle actor channel buffer size",
        default_value_t = 1_000,
        env = "DISPATCHCRAB_BUFFER_SIZE"
    )]
    pub buffer_size: usize,
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "info",
        env = "DISPATCHCRAB_LOG_LEVEL"
    )]
    pub log_level: String,

    // Utility options
    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

impl Config {
    /// Build configuration from environment variables and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Neither or both of `--count` and `--days` are given
    /// - The range end overflows
    /// - `--jobs` is zero
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        Self::from_args(args)
    }

    /// Build configuration from already-parsed arguments
    pub fn from_args(args: Args) -> Result<Self> {
        let range = match (args.count, args.days) {
            (Some(count), None) => RangeSpec::Count {
                start: args.start.unwrap_or(0),
                count,
                step: args.step,
            },
            (None, Some(days)) => RangeSpec::Days {
                start: match args.start {
                    Some(secs) => SystemTime::UNIX_EPOCH
                        .checked_add(Duration::from_secs(secs))
                        .ok_or_else(|| anyhow!("range start out of range: {secs} unix seconds"))?,
                    None => SystemTime::now(),
                },
                days,
                step_days: args.step,
            },
            _ => {
                return Err(anyhow!(
                    "Exactly one range must be specified.\n\n\
                    Available ranges:\n  \
                    --count <N>   Dispatch N items\n  \
                    --days <N>    Dispatch N days of periodic content\n\n\
                    Example:\n  \
                    dispatchcrab --days 90 --step 7\n  \
                    dispatchcrab --count 10000 --step 50 --provider bulk-email\n\n\
                    For more information, try '--help'"
                ));
            }
        };

        let overrides: HashMap<&str, String> = [
            (ENV_RATE_PER_MINUTE, args.rate_per_minute),
            (ENV_SAFE_WINDOW_SECS, args.safe_window_secs),
            (ENV_HARD_UNIT_CAP, args.hard_unit_cap),
            (ENV_MAX_PER_DAY, args.max_per_day),
            (ENV_BULK_WAIT_FRACTION, args.bulk_wait_fraction),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key, value)))
        .collect();
        let lookup = |key: &str| overrides.get(key).cloned();

        // Planning uses the throttle's resolved rate, so an unusable value
        // falls back to the provider preset for both
        let throttle = args.provider.preset().from_lookup(lookup);
        let rate = RateLimitConfig::from_lookup(|key: &str| {
            if key == ENV_RATE_PER_MINUTE {
                Some(throttle.rate_per_minute.to_string())
            } else {
                lookup(key)
            }
        });

        let config = Config {
            range,
            provider: args.provider,
            rate,
            throttle,
            run: RunConfig {
                execute: args.execute,
                simulate: args.simulate,
                mode: args
                    .mode
                    .map(|m| m.0)
                    .unwrap_or_else(|| args.provider.default_mode()),
                jobs: args.jobs,
                fail_every: args.fail_every,
                stop_on_failure: args.stop_on_failure,
            },
            json: args.json,
            buffer_size: args.buffer_size,
            log_level: args.log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    fn validate(&self) -> Result<()> {
        match self.range {
            RangeSpec::Count { start, count, .. } => {
                RangeSpec::count_bounds(start, count)?;
            }
            RangeSpec::Days { start, days, .. } => {
                RangeSpec::day_bounds(start, days)?;
            }
        }

        if self.run.jobs == 0 {
            return Err(anyhow!("--jobs must be at least 1"));
        }
        if self.buffer_size == 0 {
            return Err(anyhow!("--buffer-size must be at least 1"));
        }

        self.throttle.validate()?;
        Ok(())
    }

    /// Print all available environment variables and their descriptions
    ///
    /// This is called when the --list-env-vars flag is used.
    fn print_env_vars() {
        println!("DispatchCrab Environment Variables");
        println!("==================================");
        println!();
        println!("All environment variables use the DISPATCHCRAB_ prefix.");
        println!("CLI arguments take precedence over environment variables.");
        println!();

        println!("Range:");
        println!("  DISPATCHCRAB_COUNT=<n>                Dispatch N items");
        println!("  DISPATCHCRAB_DAYS=<n>                 Dispatch N days of content");
        println!("  DISPATCHCRAB_STEP=<n>                 Items or days per unit [default: 1]");
        println!("  DISPATCHCRAB_START=<n>                Item offset or unix seconds [default: 0 / now]");
        println!();

        println!("Provider:");
        println!(
            "  DISPATCHCRAB_PROVIDER=<name>          Preset: generation, bulk-email [default: generation]"
        );
        println!(
            "  DISPATCHCRAB_RATE_PER_MINUTE=<n>      Requests per minute [default: preset, 10 / 120]"
        );
        println!("  DISPATCHCRAB_SAFE_WINDOW_SECS=<secs>  Execution budget [default: 50]");
        println!("  DISPATCHCRAB_HARD_UNIT_CAP=<n>        Units per request [default: 90]");
        println!(
            "  DISPATCHCRAB_MAX_PER_DAY=<n>          Daily quota [default: preset, 1500 / 3000]"
        );
        println!(
            "  DISPATCHCRAB_BULK_WAIT_FRACTION=<f>   Bulk send wait share [default: preset, 1.0 / 0.1]"
        );
        println!();
        println!("  Unusable rate values fall back to the default with a warning.");
        println!();

        println!("Run:");
        println!("  DISPATCHCRAB_MODE=<mode>              per-unit, per-batch [default: provider's]");
        println!("  DISPATCHCRAB_EXECUTE=true|false       Run the dispatch loop");
        println!("  DISPATCHCRAB_SIMULATE=true|false      Simulated clock");
        println!("  DISPATCHCRAB_JOBS=<n>                 Jobs sharing the quota [default: 1]");
        println!("  DISPATCHCRAB_FAIL_EVERY=<n>           Simulated failure period [default: 0]");
        println!("  DISPATCHCRAB_STOP_ON_FAILURE=true|false");
        println!();

        println!("General Configuration:");
        println!("  DISPATCHCRAB_JSON=true|false          JSON output");
        println!("  DISPATCHCRAB_BUFFER_SIZE=<size>       Actor channel buffer size [default: 1000]");
        println!(
            "  DISPATCHCRAB_LOG_LEVEL=<level>        Log level: error, warn, info, debug, trace [default: info]"
        );
        println!();

        println!("Examples:");
        println!("  # Weekly slices of a 30 day content range");
        println!("  export DISPATCHCRAB_DAYS=30");
        println!("  export DISPATCHCRAB_STEP=7");
        println!();
        println!("  # Run CLI (args override env vars)");
        println!("  dispatchcrab --step 1  # Will use daily slices, not weekly");
    }
}
