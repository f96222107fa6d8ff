//! Serial dispatch loop
//!
//! [`Dispatcher`] walks an [`ExecutionPlan`] strictly in order, asking the
//! throttle for admission before each send and handing each unit to an
//! opaque [`DispatchOp`]. It never retries: a failed unit is reported to the
//! operation's [`DispatchOp::on_failure`] hook, which decides whether the
//! run goes on. Any throttle rejection ends the run.

use super::{ExecutionPlan, Gate, ThrottleError, WorkUnit};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Whether to keep going after a failed unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// How the loop asks the throttle for admission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// One [`Gate::acquire`] before every unit
    #[default]
    PerUnit,
    /// One [`Gate::acquire_batch`] before every batch
    PerBatch,
}

/// The externally supplied unit of work
#[async_trait]
pub trait DispatchOp<T: Sync>: Send {
    type Error: fmt::Display + Send;

    /// Perform the work for one unit
    async fn dispatch(&mut self, unit: &WorkUnit<T>) -> Result<(), Self::Error>;

    /// Decide what happens after `unit` failed; continues by default
    fn on_failure(&mut self, _unit: &WorkUnit<T>, _error: &Self::Error) -> Flow {
        Flow::Continue
    }
}

/// Why a run ended before the plan was exhausted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The throttle refused admission
    Throttle(ThrottleError),
    /// The operation asked to stop after this unit failed
    Operation { unit_index: u64, error: String },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Throttle(e) => write!(f, "{e}"),
            StopReason::Operation { unit_index, error } => {
                write!(f, "unit {unit_index} failed: {error}")
            }
        }
    }
}

/// Summary of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Units the operation completed successfully
    pub dispatched: usize,
    /// Indexes of units whose operation failed
    pub failed: Vec<u64>,
    /// Batches whose units were all attempted
    pub completed_batches: usize,
    /// Total time spent waiting on the throttle
    pub waited: Duration,
    /// Index of the last unit attempted
    pub last_unit: Option<u64>,
    pub stopped: Option<StopReason>,
}

impl DispatchReport {
    /// Every unit of the plan was attempted
    pub fn is_complete(&self) -> bool {
        self.stopped.is_none()
    }
}

/// Drives a plan through a borrowed throttle
///
/// The throttle outlives the dispatcher so the caller can inspect its
/// counters once the run is over.
pub struct Dispatcher<'a, G: Gate> {
    throttle: &'a mut G,
    mode: DispatchMode,
}

impl<'a, G: Gate> Dispatcher<'a, G> {
    pub fn new(throttle: &'a mut G, mode: DispatchMode) -> Self {
        Dispatcher { throttle, mode }
    }

    /// Dispatch every unit of `plan` in order
    pub async fn run<T, O>(&mut self, plan: &ExecutionPlan<T>, op: &mut O) -> DispatchReport
    where
        T: Sync,
        O: DispatchOp<T>,
    {
        let mut report = DispatchReport::default();

        for batch in &plan.batches {
            tracing::info!(
                batch = batch.batch_number,
                units = batch.len(),
                eta_secs = batch.estimated_duration_secs,
                "dispatching batch"
            );

            if self.mode == DispatchMode::PerBatch {
                match self.throttle.acquire_batch(batch.len()).await {
                    Ok(acquisition) => report.waited += acquisition.waited,
                    Err(e) => {
                        report.stopped = Some(StopReason::Throttle(e));
                        return report;
                    }
                }
            }

            for unit in &batch.units {
                if self.mode == DispatchMode::PerUnit {
                    match self.throttle.acquire().await {
                        Ok(acquisition) => report.waited += acquisition.waited,
                        Err(e) => {
                            report.stopped = Some(StopReason::Throttle(e));
                            return report;
                        }
                    }
                }

                report.last_unit = Some(unit.index);
                match op.dispatch(unit).await {
                    Ok(()) => report.dispatched += 1,
                    Err(e) => {
                        tracing::warn!(unit = unit.index, error = %e, "dispatch failed");
                        report.failed.push(unit.index);
                        if op.on_failure(unit, &e) == Flow::Stop {
                            report.stopped = Some(StopReason::Operation {
                                unit_index: unit.index,
                                error: e.to_string(),
                            });
                            return report;
                        }
                    }
                }
            }

            report.completed_batches += 1;
        }

        tracing::info!(
            dispatched = report.dispatched,
            failed = report.failed.len(),
            waited_ms = report.waited.as_millis() as u64,
            "dispatch run finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        BulkPolicy, ManualClock, RateModel, Throttle, ThrottleConfig, decompose, pack_batches,
    };
    use std::time::SystemTime;

    /// Records dispatched indexes and fails the ones listed
    struct Recorder {
        seen: Vec<u64>,
        fail_on: Vec<u64>,
        stop_on_failure: bool,
    }

    impl Recorder {
        fn new() -> Self {
            Recorder {
                seen: Vec::new(),
                fail_on: Vec::new(),
                stop_on_failure: false,
            }
        }
    }

    #[async_trait]
    impl DispatchOp<u64> for Recorder {
        type Error = String;

        async fn dispatch(&mut self, unit: &WorkUnit<u64>) -> Result<(), String> {
            self.seen.push(unit.index);
            if self.fail_on.contains(&unit.index) {
                return Err(format!("provider rejected {}", unit.range_start));
            }
            Ok(())
        }

        fn on_failure(&mut self, _unit: &WorkUnit<u64>, _error: &String) -> Flow {
            if self.stop_on_failure {
                Flow::Stop
            } else {
                Flow::Continue
            }
        }
    }

    fn plan(units: u64) -> ExecutionPlan<u64> {
        let units = decompose(0u64, units, 1, 1_000).unwrap().into_units();
        pack_batches(units, &RateModel::from_rate(10, 50))
    }

    fn throttle(max_per_day: u64, bulk: BulkPolicy) -> (Throttle<ManualClock>, ManualClock) {
        let clock = ManualClock::new(SystemTime::UNIX_EPOCH + Duration::from_secs(86_400 * 365));
        let config = ThrottleConfig {
            rate_per_minute: 10,
            max_per_day,
            bulk,
        };
        (Throttle::with_clock(config, clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_per_unit_run_preserves_order() {
        let (mut throttle, clock) = throttle(100, BulkPolicy::sequential());
        let plan = plan(20);
        let mut op = Recorder::new();

        let report = Dispatcher::new(&mut throttle, DispatchMode::PerUnit)
            .run(&plan, &mut op)
            .await;

        assert!(report.is_complete());
        assert_eq!(report.dispatched, 20);
        assert_eq!(report.completed_batches, 3);
        assert_eq!(op.seen, (1..=20).collect::<Vec<_>>());
        assert_eq!(report.waited, Duration::from_millis(6_010) * 19);
        assert_eq!(clock.total_slept(), report.waited);
        assert_eq!(throttle.stats().dispatched_today, 20);
    }

    #[tokio::test]
    async fn test_failures_are_reported_not_retried() {
        let (mut throttle, _clock) = throttle(100, BulkPolicy::sequential());
        let plan = plan(5);
        let mut op = Recorder::new();
        op.fail_on = vec![2, 4];

        let report = Dispatcher::new(&mut throttle, DispatchMode::PerUnit)
            .run(&plan, &mut op)
            .await;

        assert!(report.is_complete());
        assert_eq!(report.dispatched, 3);
        assert_eq!(report.failed, vec![2, 4]);
        assert_eq!(op.seen, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_operation_can_stop_the_run() {
        let (mut throttle, _clock) = throttle(100, BulkPolicy::sequential());
        let plan = plan(10);
        let mut op = Recorder::new();
        op.fail_on = vec![3];
        op.stop_on_failure = true;

        let report = Dispatcher::new(&mut throttle, DispatchMode::PerUnit)
            .run(&plan, &mut op)
            .await;

        assert_eq!(report.dispatched, 2);
        assert_eq!(report.last_unit, Some(3));
        assert_eq!(
            report.stopped,
            Some(StopReason::Operation {
                unit_index: 3,
                error: "provider rejected 2".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_quota_stops_the_run() {
        let (mut throttle, _clock) = throttle(7, BulkPolicy::sequential());
        let plan = plan(10);
        let mut op = Recorder::new();

        let report = Dispatcher::new(&mut throttle, DispatchMode::PerUnit)
            .run(&plan, &mut op)
            .await;

        assert_eq!(report.dispatched, 7);
        assert_eq!(report.last_unit, Some(7));
        assert!(matches!(
            report.stopped,
            Some(StopReason::Throttle(ThrottleError::DailyQuotaExceeded { .. }))
        ));
    }

    #[tokio::test]
    async fn test_per_batch_run_acquires_once_per_batch() {
        let (mut throttle, _clock) = throttle(100, BulkPolicy::provider_paced());
        let plan = plan(20);
        let mut op = Recorder::new();

        let report = Dispatcher::new(&mut throttle, DispatchMode::PerBatch)
            .run(&plan, &mut op)
            .await;

        assert!(report.is_complete());
        assert_eq!(report.dispatched, 20);
        // Batches of 8, 8, 4: a tenth of 8 * 6.01s, then of 4 * 6.01s
        assert_eq!(report.waited, Duration::from_millis(4_808 + 2_404));
    }

    #[tokio::test]
    async fn test_per_batch_quota_rejects_whole_batch() {
        let (mut throttle, _clock) = throttle(12, BulkPolicy::provider_paced());
        let plan = plan(20);
        let mut op = Recorder::new();

        let report = Dispatcher::new(&mut throttle, DispatchMode::PerBatch)
            .run(&plan, &mut op)
            .await;

        assert_eq!(report.dispatched, 8);
        assert_eq!(report.completed_batches, 1);
        assert_eq!(throttle.stats().dispatched_today, 8);
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn test_per_batch_respects_provider_ceiling() {
        let ceiling = BulkPolicy {
            max_batch_size: 5,
            wait_fraction: 0.1,
        };
        let (mut throttle, _clock) = throttle(100, ceiling);
        let plan = plan(20);
        let mut op = Recorder::new();

        let report = Dispatcher::new(&mut throttle, DispatchMode::PerBatch)
            .run(&plan, &mut op)
            .await;

        assert_eq!(report.dispatched, 0);
        assert_eq!(
            report.stopped,
            Some(StopReason::Throttle(ThrottleError::BatchSizeTooLarge {
                requested: 8,
                max: 5
            }))
        );
    }
}
