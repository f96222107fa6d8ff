//! Output types printed by the binary
//!
//! The library's plan and report types carry the raw range bounds. These
//! flatten them for display: count ranges print as offsets, time ranges as
//! unix seconds, and durations as milliseconds.
//!
//! Every type serializes to JSON with `--json` and implements `Display`
//! for the default text output.

use dispatchcrab::{DispatchReport, ExecutionPlan, RateModel, Span, ThrottleStats};
use serde::Serialize;
use std::fmt;
use std::time::SystemTime;

/// A range bound that can be printed as a plain integer
pub trait RenderBound: Span + Send + Sync + 'static {
    fn render(&self) -> u64;
}

impl RenderBound for u64 {
    fn render(&self) -> u64 {
        *self
    }
}

impl RenderBound for SystemTime {
    fn render(&self) -> u64 {
        self.duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Printable execution plan
///
/// # Example
///
/// ```json
/// {
///   "units": 5,
///   "delay_per_unit_ms": 6010,
///   "max_batch_size": 8,
///   "total_estimated_secs": 31,
///   "requires_batching": false,
///   "batches": [
///     { "batch_number": 1, "units": 5, "range_start": 1700000000,
///       "range_end": 1702592000, "estimated_duration_secs": 31 }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub units: usize,
    pub delay_per_unit_ms: u64,
    pub max_batch_size: usize,
    pub total_estimated_secs: u64,
    pub requires_batching: bool,
    pub batches: Vec<BatchSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub batch_number: usize,
    pub units: usize,
    /// Start of the batch's first unit
    pub range_start: u64,
    /// End of the batch's last unit
    pub range_end: u64,
    pub estimated_duration_secs: u64,
}

impl PlanSummary {
    pub fn new<T: RenderBound>(plan: &ExecutionPlan<T>, model: &RateModel) -> Self {
        let batches = plan
            .batches
            .iter()
            .filter_map(|batch| {
                let first = batch.units.first()?;
                let last = batch.units.last()?;
                Some(BatchSummary {
                    batch_number: batch.batch_number,
                    units: batch.len(),
                    range_start: first.range_start.render(),
                    range_end: last.range_end.render(),
                    estimated_duration_secs: batch.estimated_duration_secs,
                })
            })
            .collect();

        PlanSummary {
            units: plan.total_units(),
            delay_per_unit_ms: model.delay_per_unit().as_millis() as u64,
            max_batch_size: model.max_batch_size(),
            total_estimated_secs: plan.total_estimated_secs,
            requires_batching: plan.requires_batching,
            batches,
        }
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} units in {} batch(es), {} ms between dispatches, up to {} units per batch",
            self.units,
            self.batches.len(),
            self.delay_per_unit_ms,
            self.max_batch_size
        )?;
        for batch in &self.batches {
            writeln!(
                f,
                "  batch {:>3}: {:>3} units  [{}, {})  ~{}s",
                batch.batch_number,
                batch.units,
                batch.range_start,
                batch.range_end,
                batch.estimated_duration_secs
            )?;
        }
        write!(f, "estimated total: {}s", self.total_estimated_secs)?;
        if self.requires_batching {
            write!(f, " across several invocations")?;
        }
        Ok(())
    }
}

/// Printable outcome of one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub job: usize,
    pub dispatched: usize,
    pub failed: Vec<u64>,
    pub completed_batches: usize,
    pub waited_ms: u64,
    pub last_unit: Option<u64>,
    pub complete: bool,
    pub stopped: Option<String>,
}

impl RunSummary {
    pub fn new(job: usize, report: &DispatchReport) -> Self {
        RunSummary {
            job,
            dispatched: report.dispatched,
            failed: report.failed.clone(),
            completed_batches: report.completed_batches,
            waited_ms: report.waited.as_millis() as u64,
            last_unit: report.last_unit,
            complete: report.is_complete(),
            stopped: report.stopped.as_ref().map(ToString::to_string),
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "job {}: {} dispatched, {} failed, {} batch(es) completed, waited {} ms",
            self.job,
            self.dispatched,
            self.failed.len(),
            self.completed_batches,
            self.waited_ms
        )?;
        if let Some(reason) = &self.stopped {
            write!(f, "; stopped: {reason}")?;
        }
        Ok(())
    }
}

/// Printable throttle counters after all jobs finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaSummary {
    pub dispatched_today: u64,
    pub remaining_today: u64,
    pub max_per_day: u64,
    pub resets_at: u64,
}

impl From<ThrottleStats> for QuotaSummary {
    fn from(stats: ThrottleStats) -> Self {
        QuotaSummary {
            dispatched_today: stats.dispatched_today,
            remaining_today: stats.remaining_today,
            max_per_day: stats.max_per_day,
            resets_at: stats.resets_at.render(),
        }
    }
}

impl fmt::Display for QuotaSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "quota: {}/{} used today, {} remaining, resets at {} (unix seconds)",
            self.dispatched_today, self.max_per_day, self.remaining_today, self.resets_at
        )
    }
}

/// Everything one invocation prints
///
/// Printed as a single JSON document with `--json`, or as text sections
/// otherwise. `runs` and `quota` are only present with `--execute`.
#[derive(Debug, Clone, Serialize)]
pub struct Output {
    pub plan: PlanSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runs: Option<Vec<RunSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota: Option<QuotaSummary>,
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.plan)?;
        for run in self.runs.iter().flatten() {
            write!(f, "\n{run}")?;
        }
        if let Some(quota) = &self.quota {
            write!(f, "\n{quota}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatchcrab::{DAY, RateLimitConfig, StopReason, ThrottleError, plan};
    use std::time::Duration;

    #[test]
    fn test_plan_summary_flattens_time_bounds() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let config = RateLimitConfig::new(10, 50, 90).unwrap();
        let plan = plan(start, start + DAY * 30, DAY * 7, &config).unwrap();

        let summary = PlanSummary::new(&plan, &RateModel::derive(&config));

        assert_eq!(summary.units, 5);
        assert_eq!(summary.delay_per_unit_ms, 6_010);
        assert_eq!(summary.max_batch_size, 8);
        assert_eq!(summary.batches.len(), 1);
        assert_eq!(summary.batches[0].range_start, 1_700_000_000);
        assert_eq!(summary.batches[0].range_end, 1_700_000_000 + 30 * 86_400);
    }

    #[test]
    fn test_plan_summary_text() {
        let config = RateLimitConfig::new(10, 50, 90).unwrap();
        let plan = plan(0u64, 20, 1, &config).unwrap();

        let text = PlanSummary::new(&plan, &RateModel::derive(&config)).to_string();

        assert!(text.starts_with("20 units in 3 batch(es), 6010 ms between dispatches"));
        assert!(text.contains("batch   3:   4 units  [16, 20)"));
        assert!(text.ends_with("across several invocations"));
    }

    #[test]
    fn test_run_summary_reports_stop_reason() {
        let report = DispatchReport {
            dispatched: 7,
            failed: vec![],
            completed_batches: 0,
            waited: Duration::from_millis(1_500),
            last_unit: Some(7),
            stopped: Some(StopReason::Throttle(ThrottleError::DailyQuotaExceeded {
                resets_at: SystemTime::UNIX_EPOCH + Duration::from_secs(86_400),
                dispatched: 7,
                limit: 7,
            })),
        };

        let summary = RunSummary::new(2, &report);
        assert!(!summary.complete);
        assert_eq!(summary.waited_ms, 1_500);
        assert_eq!(
            summary.to_string(),
            "job 2: 7 dispatched, 0 failed, 0 batch(es) completed, waited 1500 ms; \
             stopped: daily quota exhausted (7/7); quota resets at 86400 (unix seconds)"
        );
    }

    #[test]
    fn test_plan_summary_json_shape() {
        let config = RateLimitConfig::new(120, 50, 100).unwrap();
        let plan = plan(0u64, 100, 10, &config).unwrap();
        let summary = PlanSummary::new(&plan, &RateModel::derive(&config));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["units"], 10);
        assert_eq!(json["requires_batching"], false);
        assert_eq!(json["batches"][0]["range_end"], 100);

        let output = serde_json::to_value(Output {
            plan: summary,
            runs: None,
            quota: None,
        })
        .unwrap();
        assert_eq!(output["plan"]["units"], 10);
        assert!(output.get("runs").is_none());
    }
}
