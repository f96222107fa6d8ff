//! One-call planning: decompose, derive rates, pack

use super::{ExecutionPlan, PlanError, RateLimitConfig, RateModel, Span, decompose, pack_batches};

/// Turn a bulk range into an execution plan
///
/// Decomposes `[start, end)` by `step` under the config's hard unit cap,
/// derives a fresh [`RateModel`] from `config` and packs the units into
/// batches.
///
/// # Errors
///
/// Propagates every [`PlanError`] from decomposition; packing cannot fail.
///
/// # Example
///
/// ```
/// use dispatchcrab::{RateLimitConfig, plan};
/// use dispatchcrab::core::decompose::DAY;
/// use std::time::SystemTime;
///
/// let config = RateLimitConfig::new(10, 50, 90).unwrap();
/// let start = SystemTime::now();
///
/// let plan = plan(start, start + DAY * 30, DAY * 7, &config).unwrap();
/// assert_eq!(plan.total_units(), 5);
/// assert!(!plan.requires_batching);
/// ```
pub fn plan<T: Span>(
    start: T,
    end: T,
    step: T::Step,
    config: &RateLimitConfig,
) -> Result<ExecutionPlan<T>, PlanError> {
    let decomposition = decompose(start, end, step, config.hard_unit_cap())?;
    let model = RateModel::derive(config);
    let plan = pack_batches(decomposition.into_units(), &model);

    tracing::info!(
        units = plan.total_units(),
        batches = plan.batches.len(),
        max_batch_size = model.max_batch_size(),
        delay_ms = model.delay_per_unit().as_millis() as u64,
        eta_secs = plan.total_estimated_secs,
        "execution plan ready"
    );

    Ok(plan)
}
