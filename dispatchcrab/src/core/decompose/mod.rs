//! Range decomposition
//!
//! Splits a bounded range `[start, end)` into ordered, contiguous
//! [`WorkUnit`]s of `step` length. Only the final unit may be shorter than
//! the step. The scan stops as soon as the hard unit cap would be exceeded,
//! so an oversized request never allocates its full unit list.
//!
//! Bounds are anything implementing [`Span`]: plain counts (`u64`, e.g.
//! subscriber offsets) and timestamps (`SystemTime` with `Duration` steps,
//! e.g. days of periodic content).

use super::PlanError;
use serde::Serialize;
use std::fmt;
use std::time::{Duration, SystemTime};

#[cfg(test)]
mod tests;

/// One calendar day
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on the unit buffer reserved before scanning
const MAX_INITIAL_RESERVE: u64 = 1_024;

/// A bound type the decomposer can walk
pub trait Span: Copy + Ord + fmt::Debug {
    /// Distance covered by one unit
    type Step: Copy + fmt::Debug;

    /// Whether `step` is at least one unit long
    fn is_valid_step(step: Self::Step) -> bool;

    /// `self + step`, or `None` on overflow
    fn advance(self, step: Self::Step) -> Option<Self>;

    /// Number of units `[start, end)` splits into, when cheaply computable
    ///
    /// Only used to report the requested count when the cap is exceeded.
    fn steps_between(_start: Self, _end: Self, _step: Self::Step) -> Option<u64> {
        None
    }
}

impl Span for u64 {
    type Step = u64;

    fn is_valid_step(step: u64) -> bool {
        step >= 1
    }

    fn advance(self, step: u64) -> Option<u64> {
        self.checked_add(step)
    }

    fn steps_between(start: u64, end: u64, step: u64) -> Option<u64> {
        (step >= 1).then(|| end.saturating_sub(start).div_ceil(step))
    }
}

impl Span for SystemTime {
    type Step = Duration;

    fn is_valid_step(step: Duration) -> bool {
        !step.is_zero()
    }

    fn advance(self, step: Duration) -> Option<SystemTime> {
        self.checked_add(step)
    }

    fn steps_between(start: SystemTime, end: SystemTime, step: Duration) -> Option<u64> {
        let span = end.duration_since(start).ok()?;
        let step_ns = step.as_nanos();
        if step_ns == 0 {
            return None;
        }
        u64::try_from(span.as_nanos().div_ceil(step_ns)).ok()
    }
}

/// One atomic slice of a bulk request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkUnit<T> {
    /// 1-based position in the decomposed sequence
    pub index: u64,
    pub range_start: T,
    pub range_end: T,
}

/// Successful decomposition: ordered units covering the whole range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decomposition<T> {
    units: Vec<WorkUnit<T>>,
}

impl<T> Decomposition<T> {
    pub fn units(&self) -> &[WorkUnit<T>] {
        &self.units
    }

    pub fn count(&self) -> usize {
        self.units.len()
    }

    pub fn into_units(self) -> Vec<WorkUnit<T>> {
        self.units
    }
}

/// Split `[start, end)` into units of `step`, failing fast above `hard_unit_cap`
///
/// # Errors
///
/// - [`PlanError::InvalidRange`]: `start >= end` or the step is empty
/// - [`PlanError::CapExceeded`]: more than `hard_unit_cap` units would be produced
/// - [`PlanError::EmptyResult`]: no units were produced
///
/// # Example
///
/// ```
/// use dispatchcrab::decompose;
///
/// // 10 000 subscribers in chunks of 500
/// let result = decompose(0u64, 10_000, 500, 100).unwrap();
/// assert_eq!(result.count(), 20);
/// assert_eq!(result.units()[19].range_end, 10_000);
/// ```
pub fn decompose<T: Span>(
    start: T,
    end: T,
    step: T::Step,
    hard_unit_cap: u64,
) -> Result<Decomposition<T>, PlanError> {
    if start >= end || !T::is_valid_step(step) {
        return Err(PlanError::InvalidRange);
    }

    let expected = T::steps_between(start, end, step).unwrap_or(0);
    let mut units = Vec::with_capacity(initial_reserve(expected, hard_unit_cap));
    let mut cursor = start;

    while cursor < end {
        let index = units.len() as u64 + 1;
        if index > hard_unit_cap {
            let requested = T::steps_between(start, end, step).unwrap_or(index);
            tracing::warn!(
                requested,
                allowed = hard_unit_cap,
                "decomposition exceeds hard unit cap"
            );
            return Err(PlanError::CapExceeded {
                requested,
                allowed: hard_unit_cap,
            });
        }

        // Overflow or overshoot both clamp to the end of the range
        let next = match cursor.advance(step) {
            Some(next) if next < end => next,
            _ => end,
        };

        units.push(WorkUnit {
            index,
            range_start: cursor,
            range_end: next,
        });
        cursor = next;
    }

    if units.is_empty() {
        return Err(PlanError::EmptyResult);
    }

    tracing::debug!(units = units.len(), "range decomposed");
    Ok(Decomposition { units })
}

fn initial_reserve(expected: u64, hard_unit_cap: u64) -> usize {
    expected.min(hard_unit_cap).min(MAX_INITIAL_RESERVE) as usize
}
