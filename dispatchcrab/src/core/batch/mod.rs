//! Batch packing
//!
//! Greedily groups decomposed units into sequential [`Batch`]es no larger
//! than the rate model's safe batch size. Unit order is preserved: every
//! batch is a contiguous slice and only the last one may be short.

use super::{RateModel, WorkUnit};
use serde::Serialize;


/// A contiguous group of units sized to fit one execution window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch<T> {
    /// 1-based position in the plan
    pub batch_number: usize,
    pub units: Vec<WorkUnit<T>>,
    /// `ceil(units.len() * delay_per_unit)` in seconds
    pub estimated_duration_secs: u64,
}

impl<T> Batch<T> {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Ordered batches plus aggregate timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan<T> {
    pub batches: Vec<Batch<T>>,
    /// Sum of every batch's estimate
    pub total_estimated_secs: u64,
    /// More than one batch was produced
    pub requires_batching: bool,
}

impl<T> ExecutionPlan<T> {
    /// Number of units across all batches
    pub fn total_units(&self) -> usize {
        self.batches.iter().map(Batch::len).sum()
    }

    /// Every unit in dispatch order
    pub fn units(&self) -> impl Iterator<Item = &WorkUnit<T>> {
        self.batches.iter().flat_map(|batch| batch.units.iter())
    }
}

/// Pack units into batches of at most `model.max_batch_size()`
///
/// Packing cannot fail. An empty input yields an empty plan with a zero
/// estimate.
///
/// # Example
///
/// ```
/// use dispatchcrab::{RateModel, decompose, pack_batches};
///
/// let units = decompose(0u64, 37, 1, 100).unwrap().into_units();
/// let plan = pack_batches(units, &RateModel::from_rate(10, 50));
///
/// let sizes: Vec<usize> = plan.batches.iter().map(|b| b.len()).collect();
/// assert_eq!(sizes, vec![8, 8, 8, 8, 5]);
/// assert!(plan.requires_batching);
/// ```
pub fn pack_batches<T>(units: Vec<WorkUnit<T>>, model: &RateModel) -> ExecutionPlan<T> {
    let max_batch_size = model.max_batch_size().max(1);
    let mut batches = Vec::with_capacity(units.len().div_ceil(max_batch_size));
    let mut remaining = units.into_iter().peekable();

    while remaining.peek().is_some() {
        let chunk: Vec<WorkUnit<T>> = remaining.by_ref().take(max_batch_size).collect();
        batches.push(Batch {
            batch_number: batches.len() + 1,
            estimated_duration_secs: model.estimate_secs(chunk.len()),
            units: chunk,
        });
    }

    let total_estimated_secs = batches.iter().map(|b| b.estimated_duration_secs).sum();
    let requires_batching = batches.len() > 1;

    ExecutionPlan {
        batches,
        total_estimated_secs,
        requires_batching,
    }
}
