use super::{DAY, MAX_INITIAL_RESERVE, Span, WorkUnit, decompose, initial_reserve};
use crate::core::PlanError;
use std::time::{Duration, SystemTime};

fn day0() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

fn assert_contiguous<T: Span>(units: &[WorkUnit<T>], start: T, end: T) {
    assert_eq!(units.first().unwrap().range_start, start);
    assert_eq!(units.last().unwrap().range_end, end);
    for pair in units.windows(2) {
        assert_eq!(pair[0].range_end, pair[1].range_start);
    }
    for (i, unit) in units.iter().enumerate() {
        assert_eq!(unit.index, i as u64 + 1);
        assert!(unit.range_start < unit.range_end);
    }
}

#[test]
fn test_thirty_days_in_weeks() {
    let start = day0();
    let end = start + DAY * 30;
    let result = decompose(start, end, DAY * 7, 90).unwrap();

    assert_eq!(result.count(), 5);
    assert_contiguous(result.units(), start, end);

    let lengths: Vec<Duration> = result
        .units()
        .iter()
        .map(|u| u.range_end.duration_since(u.range_start).unwrap())
        .collect();
    assert_eq!(lengths, vec![DAY * 7, DAY * 7, DAY * 7, DAY * 7, DAY * 2]);
}

#[test]
fn test_exact_multiple_has_no_short_tail() {
    let result = decompose(0u64, 100, 25, 10).unwrap();
    assert_eq!(result.count(), 4);
    assert!(result.units().iter().all(|u| u.range_end - u.range_start == 25));
}

#[test]
fn test_step_larger_than_range() {
    let result = decompose(10u64, 13, 1_000, 5).unwrap();
    assert_eq!(
        result.units(),
        &[WorkUnit {
            index: 1,
            range_start: 10,
            range_end: 13
        }]
    );
}

#[test]
fn test_contiguity_over_many_shapes() {
    for start in [0u64, 3, 17] {
        for len in 1..60u64 {
            for step in 1..12u64 {
                let end = start + len;
                let result = decompose(start, end, step, u64::MAX).unwrap();
                assert_contiguous(result.units(), start, end);
                assert_eq!(result.count() as u64, len.div_ceil(step));
            }
        }
    }
}

#[test]
fn test_invalid_range() {
    assert_eq!(decompose(5u64, 5, 1, 10), Err(PlanError::InvalidRange));
    assert_eq!(decompose(9u64, 5, 1, 10), Err(PlanError::InvalidRange));
    assert_eq!(decompose(0u64, 5, 0, 10), Err(PlanError::InvalidRange));

    let start = day0();
    assert_eq!(
        decompose(start, start + DAY, Duration::ZERO, 10),
        Err(PlanError::InvalidRange)
    );
}

#[test]
fn test_cap_exceeded_by_one() {
    // 91 daily units against a cap of 90
    let start = day0();
    let end = start + DAY * 91;
    assert_eq!(
        decompose(start, end, DAY, 90),
        Err(PlanError::CapExceeded {
            requested: 91,
            allowed: 90
        })
    );

    // Exactly at the cap is fine
    assert_eq!(decompose(start, start + DAY * 90, DAY, 90).unwrap().count(), 90);
}

#[test]
fn test_cap_fails_fast_on_huge_ranges() {
    // Would be ~1.8e19 units if fully decomposed
    let err = decompose(0u64, u64::MAX, 1, 1_000).unwrap_err();
    assert_eq!(
        err,
        PlanError::CapExceeded {
            requested: u64::MAX,
            allowed: 1_000
        }
    );
}

#[test]
fn test_reserve_is_bounded_for_uncapped_requests() {
    assert_eq!(initial_reserve(u64::MAX, u64::MAX), MAX_INITIAL_RESERVE as usize);
    assert_eq!(initial_reserve(u64::MAX, 90), 90);
    assert_eq!(initial_reserve(5, u64::MAX), 5);
}

#[test]
fn test_uncapped_request_grows_past_reserve() {
    let units = 3 * MAX_INITIAL_RESERVE + 7;
    let result = decompose(0u64, units, 1, u64::MAX).unwrap();

    assert_eq!(result.count() as u64, units);
    assert_contiguous(result.units(), 0, units);
}

#[test]
fn test_advance_overflow_clamps_to_end() {
    let result = decompose(u64::MAX - 10, u64::MAX, u64::MAX, 4).unwrap();
    assert_eq!(result.count(), 1);
    assert_eq!(result.units()[0].range_end, u64::MAX);
}

#[test]
fn test_steps_between() {
    assert_eq!(u64::steps_between(0, 30, 7), Some(5));
    assert_eq!(u64::steps_between(0, 28, 7), Some(4));
    assert_eq!(
        SystemTime::steps_between(day0(), day0() + DAY * 30, DAY * 7),
        Some(5)
    );
    assert_eq!(
        SystemTime::steps_between(day0() + DAY, day0(), DAY),
        None
    );
}

#[test]
fn test_into_units_preserves_order() {
    let units = decompose(0u64, 10, 3, 10).unwrap().into_units();
    let starts: Vec<u64> = units.iter().map(|u| u.range_start).collect();
    assert_eq!(starts, vec![0, 3, 6, 9]);
}
