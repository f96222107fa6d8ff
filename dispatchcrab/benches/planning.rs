use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use dispatchcrab::{DAY, ManualClock, RateLimitConfig, RateModel, Throttle, ThrottleConfig};
use dispatchcrab::{decompose, pack_batches, plan};
use std::hint::black_box;
use std::time::{Duration, SystemTime};

fn benchmark_decompose(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompose");

    for units in [10u64, 1_000, 100_000] {
        group.throughput(Throughput::Elements(units));
        group.bench_with_input(format!("count_range_{units}"), &units, |b, &units| {
            b.iter(|| {
                let result = decompose(black_box(0u64), black_box(units), 1, u64::MAX).unwrap();
                black_box(result.count())
            });
        });
    }

    // Rejection must not scale with the requested range
    group.bench_function("cap_exceeded_huge_range", |b| {
        b.iter(|| {
            let result = decompose(black_box(0u64), black_box(u64::MAX), 1, 90);
            black_box(result.is_err())
        });
    });

    group.finish();
}

fn benchmark_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");
    let config = RateLimitConfig::new(10, 50, 365).unwrap();
    let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);

    group.throughput(Throughput::Elements(365));
    group.bench_function("year_of_daily_units", |b| {
        b.iter(|| {
            let plan = plan(start, start + DAY * 365, DAY, black_box(&config)).unwrap();
            black_box(plan.total_estimated_secs)
        });
    });

    group.bench_function("pack_only", |b| {
        let units = decompose(0u64, 10_000, 1, u64::MAX).unwrap().into_units();
        let model = RateModel::from_rate(600, 900);
        b.iter(|| {
            let plan = pack_batches(black_box(units.clone()), &model);
            black_box(plan.batches.len())
        });
    });

    group.finish();
}

fn benchmark_throttle(c: &mut Criterion) {
    let mut group = c.benchmark_group("throttle");
    group.throughput(Throughput::Elements(1));

    group.bench_function("acquire_manual_clock", |b| {
        let clock = ManualClock::new(SystemTime::UNIX_EPOCH);
        let config = ThrottleConfig {
            max_per_day: u64::MAX,
            ..ThrottleConfig::bulk_email()
        };
        let mut throttle = Throttle::with_clock(config, clock);

        b.iter(|| {
            let acquisition = tokio_test::block_on(throttle.acquire()).unwrap();
            black_box(acquisition.waited)
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_decompose, benchmark_plan, benchmark_throttle);
criterion_main!(benches);
