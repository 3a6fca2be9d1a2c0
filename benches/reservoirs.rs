use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use instruments::metrics::Counter;
use instruments::reservoir::{
    ExponentiallyDecayingReservoir, HdrConfig, HdrReservoir, Reservoir, SlidingWindowReservoir,
    UniformReservoir,
};
use instruments::test_util::ManualScheduler;
use instruments::MonotonicClock;

fn reservoir_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("reservoir");

    group.bench_function("uniform update", |b| {
        let reservoir = UniformReservoir::new();
        let mut value = 0i64;
        b.iter(|| {
            value = value.wrapping_add(1);
            reservoir.update(value);
        });
    });

    group.bench_function("sliding window update", |b| {
        let reservoir = SlidingWindowReservoir::new(1028);
        let mut value = 0i64;
        b.iter(|| {
            value = value.wrapping_add(1);
            reservoir.update(value);
        });
    });

    group.bench_function("exponentially decaying update", |b| {
        let clock = Arc::new(MonotonicClock::new());
        let scheduler = ManualScheduler::new();
        let reservoir = ExponentiallyDecayingReservoir::new(clock, &scheduler);
        let mut value = 0i64;
        b.iter(|| {
            value = value.wrapping_add(1);
            reservoir.update(value);
        });
    });

    group.bench_function("hdr update", |b| {
        let reservoir = HdrReservoir::new(HdrConfig::default()).unwrap();
        let mut value = 0i64;
        b.iter(|| {
            value = (value % 1_000_000) + 1;
            reservoir.update(value);
        });
    });

    group.finish();
}

fn counter_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("counter");

    group.bench_function("increment", |b| {
        let counter = Counter::new();
        b.iter(|| counter.increment());
    });

    group.bench_function("tagged increment", |b| {
        let counter = Counter::new();
        b.iter(|| counter.increment_item("item"));
    });

    group.finish();
}

criterion_group!(benches, reservoir_benchmark, counter_benchmark);
criterion_main!(benches);
