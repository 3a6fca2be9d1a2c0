//! End-to-end flow through the production clock and scheduler.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use instruments::{
    Counter, MetricValue, MetricsData, MetricsFilter, MonotonicClock, ThreadScheduler, TimeUnit,
    Timer,
};

#[test]
fn scoped_timer_records_wall_time() {
    let clock = Arc::new(MonotonicClock::new());
    let scheduler = ThreadScheduler::new();
    let timer = Timer::new(clock, &scheduler);

    {
        let _session = timer.new_context_tagged("id-42");
        thread::sleep(Duration::from_millis(50));
    }

    let value = timer.value();
    assert_eq!(value.active_sessions, 0);
    assert_eq!(value.rate.count, 1);
    assert_eq!(value.histogram.last_user_value.clone().unwrap().as_str(), "id-42");

    // Sleep granularity is coarse on loaded machines; bound generously.
    let recorded = value.histogram.last_value;
    assert!(recorded >= 40_000_000.0, "recorded {recorded}ns, expected >= 40ms");
    assert!(recorded <= 2_000_000_000.0, "recorded {recorded}ns, expected <= 2s");

    // The same observation, scaled out to milliseconds.
    let millis = value.scale(TimeUnit::Seconds, TimeUnit::Milliseconds);
    assert!(millis.histogram.last_value >= 40.0);
    assert!((millis.total_time - recorded / 1_000_000.0).abs() < 1e-6);
}

#[test]
fn timers_record_from_many_threads() {
    let clock = Arc::new(MonotonicClock::new());
    let scheduler = ThreadScheduler::new();
    let timer = Timer::new(clock, &scheduler);

    thread::scope(|s| {
        for _ in 0..4 {
            let timer = &timer;
            s.spawn(move || {
                for _ in 0..50 {
                    timer.time(|| thread::sleep(Duration::from_micros(100)));
                }
            });
        }
    });

    let value = timer.value();
    assert_eq!(value.rate.count, 200);
    assert_eq!(value.active_sessions, 0);
    assert!(value.total_time >= 200.0 * 100_000.0);
}

#[test]
fn filtered_export_drops_a_context() {
    let requests = Counter::new();
    requests.add_item("a", 3);
    requests.add_item("b", 1);

    let mut root = MetricsData::new("app");
    root.add_entry("requests", MetricValue::Counter(requests.value()));

    let mut internal = MetricsData::new("internal");
    internal.add_entry("scrapes", MetricValue::Counter(Counter::new().value()));
    root.add_child(internal);

    let filter = MetricsFilter::builder().reject_context("internal").build();
    let filtered = root.filtered(&filter);

    assert!(filtered.children.is_empty());
    assert_eq!(filtered.entries.len(), 1);
    match &filtered.entries[0].value {
        MetricValue::Counter(value) => {
            assert_eq!(value.count, 4);
            assert_eq!(value.items[0].item, "a");
            assert_eq!(value.items[0].percent, 75.0);
        }
        other => panic!("expected counter, got {other:?}"),
    }
}
