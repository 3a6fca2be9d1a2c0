//! An event-rate meter with per-item breakdowns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::clock::Clock;
use crate::ewma::{SimpleMeter, TICK_INTERVAL};
use crate::scheduler::{Scheduler, TickHandle};
use crate::values::{percent_of, sort_meter_items, MeterSetItem, MeterValue};

struct MeterState {
    global: SimpleMeter,
    items: OnceCell<DashMap<String, Arc<SimpleMeter>>>,
    start: AtomicU64,
}

impl MeterState {
    fn tick(&self) {
        self.global.tick();
        if let Some(items) = self.items.get() {
            for entry in items.iter() {
                entry.value().tick();
            }
        }
    }
}

/// Measures the rate of a stream of events: lifetime mean plus 1/5/15-minute
/// moving averages, with an optional per-item breakdown.
///
/// The meter owns a 5-second tick schedule that advances its own EWMA engine
/// and every item's.  Dropping the meter stops the schedule.
pub struct Meter {
    // Declared first so the schedule stops before the state is released.
    _tick: Option<TickHandle>,
    state: Arc<MeterState>,
    clock: Arc<dyn Clock>,
}

impl Meter {
    /// Creates a meter driven by `clock` and ticked by `scheduler`.
    pub fn new<S: Scheduler + ?Sized>(clock: Arc<dyn Clock>, scheduler: &S) -> Self {
        let state = Arc::new(MeterState {
            global: SimpleMeter::new(),
            items: OnceCell::new(),
            start: AtomicU64::new(clock.nanoseconds()),
        });

        let weak = Arc::downgrade(&state);
        let tick = scheduler
            .schedule(
                TICK_INTERVAL,
                Box::new(move || {
                    if let Some(state) = weak.upgrade() {
                        state.tick();
                    }
                }),
            )
            .ok();

        Meter { state, clock, _tick: tick }
    }

    /// Records one event.
    pub fn mark(&self) {
        self.mark_by(1);
    }

    /// Records `count` events.
    pub fn mark_by(&self, count: i64) {
        self.state.global.mark(count);
    }

    /// Records one event attributed to `item`.
    pub fn mark_item(&self, item: &str) {
        self.mark_item_by(item, 1);
    }

    /// Records `count` events attributed to `item`.
    ///
    /// The item's meter is created on first use and ticks in lockstep with
    /// the global one from then on.
    pub fn mark_item_by(&self, item: &str, count: i64) {
        self.state.global.mark(count);

        let items = self.state.items.get_or_init(DashMap::new);
        if let Some(meter) = items.get(item) {
            meter.mark(count);
        } else {
            items
                .entry(item.to_string())
                .or_insert_with(|| Arc::new(SimpleMeter::new()))
                .mark(count);
        }
    }

    /// Renders the meter into a [`MeterValue`] with per-second rates.
    pub fn value(&self) -> MeterValue {
        self.value_inner(false)
    }

    /// Renders the meter and resets it.
    pub fn value_and_reset(&self) -> MeterValue {
        self.value_inner(true)
    }

    /// Re-anchors the start time and zeroes the global and item engines.
    ///
    /// The item map itself is retained so exporters keep seeing a stable set
    /// of keys across resets.
    pub fn reset(&self) {
        self.state.start.store(self.clock.nanoseconds(), Ordering::Release);
        self.state.global.reset();
        if let Some(items) = self.state.items.get() {
            for entry in items.iter() {
                entry.value().reset();
            }
        }
    }

    fn value_inner(&self, reset: bool) -> MeterValue {
        let now = self.clock.nanoseconds();
        let start = self.state.start.load(Ordering::Acquire);
        let elapsed = now.saturating_sub(start);

        let rates = self.state.global.rates(elapsed);

        let mut items = Vec::new();
        if let Some(map) = self.state.items.get() {
            items.reserve(map.len());
            for entry in map.iter() {
                let item_rates = entry.value().rates(elapsed);
                items.push(MeterSetItem {
                    item: entry.key().clone(),
                    percent: percent_of(item_rates.count, rates.count),
                    value: MeterValue::from_rates(item_rates, Vec::new()),
                });
            }
        }
        sort_meter_items(&mut items);

        if reset {
            self.reset();
        }

        MeterValue::from_rates(rates, items)
    }
}

#[cfg(test)]
mod tests {
    use super::Meter;
    use crate::clock::MonotonicClock;
    use crate::test_util::ManualScheduler;
    use crate::units::TimeUnit;
    use std::sync::Arc;
    use std::time::Duration;

    fn meter() -> (Meter, Arc<quanta::Mock>, ManualScheduler) {
        let (clock, mock) = MonotonicClock::mock();
        let scheduler = ManualScheduler::new();
        let meter = Meter::new(Arc::new(clock), &scheduler);
        (meter, mock, scheduler)
    }

    #[test]
    fn rates_are_zero_before_the_first_tick() {
        let (meter, mock, _scheduler) = meter();
        meter.mark_by(100);
        mock.increment(Duration::from_secs(10));

        let value = meter.value();
        assert_eq!(value.count, 100);
        assert_eq!(value.one_minute_rate, 0.0);
        assert_eq!(value.five_minute_rate, 0.0);
        assert_eq!(value.fifteen_minute_rate, 0.0);
        assert!((value.mean_rate - 10.0).abs() < 1e-9);
        assert_eq!(value.rate_unit, TimeUnit::Seconds);
    }

    #[test]
    fn ticks_drive_the_moving_averages() {
        let (meter, mock, scheduler) = meter();
        meter.mark_by(5);
        mock.increment(Duration::from_secs(5));
        scheduler.fire_all();

        let value = meter.value();
        assert!((value.one_minute_rate - 1.0).abs() < 1e-9);

        // Idle ticks decay m1 faster than m5.
        for _ in 0..5 {
            mock.increment(Duration::from_secs(5));
            scheduler.fire_all();
        }
        let decayed = meter.value();
        assert!(decayed.one_minute_rate < value.one_minute_rate);
        assert!(decayed.five_minute_rate > decayed.one_minute_rate);
    }

    #[test]
    fn items_share_the_elapsed_window_and_sort_by_percent() {
        let (meter, mock, scheduler) = meter();
        meter.mark_item_by("a", 3);
        meter.mark_item_by("b", 1);
        mock.increment(Duration::from_secs(5));
        scheduler.fire_all();

        let value = meter.value();
        assert_eq!(value.count, 4);
        assert_eq!(value.items.len(), 2);
        assert_eq!(value.items[0].item, "a");
        assert_eq!(value.items[0].percent, 75.0);
        assert_eq!(value.items[1].item, "b");
        assert_eq!(value.items[1].percent, 25.0);

        let item_sum: i64 = value.items.iter().map(|i| i.value.count).sum();
        assert_eq!(item_sum, value.count);
    }

    #[test]
    fn reset_keeps_the_item_map() {
        let (meter, mock, scheduler) = meter();
        meter.mark_item("a");
        mock.increment(Duration::from_secs(5));
        scheduler.fire_all();

        let value = meter.value_and_reset();
        assert_eq!(value.count, 1);

        // Items survive as keys with zeroed state.
        let after = meter.value();
        assert_eq!(after.count, 0);
        assert_eq!(after.items.len(), 1);
        assert_eq!(after.items[0].item, "a");
        assert_eq!(after.items[0].value.count, 0);
        assert_eq!(after.one_minute_rate, 0.0);
    }

    #[test]
    fn mean_rate_uses_time_since_reset() {
        let (meter, mock, _scheduler) = meter();
        mock.increment(Duration::from_secs(100));
        meter.reset();

        meter.mark_by(30);
        mock.increment(Duration::from_secs(3));
        let value = meter.value();
        assert!((value.mean_rate - 10.0).abs() < 1e-9);
    }
}
