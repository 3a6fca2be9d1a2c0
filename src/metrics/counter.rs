//! A striped counter with optional per-item breakdowns.

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::adder::StripedAdder;
use crate::values::{percent_of, sort_counter_items, CounterSetItem, CounterValue};

/// A 64-bit counter.
///
/// Plain updates land in a striped adder.  Tagged updates additionally feed
/// a per-item adder held in a concurrent map, which is only allocated once
/// the first tagged update arrives, so untagged counters never pay for it.
pub struct Counter {
    total: StripedAdder,
    items: OnceCell<DashMap<String, StripedAdder>>,
}

impl Counter {
    /// Creates a zeroed counter.
    pub fn new() -> Self {
        Counter { total: StripedAdder::new(), items: OnceCell::new() }
    }

    /// Adds one.
    pub fn increment(&self) {
        self.total.increment();
    }

    /// Subtracts one.
    pub fn decrement(&self) {
        self.total.decrement();
    }

    /// Adds `value`, which may be negative.
    pub fn add(&self, value: i64) {
        self.total.add(value);
    }

    /// Adds one to the counter and to `item`'s slice of it.
    pub fn increment_item(&self, item: &str) {
        self.add_item(item, 1);
    }

    /// Adds `value` to the counter and to `item`'s slice of it.
    pub fn add_item(&self, item: &str, value: i64) {
        self.total.add(value);

        let items = self.items.get_or_init(DashMap::new);
        if let Some(adder) = items.get(item) {
            adder.add(value);
        } else {
            items.entry(item.to_string()).or_default().add(value);
        }
    }

    /// The current total, summed across stripes.
    pub fn count(&self) -> i64 {
        self.total.sum()
    }

    /// Renders the counter into a [`CounterValue`].
    pub fn value(&self) -> CounterValue {
        self.value_inner(false)
    }

    /// Renders the counter and resets it.
    ///
    /// Each stripe is exchanged with zero, so updates racing with the reset
    /// are attributed to exactly one side of the boundary.
    pub fn value_and_reset(&self) -> CounterValue {
        self.value_inner(true)
    }

    /// Zeroes the total and every per-item adder.
    pub fn reset(&self) {
        self.total.sum_and_reset();
        if let Some(items) = self.items.get() {
            for entry in items.iter() {
                entry.value().sum_and_reset();
            }
        }
    }

    fn value_inner(&self, reset: bool) -> CounterValue {
        let mut items = Vec::new();
        if let Some(map) = self.items.get() {
            items.reserve(map.len());
            for entry in map.iter() {
                let count =
                    if reset { entry.value().sum_and_reset() } else { entry.value().sum() };
                items.push(CounterSetItem { item: entry.key().clone(), count, percent: 0.0 });
            }
        }

        let count = if reset { self.total.sum_and_reset() } else { self.total.sum() };
        for item in &mut items {
            item.percent = percent_of(item.count, count);
        }
        sort_counter_items(&mut items);

        CounterValue { count, items }
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Counter;
    use std::thread;

    #[test]
    fn untagged_counting() {
        let counter = Counter::new();
        counter.increment();
        counter.add(10);
        counter.decrement();

        let value = counter.value();
        assert_eq!(value.count, 10);
        assert!(value.items.is_empty());
    }

    #[test]
    fn items_report_percentages_sorted() {
        let counter = Counter::new();
        counter.add_item("a", 3);
        counter.add_item("b", 1);

        let value = counter.value();
        assert_eq!(value.count, 4);
        assert_eq!(value.items.len(), 2);
        assert_eq!(value.items[0].item, "a");
        assert_eq!(value.items[0].count, 3);
        assert_eq!(value.items[0].percent, 75.0);
        assert_eq!(value.items[1].item, "b");
        assert_eq!(value.items[1].count, 1);
        assert_eq!(value.items[1].percent, 25.0);
    }

    #[test]
    fn percent_ties_break_by_key() {
        let counter = Counter::new();
        counter.add_item("z", 2);
        counter.add_item("a", 2);
        counter.add_item("m", 2);

        let value = counter.value();
        let keys: Vec<&str> = value.items.iter().map(|i| i.item.as_str()).collect();
        assert_eq!(keys, ["a", "m", "z"]);
    }

    #[test]
    fn item_counts_sum_to_total_when_all_updates_are_tagged() {
        let counter = Counter::new();
        counter.add_item("a", 7);
        counter.add_item("b", 5);

        let value = counter.value();
        let item_sum: i64 = value.items.iter().map(|i| i.count).sum();
        assert_eq!(value.count, item_sum);
        let percent_sum: f64 = value.items.iter().map(|i| i.percent).sum();
        assert!((percent_sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn zero_total_has_zero_percents() {
        let counter = Counter::new();
        counter.add_item("a", 5);
        counter.add_item("a", -5);

        let value = counter.value();
        assert_eq!(value.count, 0);
        assert_eq!(value.items[0].percent, 0.0);
    }

    #[test]
    fn value_and_reset_clears_everything() {
        let counter = Counter::new();
        counter.add_item("a", 3);
        counter.add(2);

        let value = counter.value_and_reset();
        assert_eq!(value.count, 5);

        let after = counter.value();
        assert_eq!(after.count, 0);
        assert_eq!(after.items.len(), 1);
        assert_eq!(after.items[0].count, 0);
    }

    #[test]
    fn concurrent_increments_sum_exactly() {
        let counter = Counter::new();
        let threads = 8;
        let per_thread = 25_000;

        thread::scope(|s| {
            for t in 0..threads {
                let item = if t % 2 == 0 { "even" } else { "odd" };
                let counter = &counter;
                s.spawn(move || {
                    for _ in 0..per_thread {
                        counter.increment_item(item);
                    }
                });
            }
        });

        let value = counter.value();
        assert_eq!(value.count, (threads * per_thread) as i64);
        let item_sum: i64 = value.items.iter().map(|i| i.count).sum();
        assert_eq!(item_sum, value.count);
    }
}
