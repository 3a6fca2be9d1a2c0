//! A reservoir-backed distribution of observed values.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::clock::Clock;
use crate::error::Error;
use crate::reservoir::{
    ExponentiallyDecayingReservoir, HdrConfig, HdrReservoir, Reservoir, SlidingWindowReservoir,
    UniformReservoir,
};
use crate::scheduler::Scheduler;
use crate::values::HistogramValue;

struct LastObservation {
    value: i64,
    user_value: Option<Arc<String>>,
}

/// A distribution of observed values, backed by a sampling [`Reservoir`].
///
/// Alongside the reservoir, the histogram remembers the most recent
/// observation and its tag.  That cell is advisory, last-writer-wins under
/// concurrency.
pub struct Histogram {
    reservoir: Box<dyn Reservoir>,
    last: ArcSwapOption<LastObservation>,
}

impl Histogram {
    /// Creates a histogram over the given reservoir.
    pub fn new(reservoir: Box<dyn Reservoir>) -> Self {
        Histogram { reservoir, last: ArcSwapOption::const_empty() }
    }

    /// A histogram sampling uniformly over its whole lifetime.
    pub fn with_uniform_sampling() -> Self {
        Self::new(Box::new(UniformReservoir::new()))
    }

    /// A histogram over the last `capacity` observations.
    pub fn with_sliding_window(capacity: usize) -> Self {
        Self::new(Box::new(SlidingWindowReservoir::new(capacity)))
    }

    /// A histogram biased towards the last few minutes of data.
    pub fn with_exponential_decay<S: Scheduler + ?Sized>(
        clock: Arc<dyn Clock>,
        scheduler: &S,
    ) -> Self {
        Self::new(Box::new(ExponentiallyDecayingReservoir::new(clock, scheduler)))
    }

    /// A histogram recording into high-dynamic-range logarithmic buckets.
    pub fn with_high_dynamic_range(config: HdrConfig) -> Result<Self, Error> {
        Ok(Self::new(Box::new(HdrReservoir::new(config)?)))
    }

    /// Records an observation.
    pub fn update(&self, value: i64) {
        self.update_opt(value, None);
    }

    /// Records an observation tagged with a free-form user value.
    pub fn update_tagged<S: Into<String>>(&self, value: i64, user_value: S) {
        self.update_opt(value, Some(Arc::new(user_value.into())));
    }

    pub(crate) fn update_opt(&self, value: i64, user_value: Option<Arc<String>>) {
        self.last.store(Some(Arc::new(LastObservation {
            value,
            user_value: user_value.clone(),
        })));
        self.reservoir.update_tagged(value, user_value);
    }

    /// Renders the histogram into a [`HistogramValue`].
    pub fn value(&self) -> HistogramValue {
        self.value_inner(false)
    }

    /// Renders the histogram and resets it.
    pub fn value_and_reset(&self) -> HistogramValue {
        self.value_inner(true)
    }

    /// Discards all samples and the last-observed cell.
    pub fn reset(&self) {
        self.reservoir.reset();
        self.last.store(None);
    }

    fn value_inner(&self, reset: bool) -> HistogramValue {
        let snapshot = self.reservoir.snapshot(reset);
        let last = if reset { self.last.swap(None) } else { self.last.load_full() };

        match last {
            Some(last) => HistogramValue {
                last_value: last.value as f64,
                last_user_value: last.user_value.clone(),
                snapshot,
            },
            None => HistogramValue { last_value: 0.0, last_user_value: None, snapshot },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Histogram;
    use crate::snapshot::Snapshot as _;

    #[test]
    fn tracks_the_last_observation() {
        let histogram = Histogram::with_uniform_sampling();
        histogram.update(5);
        histogram.update_tagged(9, "req-7");

        let value = histogram.value();
        assert_eq!(value.last_value, 9.0);
        assert_eq!(value.last_user_value.unwrap().as_str(), "req-7");
        assert_eq!(value.snapshot.count(), 2);
    }

    #[test]
    fn value_and_reset_clears_samples_and_last() {
        let histogram = Histogram::with_sliding_window(8);
        histogram.update_tagged(3, "x");

        let value = histogram.value_and_reset();
        assert_eq!(value.last_value, 3.0);
        assert_eq!(value.snapshot.size(), 1);

        let after = histogram.value();
        assert_eq!(after.last_value, 0.0);
        assert!(after.last_user_value.is_none());
        assert_eq!(after.snapshot.count(), 0);
        assert_eq!(after.snapshot.size(), 0);
    }

    #[test]
    fn snapshot_aggregates_flow_through() {
        let histogram = Histogram::with_sliding_window(16);
        for v in [10, 20, 30, 40] {
            histogram.update(v);
        }

        let value = histogram.value();
        assert_eq!(value.snapshot.min(), 10.0);
        assert_eq!(value.snapshot.max(), 40.0);
        assert_eq!(value.snapshot.mean(), 25.0);
        assert_eq!(value.snapshot.values(), vec![10.0, 20.0, 30.0, 40.0]);
    }
}
