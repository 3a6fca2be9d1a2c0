//! Forward-decay priority sampling (Cormode, Shkapenyuk, Srivastava, Xu).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use ordered_float::OrderedFloat;
use parking_lot::Mutex;

use super::{random_unit, Reservoir, DEFAULT_CAPACITY};
use crate::clock::Clock;
use crate::scheduler::{Scheduler, TickHandle};
use crate::snapshot::{SnapshotRef, WeightedSample, WeightedSnapshot};

/// Configuration for [`ExponentiallyDecayingReservoir`].
#[derive(Debug, Clone)]
pub struct ExponentiallyDecayingConfig {
    /// Maximum number of stored samples.
    pub capacity: usize,
    /// Decay factor; higher values bias more strongly towards recent data.
    pub alpha: f64,
    /// How often the decay landmark is re-anchored.  A zero interval
    /// disables the periodic rescale.
    pub rescale_interval: Duration,
}

impl Default for ExponentiallyDecayingConfig {
    fn default() -> Self {
        ExponentiallyDecayingConfig {
            capacity: DEFAULT_CAPACITY,
            alpha: 0.015,
            rescale_interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Priority keys carry a sequence number so equal priorities never displace
/// an existing sample.
type PriorityKey = (OrderedFloat<f64>, u64);

struct State {
    samples: BTreeMap<PriorityKey, WeightedSample>,
    landmark: u64,
    next_seq: u64,
    count: u64,
}

impl State {
    fn rescale(&mut self, alpha: f64, now: u64) {
        let elapsed = now.saturating_sub(self.landmark) as f64;
        let factor = (-alpha * elapsed).exp();

        let old = std::mem::take(&mut self.samples);
        for ((priority, seq), mut sample) in old {
            sample.weight *= factor;
            if sample.weight > 0.0 {
                self.samples.insert((OrderedFloat(priority.0 * factor), seq), sample);
            }
        }

        self.landmark = now;
        self.count = self.samples.len() as u64;
    }
}

/// A reservoir biased towards recent observations.
///
/// Each observation receives priority `exp(alpha * (t - landmark)) / u` for
/// uniform `u` in `(0, 1)`; the top-N priorities form the sample.  Because
/// weights grow exponentially from the landmark, the landmark is re-anchored
/// periodically (hourly by default) by multiplying every stored key and
/// weight by a common `exp(-alpha * dt)` factor, which preserves relative
/// priorities while keeping the exponents bounded over long uptimes.
///
/// All mutating operations take a single mutex; the reader critical section
/// is a copy of the stored values and weights.
pub struct ExponentiallyDecayingReservoir {
    // Declared first so the rescale schedule stops before the samples go.
    _rescale: Option<TickHandle>,
    state: Arc<Mutex<State>>,
    clock: Arc<dyn Clock>,
    alpha: f64,
    capacity: usize,
}

impl ExponentiallyDecayingReservoir {
    /// Creates a reservoir with default settings (capacity 1028, alpha
    /// 0.015, hourly rescale) driven by `clock` and `scheduler`.
    pub fn new<S: Scheduler + ?Sized>(clock: Arc<dyn Clock>, scheduler: &S) -> Self {
        Self::with_config(ExponentiallyDecayingConfig::default(), clock, scheduler)
    }

    /// Creates a reservoir with explicit settings.
    pub fn with_config<S: Scheduler + ?Sized>(
        config: ExponentiallyDecayingConfig,
        clock: Arc<dyn Clock>,
        scheduler: &S,
    ) -> Self {
        let state = Arc::new(Mutex::new(State {
            samples: BTreeMap::new(),
            landmark: clock.seconds(),
            next_seq: 0,
            count: 0,
        }));

        let rescale = if config.rescale_interval.is_zero() {
            None
        } else {
            let weak = Arc::downgrade(&state);
            let tick_clock = Arc::clone(&clock);
            let alpha = config.alpha;
            scheduler
                .schedule(
                    config.rescale_interval,
                    Box::new(move || {
                        if let Some(state) = weak.upgrade() {
                            state.lock().rescale(alpha, tick_clock.seconds());
                        }
                    }),
                )
                .ok()
        };

        ExponentiallyDecayingReservoir {
            state,
            clock,
            alpha: config.alpha,
            capacity: config.capacity,
            _rescale: rescale,
        }
    }

    /// The number of samples currently stored.
    pub fn size(&self) -> usize {
        self.state.lock().samples.len()
    }

    /// Re-anchors the decay landmark immediately.
    pub fn rescale(&self) {
        self.state.lock().rescale(self.alpha, self.clock.seconds());
    }
}

impl Reservoir for ExponentiallyDecayingReservoir {
    fn update_tagged(&self, value: i64, user_value: Option<Arc<String>>) {
        let now = self.clock.seconds();
        let u = random_unit();

        let mut state = self.state.lock();
        let elapsed = now.saturating_sub(state.landmark) as f64;
        let weight = (self.alpha * elapsed).exp();
        let priority = OrderedFloat(weight / u);

        let seq = state.next_seq;
        state.next_seq += 1;
        state.count += 1;

        let sample = WeightedSample { value, user_value, weight };
        if state.samples.len() < self.capacity {
            state.samples.insert((priority, seq), sample);
        } else {
            let lowest = state.samples.first_key_value().map(|(key, _)| key.0);
            if lowest.is_some_and(|lowest| priority > lowest) {
                state.samples.pop_first();
                state.samples.insert((priority, seq), sample);
            }
        }
    }

    fn snapshot(&self, reset: bool) -> SnapshotRef {
        let mut state = self.state.lock();
        let samples: Vec<WeightedSample> = state.samples.values().cloned().collect();
        let count = state.count;

        if reset {
            state.samples.clear();
            state.count = 0;
            state.landmark = self.clock.seconds();
        }

        Arc::new(WeightedSnapshot::new(count, samples))
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.samples.clear();
        state.count = 0;
        state.landmark = self.clock.seconds();
    }
}
