//! The tick-driven EWMA rate engine behind meters.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use crate::adder::StripedAdder;
use crate::atomics::AtomicDouble;

/// How often [`SimpleMeter::tick`] is expected to be driven.
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

const INTERVAL_NANOS: f64 = 5_000_000_000.0;
const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Smoothing factor for a `minutes`-long moving average ticked every 5 s.
fn alpha(minutes: f64) -> f64 {
    1.0 - (-TICK_INTERVAL.as_secs_f64() / (60.0 * minutes)).exp()
}

struct Ewma {
    alpha: f64,
    rate: AtomicDouble,
}

impl Ewma {
    fn new(minutes: f64) -> Self {
        Ewma { alpha: alpha(minutes), rate: AtomicDouble::new(0.0) }
    }

    fn tick(&self, instant_rate: f64, initialized: bool) {
        if initialized {
            let rate = self.rate.get();
            self.rate.set(rate + self.alpha * (instant_rate - rate));
        } else {
            self.rate.set(instant_rate);
        }
    }
}

/// Raw rates out of a [`SimpleMeter`], in events per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterRates {
    /// Events observed since creation or the last reset.
    pub count: i64,
    /// Lifetime events divided by elapsed time.
    pub mean_rate: f64,
    /// One-minute moving average.
    pub one_minute_rate: f64,
    /// Five-minute moving average.
    pub five_minute_rate: f64,
    /// Fifteen-minute moving average.
    pub fifteen_minute_rate: f64,
}

/// The EWMA engine: three moving averages over 1/5/15-minute windows,
/// advanced by an external 5-second tick.
///
/// Marks land in a striped adder; each tick drains it, folds the instant
/// rate into the moving averages, and accumulates the lifetime total.  The
/// stored rates are per-nanosecond (marks divided by the tick interval in
/// nanoseconds) and are multiplied out to per-second only when read.
///
/// Until the first tick, all moving averages read zero.
pub struct SimpleMeter {
    uncounted: StripedAdder,
    total: AtomicI64,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
    initialized: AtomicBool,
}

impl SimpleMeter {
    /// Creates a zeroed meter.
    pub fn new() -> Self {
        SimpleMeter {
            uncounted: StripedAdder::new(),
            total: AtomicI64::new(0),
            m1: Ewma::new(1.0),
            m5: Ewma::new(5.0),
            m15: Ewma::new(15.0),
            initialized: AtomicBool::new(false),
        }
    }

    /// Records `count` events.
    pub fn mark(&self, count: i64) {
        self.uncounted.add(count);
    }

    /// Advances the moving averages by one tick interval.
    ///
    /// Called by the owning meter's scheduler; a single ticker at a time is
    /// assumed.
    pub fn tick(&self) {
        let count = self.uncounted.sum_and_reset();
        self.total.fetch_add(count, Ordering::Relaxed);

        let instant_rate = count as f64 / INTERVAL_NANOS;
        let initialized = self.initialized.load(Ordering::Acquire);
        self.m1.tick(instant_rate, initialized);
        self.m5.tick(instant_rate, initialized);
        self.m15.tick(instant_rate, initialized);
        if !initialized {
            self.initialized.store(true, Ordering::Release);
        }
    }

    /// Reads the rates over `elapsed_nanos` of lifetime.
    pub fn rates(&self, elapsed_nanos: u64) -> MeterRates {
        let count = self.total.load(Ordering::Relaxed) + self.uncounted.sum();
        let mean_rate = if elapsed_nanos == 0 {
            0.0
        } else {
            count as f64 / elapsed_nanos as f64 * NANOS_PER_SECOND
        };

        MeterRates {
            count,
            mean_rate,
            one_minute_rate: self.m1.rate.get() * NANOS_PER_SECOND,
            five_minute_rate: self.m5.rate.get() * NANOS_PER_SECOND,
            fifteen_minute_rate: self.m15.rate.get() * NANOS_PER_SECOND,
        }
    }

    /// Zeroes all state, returning the meter to its pre-first-tick shape.
    pub fn reset(&self) {
        self.uncounted.sum_and_reset();
        self.total.store(0, Ordering::Relaxed);
        self.m1.rate.set(0.0);
        self.m5.rate.set(0.0);
        self.m15.rate.set(0.0);
        self.initialized.store(false, Ordering::Release);
    }
}

impl Default for SimpleMeter {
    fn default() -> Self {
        Self::new()
    }
}
