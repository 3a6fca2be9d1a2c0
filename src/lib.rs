//! High-speed in-process metrics primitives.
//!
//! `instruments` provides the metric primitives an application embeds to
//! measure its own behavior: counts, rates, latency distributions, and
//! point-in-time values.  The update path is built to absorb millions of
//! events per second across many threads with negligible overhead, while the
//! much rarer read path (a scrape every few seconds) assembles consistent,
//! unit-scaled value objects for exporters.
//!
//! # Design
//!
//! Five primitives cover the usual measurement shapes:
//!
//! - [`Counter`]: a striped 64-bit counter with optional per-item slices.
//! - [`Meter`]: event rates -- lifetime mean plus 1/5/15-minute EWMAs
//!   advanced by a background tick.
//! - [`Histogram`]: a value distribution backed by a sampling [`Reservoir`].
//! - [`Timer`]: a histogram of durations plus a meter of occurrences, with
//!   scoped recording sessions.
//! - [`Gauge`]: a point-in-time value produced by a user closure.
//!
//! Histograms choose among four reservoir strategies: uniform (Vitter's
//! Algorithm R), sliding-window, exponentially decaying (forward-decay
//! priority sampling), and high-dynamic-range logarithmic buckets.
//!
//! Time and scheduling are injected: primitives take a [`Clock`] and a
//! [`Scheduler`] rather than reaching for ambient time, which keeps decay
//! and rate arithmetic fully testable.  The registry that names and owns
//! primitives, and the reporters that consume their values, live outside
//! this crate.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use instruments::{Counter, MonotonicClock, ThreadScheduler, Timer, TimeUnit};
//!
//! let clock = Arc::new(MonotonicClock::new());
//! let scheduler = ThreadScheduler::new();
//!
//! // Counters are cheap to update from any thread.
//! let requests = Counter::new();
//! requests.increment_item("GET");
//! requests.increment_item("GET");
//! requests.increment_item("PUT");
//!
//! let value = requests.value();
//! assert_eq!(value.count, 3);
//! assert_eq!(value.items[0].item, "GET");
//!
//! // Timers record durations on every exit path via a scoped session.
//! let timer = Timer::new(clock, &scheduler);
//! {
//!     let _session = timer.new_context_tagged("req-1");
//!     // ... handle the request ...
//! }
//!
//! // Values are pure objects; scaling re-expresses them per unit system.
//! let value = timer.value().scale(TimeUnit::Seconds, TimeUnit::Milliseconds);
//! assert_eq!(value.rate.count, 1);
//! ```
//!
//! # Concurrency
//!
//! Update paths are wait-free or near-wait-free: striped adders and atomic
//! cells absorb contended writes, and reservoir slot updates never block
//! except for the decaying reservoir's short mutex and the HDR reservoir's
//! extremum-tag lock.  Reads are eventually consistent -- once writers
//! quiesce, every update is reflected exactly once -- and resets never lose
//! or double-count racing updates.

mod adder;
mod atomics;
mod clock;
mod data;
mod error;
mod ewma;
mod filter;
mod kind;
pub mod metrics;
pub mod reservoir;
mod scheduler;
mod snapshot;
pub mod test_util;
mod units;
mod values;

pub use self::adder::StripedAdder;
pub use self::atomics::AtomicDouble;
pub use self::clock::{Clock, MonotonicClock, WallClock};
pub use self::data::{MetricEntry, MetricValue, MetricsData};
pub use self::error::{Error, ErrorSink, StderrSink, TracingSink};
pub use self::ewma::{MeterRates, SimpleMeter, TICK_INTERVAL};
pub use self::filter::{MetricsFilter, MetricsFilterBuilder};
pub use self::kind::{MetricKind, MetricKindMask};
pub use self::metrics::{Counter, Gauge, Histogram, Meter, Timer, TimerContext};
pub use self::reservoir::Reservoir;
pub use self::scheduler::{Scheduler, ThreadScheduler, TickAction, TickHandle};
pub use self::snapshot::{
    SampleSnapshot, ScaledSnapshot, Snapshot, SnapshotRef, WeightedSample, WeightedSnapshot,
};
pub use self::units::TimeUnit;
pub use self::values::{
    CounterSetItem, CounterValue, HistogramValue, MeterSetItem, MeterValue, TimerValue,
};
