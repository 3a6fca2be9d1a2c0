//! Latency timing over a histogram and a meter.

use std::sync::Arc;
use std::time::Duration;

use crate::adder::StripedAdder;
use crate::clock::Clock;
use crate::metrics::{Histogram, Meter};
use crate::scheduler::Scheduler;
use crate::units::TimeUnit;
use crate::values::TimerValue;

/// Measures how often something happens and how long it takes.
///
/// A timer composes a [`Histogram`] of durations (in nanoseconds) with a
/// [`Meter`] of occurrence rates, plus live counters for in-flight recording
/// sessions and total recorded time.
///
/// Negative durations are silently ignored: a racing clock read can produce
/// a small negative delta, and rejecting it beats poisoning the histogram.
pub struct Timer {
    meter: Meter,
    histogram: Histogram,
    active_sessions: StripedAdder,
    total_time: StripedAdder,
    clock: Arc<dyn Clock>,
}

impl Timer {
    /// Creates a timer with the default exponentially decaying histogram.
    pub fn new<S: Scheduler + ?Sized>(clock: Arc<dyn Clock>, scheduler: &S) -> Self {
        let histogram = Histogram::with_exponential_decay(Arc::clone(&clock), scheduler);
        Self::with_histogram(histogram, clock, scheduler)
    }

    /// Creates a timer over an explicit histogram.
    pub fn with_histogram<S: Scheduler + ?Sized>(
        histogram: Histogram,
        clock: Arc<dyn Clock>,
        scheduler: &S,
    ) -> Self {
        Timer {
            meter: Meter::new(Arc::clone(&clock), scheduler),
            histogram,
            active_sessions: StripedAdder::new(),
            total_time: StripedAdder::new(),
            clock,
        }
    }

    /// Records a duration expressed in `unit`s.
    pub fn record(&self, duration: i64, unit: TimeUnit) {
        self.record_nanos(to_nanos(duration, unit), None);
    }

    /// Records a tagged duration expressed in `unit`s.
    pub fn record_tagged<S: Into<String>>(&self, duration: i64, unit: TimeUnit, user_value: S) {
        self.record_nanos(to_nanos(duration, unit), Some(Arc::new(user_value.into())));
    }

    /// Times `action`, recording its duration on every exit path --
    /// a panicking action is still recorded before the panic resumes.
    pub fn time<F, T>(&self, action: F) -> T
    where
        F: FnOnce() -> T,
    {
        let _session = self.new_context();
        action()
    }

    /// Starts a recording session, returning the start timestamp in
    /// nanoseconds and bumping the in-flight session count.
    ///
    /// Pair with [`end_recording`](Timer::end_recording) and
    /// [`record`](Timer::record); prefer [`new_context`](Timer::new_context),
    /// which cannot leak a session.
    pub fn start_recording(&self) -> u64 {
        self.active_sessions.increment();
        self.clock.nanoseconds()
    }

    /// Ends a recording session, returning the end timestamp in nanoseconds.
    pub fn end_recording(&self) -> u64 {
        self.active_sessions.decrement();
        self.clock.nanoseconds()
    }

    /// Opens a scoped recording session.
    ///
    /// The session records exactly once, when the returned context is
    /// dropped -- on normal scope exit, early return, or unwind alike.
    pub fn new_context(&self) -> TimerContext<'_> {
        TimerContext { start: self.start_recording(), timer: self, user_value: None }
    }

    /// Opens a scoped recording session tagged with a user value.
    pub fn new_context_tagged<S: Into<String>>(&self, user_value: S) -> TimerContext<'_> {
        TimerContext {
            start: self.start_recording(),
            timer: self,
            user_value: Some(Arc::new(user_value.into())),
        }
    }

    /// The number of recording sessions currently in flight.
    pub fn active_sessions(&self) -> i64 {
        self.active_sessions.sum()
    }

    /// Renders the timer into a [`TimerValue`] with nanosecond durations.
    pub fn value(&self) -> TimerValue {
        self.value_inner(false)
    }

    /// Renders the timer and resets it.
    ///
    /// The active-session count is a live counter, not history, and is left
    /// alone.
    pub fn value_and_reset(&self) -> TimerValue {
        self.value_inner(true)
    }

    /// Resets rates, samples, and total time; in-flight sessions are kept.
    pub fn reset(&self) {
        self.meter.reset();
        self.histogram.reset();
        self.total_time.sum_and_reset();
    }

    fn value_inner(&self, reset: bool) -> TimerValue {
        let rate = if reset { self.meter.value_and_reset() } else { self.meter.value() };
        let histogram =
            if reset { self.histogram.value_and_reset() } else { self.histogram.value() };
        let total_time =
            if reset { self.total_time.sum_and_reset() } else { self.total_time.sum() };

        TimerValue {
            rate,
            histogram,
            active_sessions: self.active_sessions.sum(),
            total_time: total_time as f64,
            duration_unit: TimeUnit::Nanoseconds,
        }
    }

    fn record_nanos(&self, nanos: i64, user_value: Option<Arc<String>>) {
        if nanos < 0 {
            return;
        }
        self.histogram.update_opt(nanos, user_value);
        self.meter.mark();
        self.total_time.add(nanos);
    }
}

fn to_nanos(duration: i64, unit: TimeUnit) -> i64 {
    duration.saturating_mul(unit.nanos_per_unit() as i64)
}

/// A scoped recording session obtained from [`Timer::new_context`].
///
/// Exactly one release runs per context, so the handle must not be
/// duplicated; it is deliberately neither `Clone` nor `Copy`.
pub struct TimerContext<'a> {
    timer: &'a Timer,
    start: u64,
    user_value: Option<Arc<String>>,
}

impl TimerContext<'_> {
    /// Time elapsed since the session started, without ending it.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.timer.clock.nanoseconds().saturating_sub(self.start))
    }

    /// Ends the session now.  Equivalent to dropping the context.
    pub fn stop(self) {}
}

impl Drop for TimerContext<'_> {
    fn drop(&mut self) {
        let end = self.timer.end_recording();
        let elapsed = end as i64 - self.start as i64;
        self.timer.record_nanos(elapsed, self.user_value.take());
    }
}
