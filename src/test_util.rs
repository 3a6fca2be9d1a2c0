//! Deterministic test doubles for clocks, schedulers, and error sinks.
//!
//! These are real implementations of the crate's injection points, exposed
//! publicly so embedders can drive time and ticks by hand in their own
//! tests.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::error::{Error, ErrorSink};
use crate::scheduler::{Scheduler, TickAction, TickHandle};

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct TestClock {
    nanos: AtomicU64,
}

impl TestClock {
    /// Creates a clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock.
    pub fn advance(&self, duration: Duration) {
        self.nanos.fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn nanoseconds(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }
}

struct Scheduled {
    action: Mutex<TickAction>,
    stopped: Arc<AtomicBool>,
}

/// A scheduler that fires only when told to.
///
/// Registered actions run on the caller's thread during
/// [`fire_all`](ManualScheduler::fire_all), in registration order, skipping
/// any whose handle has been stopped.
#[derive(Default)]
pub struct ManualScheduler {
    scheduled: Arc<Mutex<Vec<Arc<Scheduled>>>>,
}

impl ManualScheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every live scheduled action once.
    pub fn fire_all(&self) {
        let scheduled: Vec<Arc<Scheduled>> = self.scheduled.lock().clone();
        for entry in scheduled {
            if !entry.stopped.load(Ordering::SeqCst) {
                let mut action = entry.action.lock();
                (*action)();
            }
        }
    }

    /// The number of schedules registered, stopped ones included.
    pub fn len(&self) -> usize {
        self.scheduled.lock().len()
    }

    /// Whether no schedules have been registered.
    pub fn is_empty(&self) -> bool {
        self.scheduled.lock().is_empty()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, interval: Duration, action: TickAction) -> Result<TickHandle, Error> {
        if interval.is_zero() {
            return Err(Error::InvalidTickInterval);
        }

        let stopped = Arc::new(AtomicBool::new(false));
        let entry = Arc::new(Scheduled { action: Mutex::new(action), stopped: Arc::clone(&stopped) });
        self.scheduled.lock().push(entry);

        Ok(TickHandle::from_fn(move || stopped.store(true, Ordering::SeqCst)))
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler").field("scheduled", &self.len()).finish()
    }
}

/// An error sink that stores every report for later inspection.
#[derive(Debug, Default)]
pub struct CollectingSink {
    reports: Mutex<Vec<String>>,
}

impl CollectingSink {
    /// The reports collected so far.
    pub fn reports(&self) -> Vec<String> {
        self.reports.lock().clone()
    }
}

impl ErrorSink for CollectingSink {
    fn report(&self, context: &'static str, error: &dyn fmt::Display) {
        self.reports.lock().push(format!("{context}: {error}"));
    }
}
