//! Injectable time sources.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of time for metrics.
///
/// The update and read paths only need a monotonic nanosecond counter;
/// `utc_datetime` exists for exporters that stamp snapshots with wall time.
pub trait Clock: Send + Sync + Debug {
    /// Monotonic nanoseconds since an arbitrary origin.
    ///
    /// Wraparound-safe within the lifetime of the process.
    fn nanoseconds(&self) -> u64;

    /// Monotonic seconds, truncated from [`nanoseconds`](Clock::nanoseconds).
    fn seconds(&self) -> u64 {
        self.nanoseconds() / 1_000_000_000
    }

    /// The current wall-clock time.
    fn utc_datetime(&self) -> SystemTime {
        SystemTime::now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn nanoseconds(&self) -> u64 {
        (**self).nanoseconds()
    }

    fn seconds(&self) -> u64 {
        (**self).seconds()
    }

    fn utc_datetime(&self) -> SystemTime {
        (**self).utc_datetime()
    }
}

/// High-resolution monotonic clock backed by [`quanta`].
///
/// The preferred production clock.  Reads are a few nanoseconds on platforms
/// where quanta can calibrate TSC, falling back to the OS monotonic clock
/// elsewhere.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    inner: quanta::Clock,
    origin: u64,
}

impl MonotonicClock {
    /// Creates a new monotonic clock anchored at the current instant.
    pub fn new() -> Self {
        let inner = quanta::Clock::new();
        let origin = inner.raw();
        MonotonicClock { inner, origin }
    }

    /// Creates a mocked clock and a handle that advances it.
    ///
    /// Time starts at zero and only moves when the returned
    /// [`quanta::Mock`] is incremented.
    pub fn mock() -> (Self, Arc<quanta::Mock>) {
        let (inner, mock) = quanta::Clock::mock();
        let origin = inner.raw();
        (MonotonicClock { inner, origin }, mock)
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn nanoseconds(&self) -> u64 {
        self.inner.delta_as_nanos(self.origin, self.inner.raw())
    }
}

/// Wall-clock-derived time source.
///
/// Not monotonic under clock adjustment; provided for environments where a
/// shared wall-time origin matters more than monotonicity.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl Clock for WallClock {
    fn nanoseconds(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, MonotonicClock, WallClock};
    use std::time::Duration;

    #[test]
    fn monotonic_advances() {
        let clock = MonotonicClock::new();
        let a = clock.nanoseconds();
        let b = clock.nanoseconds();
        assert!(b >= a);
    }

    #[test]
    fn mock_only_moves_when_driven() {
        let (clock, mock) = MonotonicClock::mock();
        assert_eq!(clock.nanoseconds(), 0);
        assert_eq!(clock.seconds(), 0);

        mock.increment(Duration::from_millis(1500));
        assert_eq!(clock.nanoseconds(), 1_500_000_000);
        assert_eq!(clock.seconds(), 1);
    }

    #[test]
    fn wall_clock_is_nonzero() {
        assert!(WallClock.nanoseconds() > 0);
    }
}
