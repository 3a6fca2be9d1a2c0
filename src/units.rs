//! Time units and conversions used for rate and duration scaling.

use std::fmt;

/// Conversion factors between adjacent units, smallest first.
const ADJACENT_FACTORS: [u64; 6] = [1000, 1000, 1000, 60, 60, 24];

/// A unit of time, from nanoseconds up to days.
///
/// Conversion factors between adjacent units are exact integers; conversions
/// between non-adjacent units are composed from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeUnit {
    /// One billionth of a second.
    Nanoseconds,
    /// One millionth of a second.
    Microseconds,
    /// One thousandth of a second.
    Milliseconds,
    /// One second.
    Seconds,
    /// Sixty seconds.
    Minutes,
    /// Sixty minutes.
    Hours,
    /// Twenty-four hours.
    Days,
}

impl TimeUnit {
    /// All units, smallest first.
    pub const ALL: [TimeUnit; 7] = [
        TimeUnit::Nanoseconds,
        TimeUnit::Microseconds,
        TimeUnit::Milliseconds,
        TimeUnit::Seconds,
        TimeUnit::Minutes,
        TimeUnit::Hours,
        TimeUnit::Days,
    ];

    fn index(self) -> usize {
        match self {
            TimeUnit::Nanoseconds => 0,
            TimeUnit::Microseconds => 1,
            TimeUnit::Milliseconds => 2,
            TimeUnit::Seconds => 3,
            TimeUnit::Minutes => 4,
            TimeUnit::Hours => 5,
            TimeUnit::Days => 6,
        }
    }

    /// The exact number of nanoseconds in one of this unit.
    pub fn nanos_per_unit(self) -> u64 {
        ADJACENT_FACTORS[..self.index()].iter().product()
    }

    /// The factor that converts a rate expressed per `self` into a rate
    /// expressed per `target`.
    ///
    /// A rate of 2 events per second becomes `2.0 * Seconds.scaling_factor_to(Minutes)`
    /// = 120 events per minute.
    pub fn scaling_factor_to(self, target: TimeUnit) -> f64 {
        target.nanos_per_unit() as f64 / self.nanos_per_unit() as f64
    }

    /// Converts a duration magnitude expressed in `self` into `target` units.
    ///
    /// `Nanoseconds.convert(1_500_000.0, Milliseconds)` is 1.5.
    pub fn convert(self, value: f64, target: TimeUnit) -> f64 {
        value * (self.nanos_per_unit() as f64 / target.nanos_per_unit() as f64)
    }

    /// The abbreviated label used by exporters, e.g. `ms` or `min`.
    pub fn label(self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
