use std::ops::BitOr;

/// Metric kind.
///
/// Defines the kind, or type, of a metric:
/// - gauges
/// - counters
/// - meters
/// - histograms
/// - timers
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum MetricKind {
    /// Gauge type.
    Gauge,
    /// Counter type.
    Counter,
    /// Meter type.
    Meter,
    /// Histogram type.
    Histogram,
    /// Timer type.
    Timer,
}

/// Metric kind mask.
///
/// Useful for matching against a kind, or kinds, of metrics.  Masks combine
/// with bitwise OR and are checked with [`matches`](MetricKindMask::matches):
///
/// ```rust
/// # use instruments::{MetricKind, MetricKindMask};
/// let mask = MetricKindMask::COUNTER | MetricKindMask::TIMER;
///
/// assert!(mask.matches(MetricKind::Counter));
/// assert!(mask.matches(MetricKind::Timer));
/// assert!(!mask.matches(MetricKind::Gauge));
/// ```
#[derive(Debug, Eq, PartialEq, Hash, Clone, Copy, Ord, PartialOrd)]
pub struct MetricKindMask(u8);

impl MetricKindMask {
    /// No metric kinds.
    pub const NONE: MetricKindMask = MetricKindMask(0);

    /// The gauge kind.
    pub const GAUGE: MetricKindMask = MetricKindMask(1);

    /// The counter kind.
    pub const COUNTER: MetricKindMask = MetricKindMask(2);

    /// The meter kind.
    pub const METER: MetricKindMask = MetricKindMask(4);

    /// The histogram kind.
    pub const HISTOGRAM: MetricKindMask = MetricKindMask(8);

    /// The timer kind.
    pub const TIMER: MetricKindMask = MetricKindMask(16);

    /// All metric kinds.
    pub const ALL: MetricKindMask = MetricKindMask(31);

    /// Whether or not this mask contains the specified kind.
    pub fn matches(&self, kind: MetricKind) -> bool {
        let bit = match kind {
            MetricKind::Gauge => MetricKindMask::GAUGE.0,
            MetricKind::Counter => MetricKindMask::COUNTER.0,
            MetricKind::Meter => MetricKindMask::METER.0,
            MetricKind::Histogram => MetricKindMask::HISTOGRAM.0,
            MetricKind::Timer => MetricKindMask::TIMER.0,
        };
        self.0 & bit != 0
    }
}

impl BitOr for MetricKindMask {
    type Output = MetricKindMask;

    fn bitor(self, rhs: MetricKindMask) -> Self::Output {
        MetricKindMask(self.0 | rhs.0)
    }
}
