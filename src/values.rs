//! Typed value objects handed to exporters.
//!
//! Every primitive renders into one of these immutable values on read.
//! Scaling is pure: `scale` allocates a new value and leaves the original
//! untouched, so one snapshot can be rendered in several unit systems.

use std::fmt;
use std::sync::Arc;

use crate::ewma::MeterRates;
use crate::snapshot::{ScaledSnapshot, SnapshotRef};
use crate::units::TimeUnit;

/// One tagged slice of a counter's total.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterSetItem {
    /// The item key.
    pub item: String,
    /// Events attributed to this item.
    pub count: i64,
    /// This item's share of the total, in percent (0 when the total is 0).
    pub percent: f64,
}

/// The value of a [`Counter`](crate::metrics::Counter).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CounterValue {
    /// Total count across all updates, tagged or not.
    pub count: i64,
    /// Per-item breakdown, sorted by percent descending then key ascending.
    pub items: Vec<CounterSetItem>,
}

/// One tagged slice of a meter's stream.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterSetItem {
    /// The item key.
    pub item: String,
    /// This item's share of the total count, in percent.
    pub percent: f64,
    /// The item's own rates.
    pub value: MeterValue,
}

/// The value of a [`Meter`](crate::metrics::Meter).
#[derive(Debug, Clone, PartialEq)]
pub struct MeterValue {
    /// Events observed since creation or the last reset.
    pub count: i64,
    /// Lifetime rate, in events per `rate_unit`.
    pub mean_rate: f64,
    /// One-minute moving average, in events per `rate_unit`.
    pub one_minute_rate: f64,
    /// Five-minute moving average, in events per `rate_unit`.
    pub five_minute_rate: f64,
    /// Fifteen-minute moving average, in events per `rate_unit`.
    pub fifteen_minute_rate: f64,
    /// The unit the rates are expressed against.
    pub rate_unit: TimeUnit,
    /// Per-item breakdown, sorted by percent descending then key ascending.
    pub items: Vec<MeterSetItem>,
}

impl MeterValue {
    pub(crate) fn from_rates(rates: MeterRates, items: Vec<MeterSetItem>) -> Self {
        MeterValue {
            count: rates.count,
            mean_rate: rates.mean_rate,
            one_minute_rate: rates.one_minute_rate,
            five_minute_rate: rates.five_minute_rate,
            fifteen_minute_rate: rates.fifteen_minute_rate,
            rate_unit: TimeUnit::Seconds,
            items,
        }
    }

    /// Re-expresses all rates (nested items included) per `rate_unit`.
    pub fn scale(&self, rate_unit: TimeUnit) -> MeterValue {
        let factor = self.rate_unit.scaling_factor_to(rate_unit);
        MeterValue {
            count: self.count,
            mean_rate: self.mean_rate * factor,
            one_minute_rate: self.one_minute_rate * factor,
            five_minute_rate: self.five_minute_rate * factor,
            fifteen_minute_rate: self.fifteen_minute_rate * factor,
            rate_unit,
            items: self
                .items
                .iter()
                .map(|item| MeterSetItem {
                    item: item.item.clone(),
                    percent: item.percent,
                    value: item.value.scale(rate_unit),
                })
                .collect(),
        }
    }
}

impl Default for MeterValue {
    fn default() -> Self {
        MeterValue {
            count: 0,
            mean_rate: 0.0,
            one_minute_rate: 0.0,
            five_minute_rate: 0.0,
            fifteen_minute_rate: 0.0,
            rate_unit: TimeUnit::Seconds,
            items: Vec::new(),
        }
    }
}

/// The value of a [`Histogram`](crate::metrics::Histogram).
#[derive(Clone)]
pub struct HistogramValue {
    /// The most recently observed value (advisory, last-writer-wins).
    pub last_value: f64,
    /// The tag attached to the most recent observation, if any.
    pub last_user_value: Option<Arc<String>>,
    /// The reservoir snapshot backing all distribution queries.
    pub snapshot: SnapshotRef,
}

impl HistogramValue {
    /// Multiplies every sample magnitude (the last value included) by
    /// `factor`, leaving counts and tags untouched.
    pub fn scale_by(&self, factor: f64) -> HistogramValue {
        HistogramValue {
            last_value: self.last_value * factor,
            last_user_value: self.last_user_value.clone(),
            snapshot: Arc::new(ScaledSnapshot::new(Arc::clone(&self.snapshot), factor)),
        }
    }
}

impl fmt::Debug for HistogramValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistogramValue")
            .field("last_value", &self.last_value)
            .field("last_user_value", &self.last_user_value)
            .field("count", &self.snapshot.count())
            .field("size", &self.snapshot.size())
            .finish_non_exhaustive()
    }
}

/// The value of a [`Timer`](crate::metrics::Timer).
#[derive(Debug, Clone)]
pub struct TimerValue {
    /// Rate view of the recorded durations.
    pub rate: MeterValue,
    /// Distribution view of the recorded durations, in `duration_unit`s.
    pub histogram: HistogramValue,
    /// Recording sessions currently in flight.
    pub active_sessions: i64,
    /// Total recorded time, in `duration_unit`s.
    pub total_time: f64,
    /// The unit durations are expressed in.
    pub duration_unit: TimeUnit,
}

impl TimerValue {
    /// Re-expresses rates per `rate_unit` and durations in `duration_unit`.
    pub fn scale(&self, rate_unit: TimeUnit, duration_unit: TimeUnit) -> TimerValue {
        let factor = self.duration_unit.convert(1.0, duration_unit);
        TimerValue {
            rate: self.rate.scale(rate_unit),
            histogram: self.histogram.scale_by(factor),
            active_sessions: self.active_sessions,
            total_time: self.total_time * factor,
            duration_unit,
        }
    }
}

/// Sorts set items by percent descending, breaking ties by key ascending.
pub(crate) fn sort_counter_items(items: &mut [CounterSetItem]) {
    items.sort_by(|a, b| b.percent.total_cmp(&a.percent).then_with(|| a.item.cmp(&b.item)));
}

/// Sorts meter items by percent descending, breaking ties by key ascending.
pub(crate) fn sort_meter_items(items: &mut [MeterSetItem]) {
    items.sort_by(|a, b| b.percent.total_cmp(&a.percent).then_with(|| a.item.cmp(&b.item)));
}

/// The share of `count` in `total`, in percent; 0 when `total` is not
/// positive.
pub(crate) fn percent_of(count: i64, total: i64) -> f64 {
    if total > 0 {
        count as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}
