//! Assembled metric values for exporters.
//!
//! Exporters receive a tree of contexts, each holding named metric values.
//! The value side is a small set of tagged variants rather than an open
//! trait: every exporter pattern-matches on the metric type anyway.

use crate::kind::MetricKind;
use crate::units::TimeUnit;
use crate::values::{CounterValue, HistogramValue, MeterValue, TimerValue};

/// The value of a single metric, tagged by type.
#[derive(Debug, Clone)]
pub enum MetricValue {
    /// A gauge reading.
    Gauge(f64),
    /// A counter value.
    Counter(CounterValue),
    /// A meter value.
    Meter(MeterValue),
    /// A histogram value.
    Histogram(HistogramValue),
    /// A timer value.
    Timer(TimerValue),
}

impl MetricValue {
    /// The kind of metric this value came from.
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Gauge(_) => MetricKind::Gauge,
            MetricValue::Counter(_) => MetricKind::Counter,
            MetricValue::Meter(_) => MetricKind::Meter,
            MetricValue::Histogram(_) => MetricKind::Histogram,
            MetricValue::Timer(_) => MetricKind::Timer,
        }
    }

    /// Re-expresses rates per `rate_unit` and timer durations in
    /// `duration_unit`.
    ///
    /// Gauges, counters, and plain histograms carry no unit and pass through
    /// unchanged; only meters and timers are rescaled.
    pub fn scaled(&self, rate_unit: TimeUnit, duration_unit: TimeUnit) -> MetricValue {
        match self {
            MetricValue::Gauge(value) => MetricValue::Gauge(*value),
            MetricValue::Counter(value) => MetricValue::Counter(value.clone()),
            MetricValue::Meter(value) => MetricValue::Meter(value.scale(rate_unit)),
            MetricValue::Histogram(value) => MetricValue::Histogram(value.clone()),
            MetricValue::Timer(value) => {
                MetricValue::Timer(value.scale(rate_unit, duration_unit))
            }
        }
    }
}

/// A named metric value within a context.
#[derive(Debug, Clone)]
pub struct MetricEntry {
    /// The metric's name within its context.
    pub name: String,
    /// The metric's value.
    pub value: MetricValue,
}

/// A context's worth of metrics: named values plus nested child contexts.
#[derive(Debug, Clone, Default)]
pub struct MetricsData {
    /// The context name.
    pub context: String,
    /// Metrics registered directly in this context.
    pub entries: Vec<MetricEntry>,
    /// Nested contexts.
    pub children: Vec<MetricsData>,
}

impl MetricsData {
    /// Creates an empty context.
    pub fn new(context: impl Into<String>) -> Self {
        MetricsData { context: context.into(), entries: Vec::new(), children: Vec::new() }
    }

    /// Adds a named value to this context.
    pub fn add_entry(&mut self, name: impl Into<String>, value: MetricValue) -> &mut Self {
        self.entries.push(MetricEntry { name: name.into(), value });
        self
    }

    /// Adds a nested context.
    pub fn add_child(&mut self, child: MetricsData) -> &mut Self {
        self.children.push(child);
        self
    }

    /// A copy of the tree with every meter and timer re-expressed in the
    /// given units.
    pub fn scaled(&self, rate_unit: TimeUnit, duration_unit: TimeUnit) -> MetricsData {
        MetricsData {
            context: self.context.clone(),
            entries: self
                .entries
                .iter()
                .map(|entry| MetricEntry {
                    name: entry.name.clone(),
                    value: entry.value.scaled(rate_unit, duration_unit),
                })
                .collect(),
            children: self
                .children
                .iter()
                .map(|child| child.scaled(rate_unit, duration_unit))
                .collect(),
        }
    }

    /// A copy of the tree with everything the filter rejects removed.
    ///
    /// A rejected child context disappears along with its whole subtree;
    /// everything else is passed through untouched.  If this context itself
    /// is rejected, the result is an empty shell keeping only the name.
    pub fn filtered(&self, filter: &crate::filter::MetricsFilter) -> MetricsData {
        if !filter.accepts_context(&self.context) {
            return MetricsData::new(self.context.clone());
        }

        MetricsData {
            context: self.context.clone(),
            entries: self
                .entries
                .iter()
                .filter(|entry| {
                    filter.accepts_name(&entry.name) && filter.accepts_kind(entry.value.kind())
                })
                .cloned()
                .collect(),
            children: self
                .children
                .iter()
                .filter(|child| filter.accepts_context(&child.context))
                .map(|child| child.filtered(filter))
                .collect(),
        }
    }
}
