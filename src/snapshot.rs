//! Read-side views over sampled data.
//!
//! A [`Snapshot`] is an immutable value object produced by a reservoir: all
//! of its aggregates are deterministic functions of the sampled data it was
//! constructed with, so exporters can query it repeatedly without tearing.

use std::sync::Arc;

use crate::error::Error;

/// A sample carrying a forward-decay weight.
#[derive(Debug, Clone)]
pub struct WeightedSample {
    /// The recorded value.
    pub value: i64,
    /// Free-form tag attached by the producer, surfaced if this sample turns
    /// out to be the minimum or maximum.
    pub user_value: Option<Arc<String>>,
    /// The sample's decay weight.
    pub weight: f64,
}

/// A consistent, immutable view of a reservoir's samples.
pub trait Snapshot: Send + Sync {
    /// Total observations made by the reservoir, which may exceed
    /// [`size`](Snapshot::size) once samples are evicted.
    fn count(&self) -> u64;

    /// Number of samples this snapshot represents.
    fn size(&self) -> usize;

    /// The smallest sampled value, or 0 when empty.
    fn min(&self) -> f64;

    /// The largest sampled value, or 0 when empty.
    fn max(&self) -> f64;

    /// The tag attached to the minimum sample, if any.
    fn min_user_value(&self) -> Option<Arc<String>>;

    /// The tag attached to the maximum sample, if any.
    fn max_user_value(&self) -> Option<Arc<String>>;

    /// The arithmetic (or weighted) mean, or 0 when empty.
    fn mean(&self) -> f64;

    /// The standard deviation, or 0 for fewer than two samples.
    fn std_dev(&self) -> f64;

    /// The value at quantile `q`, which callers must keep within
    /// `[0.0, 1.0]`; use [`value`](Snapshot::value) for validated access.
    fn quantile(&self, q: f64) -> f64;

    /// The sampled values, sorted ascending.
    fn values(&self) -> Vec<f64>;

    /// Validated quantile access.
    fn value(&self, q: f64) -> Result<f64, Error> {
        if !(0.0..=1.0).contains(&q) {
            return Err(Error::InvalidQuantile(q));
        }
        Ok(self.quantile(q))
    }

    /// The median.
    fn median(&self) -> f64 {
        self.quantile(0.5)
    }

    /// The 75th percentile.
    fn p75(&self) -> f64 {
        self.quantile(0.75)
    }

    /// The 95th percentile.
    fn p95(&self) -> f64 {
        self.quantile(0.95)
    }

    /// The 98th percentile.
    fn p98(&self) -> f64 {
        self.quantile(0.98)
    }

    /// The 99th percentile.
    fn p99(&self) -> f64 {
        self.quantile(0.99)
    }

    /// The 99.9th percentile.
    fn p999(&self) -> f64 {
        self.quantile(0.999)
    }
}

/// A shareable snapshot handle.
pub type SnapshotRef = Arc<dyn Snapshot>;

/// Snapshot over a plain set of samples, as produced by the uniform and
/// sliding-window reservoirs.
///
/// Construction sorts a private copy of the samples; quantiles interpolate
/// linearly between neighbors.
pub struct SampleSnapshot {
    count: u64,
    values: Vec<i64>,
    min_tag: Option<Arc<String>>,
    max_tag: Option<Arc<String>>,
}

impl SampleSnapshot {
    /// Builds a snapshot from `count` total observations and the currently
    /// stored `(value, tag)` samples, in any order.
    pub fn new(count: u64, mut samples: Vec<(i64, Option<Arc<String>>)>) -> Self {
        samples.sort_by_key(|(value, _)| *value);
        let min_tag = samples.first().and_then(|(_, tag)| tag.clone());
        let max_tag = samples.last().and_then(|(_, tag)| tag.clone());
        let values = samples.into_iter().map(|(value, _)| value).collect();
        SampleSnapshot { count, values, min_tag, max_tag }
    }
}

impl Snapshot for SampleSnapshot {
    fn count(&self) -> u64 {
        self.count
    }

    fn size(&self) -> usize {
        self.values.len()
    }

    fn min(&self) -> f64 {
        self.values.first().copied().unwrap_or(0) as f64
    }

    fn max(&self) -> f64 {
        self.values.last().copied().unwrap_or(0) as f64
    }

    fn min_user_value(&self) -> Option<Arc<String>> {
        self.min_tag.clone()
    }

    fn max_user_value(&self) -> Option<Arc<String>> {
        self.max_tag.clone()
    }

    fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().map(|v| *v as f64).sum::<f64>() / self.values.len() as f64
    }

    fn std_dev(&self) -> f64 {
        let n = self.values.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let sum_sq: f64 = self.values.iter().map(|v| (*v as f64 - mean).powi(2)).sum();
        (sum_sq / (n - 1) as f64).sqrt()
    }

    fn quantile(&self, q: f64) -> f64 {
        let len = self.values.len();
        if len == 0 {
            return 0.0;
        }

        let pos = q * (len + 1) as f64;
        let index = pos as usize;
        if index < 1 {
            return self.values[0] as f64;
        }
        if index >= len {
            return self.values[len - 1] as f64;
        }

        let lower = self.values[index - 1] as f64;
        let upper = self.values[index] as f64;
        lower + (pos - index as f64) * (upper - lower)
    }

    fn values(&self) -> Vec<f64> {
        self.values.iter().map(|v| *v as f64).collect()
    }
}

/// Snapshot over weighted samples, as produced by the exponentially decaying
/// reservoir.
///
/// Weights are normalized at construction and turned into a cumulative
/// distribution; quantile queries binary-search that distribution.
pub struct WeightedSnapshot {
    count: u64,
    values: Vec<i64>,
    norm_weights: Vec<f64>,
    cumulative: Vec<f64>,
    min_tag: Option<Arc<String>>,
    max_tag: Option<Arc<String>>,
}

impl WeightedSnapshot {
    /// Builds a snapshot from `count` total observations and the stored
    /// weighted samples, in any order.
    pub fn new(count: u64, mut samples: Vec<WeightedSample>) -> Self {
        samples.sort_by_key(|s| s.value);

        let min_tag = samples.first().and_then(|s| s.user_value.clone());
        let max_tag = samples.last().and_then(|s| s.user_value.clone());

        let total_weight: f64 = samples.iter().map(|s| s.weight).sum();
        let mut values = Vec::with_capacity(samples.len());
        let mut norm_weights = Vec::with_capacity(samples.len());
        let mut cumulative = Vec::with_capacity(samples.len());

        let mut acc = 0.0;
        for sample in &samples {
            let norm = if total_weight > 0.0 { sample.weight / total_weight } else { 0.0 };
            values.push(sample.value);
            norm_weights.push(norm);
            cumulative.push(acc);
            acc += norm;
        }

        WeightedSnapshot { count, values, norm_weights, cumulative, min_tag, max_tag }
    }
}

impl Snapshot for WeightedSnapshot {
    fn count(&self) -> u64 {
        self.count
    }

    fn size(&self) -> usize {
        self.values.len()
    }

    fn min(&self) -> f64 {
        self.values.first().copied().unwrap_or(0) as f64
    }

    fn max(&self) -> f64 {
        self.values.last().copied().unwrap_or(0) as f64
    }

    fn min_user_value(&self) -> Option<Arc<String>> {
        self.min_tag.clone()
    }

    fn max_user_value(&self) -> Option<Arc<String>> {
        self.max_tag.clone()
    }

    fn mean(&self) -> f64 {
        self.values
            .iter()
            .zip(&self.norm_weights)
            .map(|(v, w)| *v as f64 * w)
            .sum()
    }

    fn std_dev(&self) -> f64 {
        if self.values.len() < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let variance: f64 = self
            .values
            .iter()
            .zip(&self.norm_weights)
            .map(|(v, w)| w * (*v as f64 - mean).powi(2))
            .sum();
        variance.sqrt()
    }

    fn quantile(&self, q: f64) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }

        // The cumulative array starts at 0.0, so for q >= 0 there is always
        // at least one entry at or below q; the last such entry is the
        // sample whose weight span contains q.
        let pos = self.cumulative.partition_point(|c| *c <= q).saturating_sub(1);
        let pos = pos.min(self.values.len() - 1);
        self.values[pos] as f64
    }

    fn values(&self) -> Vec<f64> {
        self.values.iter().map(|v| *v as f64).collect()
    }
}

/// A pure multiplicative view over another snapshot.
///
/// Used by unit scaling: sample magnitudes (min, max, mean, quantiles,
/// values) are multiplied by the factor, while counts, sizes, and tags pass
/// through untouched.
pub struct ScaledSnapshot {
    inner: SnapshotRef,
    factor: f64,
}

impl ScaledSnapshot {
    /// Wraps `inner`, scaling every sample magnitude by `factor`.
    pub fn new(inner: SnapshotRef, factor: f64) -> Self {
        ScaledSnapshot { inner, factor }
    }
}

impl Snapshot for ScaledSnapshot {
    fn count(&self) -> u64 {
        self.inner.count()
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn min(&self) -> f64 {
        self.inner.min() * self.factor
    }

    fn max(&self) -> f64 {
        self.inner.max() * self.factor
    }

    fn min_user_value(&self) -> Option<Arc<String>> {
        self.inner.min_user_value()
    }

    fn max_user_value(&self) -> Option<Arc<String>> {
        self.inner.max_user_value()
    }

    fn mean(&self) -> f64 {
        self.inner.mean() * self.factor
    }

    fn std_dev(&self) -> f64 {
        self.inner.std_dev() * self.factor
    }

    fn quantile(&self, q: f64) -> f64 {
        self.inner.quantile(q) * self.factor
    }

    fn values(&self) -> Vec<f64> {
        self.inner.values().into_iter().map(|v| v * self.factor).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{SampleSnapshot, ScaledSnapshot, Snapshot, WeightedSample, WeightedSnapshot};
    use crate::error::Error;
    use std::sync::Arc;

    fn tag(s: &str) -> Option<Arc<String>> {
        Some(Arc::new(s.to_string()))
    }

    #[test]
    fn empty_sample_snapshot_is_all_zero() {
        let snap = SampleSnapshot::new(0, Vec::new());
        assert_eq!(snap.size(), 0);
        assert_eq!(snap.min(), 0.0);
        assert_eq!(snap.max(), 0.0);
        assert_eq!(snap.mean(), 0.0);
        assert_eq!(snap.std_dev(), 0.0);
        assert_eq!(snap.median(), 0.0);
        assert!(snap.values().is_empty());
    }

    #[test]
    fn sample_snapshot_sorts_and_tags_extrema() {
        let snap = SampleSnapshot::new(
            4,
            vec![(30, tag("c")), (10, tag("a")), (40, tag("d")), (20, None)],
        );
        assert_eq!(snap.values(), vec![10.0, 20.0, 30.0, 40.0]);
        assert_eq!(snap.min(), 10.0);
        assert_eq!(snap.max(), 40.0);
        assert_eq!(snap.min_user_value().unwrap().as_str(), "a");
        assert_eq!(snap.max_user_value().unwrap().as_str(), "d");
        assert_eq!(snap.mean(), 25.0);
    }

    #[test]
    fn sample_snapshot_quantiles() {
        let snap = SampleSnapshot::new(5, (1..=5).map(|v| (v, None)).collect());
        assert_eq!(snap.quantile(0.0), 1.0);
        assert_eq!(snap.quantile(1.0), 5.0);
        assert_eq!(snap.median(), 3.0);

        // Monotonic non-decreasing across the whole range.
        let mut last = f64::MIN;
        for i in 0..=100 {
            let v = snap.quantile(i as f64 / 100.0);
            assert!(v >= last);
            last = v;
        }
    }

    #[test]
    fn invalid_quantile_is_a_typed_error() {
        let snap = SampleSnapshot::new(1, vec![(1, None)]);
        assert!(matches!(snap.value(1.5), Err(Error::InvalidQuantile(_))));
        assert!(matches!(snap.value(-0.1), Err(Error::InvalidQuantile(_))));
        assert_eq!(snap.value(1.0).unwrap(), 1.0);
    }

    #[test]
    fn single_sample_std_dev_is_zero() {
        let snap = SampleSnapshot::new(1, vec![(7, None)]);
        assert_eq!(snap.std_dev(), 0.0);
        assert_eq!(snap.mean(), 7.0);
    }

    #[test]
    fn weighted_snapshot_quantiles_follow_weight() {
        // 1 carries 90% of the weight; everything below q=0.9 resolves to it.
        let samples = vec![
            WeightedSample { value: 1, user_value: None, weight: 9.0 },
            WeightedSample { value: 100, user_value: None, weight: 1.0 },
        ];
        let snap = WeightedSnapshot::new(2, samples);
        assert_eq!(snap.quantile(0.0), 1.0);
        assert_eq!(snap.quantile(0.5), 1.0);
        assert_eq!(snap.quantile(0.89), 1.0);
        assert_eq!(snap.quantile(0.95), 100.0);
        assert_eq!(snap.quantile(1.0), 100.0);
    }

    #[test]
    fn weighted_snapshot_mean_and_std_dev() {
        let samples = vec![
            WeightedSample { value: 2, user_value: tag("lo"), weight: 1.0 },
            WeightedSample { value: 4, user_value: tag("hi"), weight: 3.0 },
        ];
        let snap = WeightedSnapshot::new(2, samples);
        // mean = 2 * 0.25 + 4 * 0.75 = 3.5
        assert!((snap.mean() - 3.5).abs() < 1e-12);
        // var = 0.25 * (2 - 3.5)^2 + 0.75 * (4 - 3.5)^2 = 0.75
        assert!((snap.std_dev() - 0.75f64.sqrt()).abs() < 1e-12);
        assert_eq!(snap.min_user_value().unwrap().as_str(), "lo");
        assert_eq!(snap.max_user_value().unwrap().as_str(), "hi");
    }

    #[test]
    fn weighted_snapshot_empty() {
        let snap = WeightedSnapshot::new(0, Vec::new());
        assert_eq!(snap.quantile(0.5), 0.0);
        assert_eq!(snap.mean(), 0.0);
        assert_eq!(snap.std_dev(), 0.0);
    }

    #[test]
    fn scaled_snapshot_multiplies_magnitudes_only() {
        let inner = Arc::new(SampleSnapshot::new(3, vec![(10, tag("a")), (20, None), (30, tag("b"))]));
        let scaled = ScaledSnapshot::new(inner, 0.001);
        assert_eq!(scaled.count(), 3);
        assert_eq!(scaled.size(), 3);
        assert_eq!(scaled.min(), 0.01);
        assert_eq!(scaled.max(), 0.03);
        assert!((scaled.mean() - 0.02).abs() < 1e-12);
        assert_eq!(scaled.values(), vec![0.01, 0.02, 0.03]);
        assert_eq!(scaled.min_user_value().unwrap().as_str(), "a");
    }
}
