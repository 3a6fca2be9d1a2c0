//! High-dynamic-range bucketed histogram reservoir.
//!
//! Values are mapped onto logarithmically arranged buckets sized so that any
//! recorded value is represented within a configurable relative error
//! (`10^-d` for `d` significant digits).  Recording is a single atomic
//! increment; snapshots are O(buckets).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::Reservoir;
use crate::error::Error;
use crate::snapshot::{Snapshot, SnapshotRef};

/// Configuration for [`HdrReservoir`].
#[derive(Debug, Clone, Copy)]
pub struct HdrConfig {
    /// Number of significant value digits preserved, in `0..=5`.  The
    /// relative error bound is `10^-digits`.
    pub significant_digits: u8,
    /// The largest recordable value; larger values saturate.  Must be at
    /// least 2.
    pub highest_trackable: u64,
}

impl Default for HdrConfig {
    fn default() -> Self {
        // One hour in nanoseconds at 1% relative error: ample for latency
        // recording while keeping the bucket arrays in the tens of
        // kilobytes.
        HdrConfig { significant_digits: 2, highest_trackable: 3_600_000_000_000 }
    }
}

/// The derived bucket layout: `bucket_count` buckets of
/// `sub_bucket_half_count` slots each (the zeroth bucket uses a full
/// `sub_bucket_count`), covering `[1, highest_trackable]`.
#[derive(Debug, Clone, Copy)]
struct Layout {
    highest_trackable: u64,
    sub_bucket_half_count: u64,
    sub_bucket_half_count_magnitude: u32,
    sub_bucket_mask: u64,
    leading_zero_count_base: u32,
    counts_len: usize,
}

impl Layout {
    fn new(config: HdrConfig) -> Result<Layout, Error> {
        if config.significant_digits > 5 {
            return Err(Error::InvalidSignificantDigits(config.significant_digits));
        }
        if config.highest_trackable < 2 {
            return Err(Error::InvalidTrackableRange(config.highest_trackable));
        }

        // The smallest power of two that can hold a full decade of distinct
        // values at the requested precision.
        let largest_single_unit_resolution = 2 * 10u64.pow(config.significant_digits as u32);
        let sub_bucket_count_magnitude =
            64 - (largest_single_unit_resolution - 1).leading_zeros();
        let sub_bucket_count = 1u64 << sub_bucket_count_magnitude;
        let sub_bucket_half_count = sub_bucket_count >> 1;

        let mut bucket_count = 1usize;
        let mut smallest_untrackable = sub_bucket_count;
        while smallest_untrackable <= config.highest_trackable {
            if smallest_untrackable > u64::MAX / 2 {
                bucket_count += 1;
                break;
            }
            smallest_untrackable <<= 1;
            bucket_count += 1;
        }

        Ok(Layout {
            highest_trackable: config.highest_trackable,
            sub_bucket_half_count,
            sub_bucket_half_count_magnitude: sub_bucket_count_magnitude - 1,
            sub_bucket_mask: sub_bucket_count - 1,
            leading_zero_count_base: 64 - sub_bucket_count_magnitude,
            counts_len: (bucket_count + 1) * sub_bucket_half_count as usize,
        })
    }

    fn bucket_index(&self, value: u64) -> u32 {
        self.leading_zero_count_base - (value | self.sub_bucket_mask).leading_zeros()
    }

    fn counts_index(&self, value: u64) -> usize {
        let value = value.clamp(1, self.highest_trackable);
        let bucket_index = self.bucket_index(value);
        let sub_bucket_index = value >> bucket_index;
        let base = ((bucket_index as u64 + 1) << self.sub_bucket_half_count_magnitude) as usize;
        base + (sub_bucket_index - self.sub_bucket_half_count) as usize
    }

    /// The lowest value mapping onto `index`.
    fn value_from_index(&self, index: usize) -> u64 {
        let mut bucket_index = (index >> self.sub_bucket_half_count_magnitude) as i64 - 1;
        let mut sub_bucket_index =
            (index as u64 & (self.sub_bucket_half_count - 1)) + self.sub_bucket_half_count;
        if bucket_index < 0 {
            sub_bucket_index -= self.sub_bucket_half_count;
            bucket_index = 0;
        }
        sub_bucket_index << bucket_index as u32
    }

    fn equivalent_range(&self, index: usize) -> u64 {
        let bucket_index = ((index >> self.sub_bucket_half_count_magnitude) as i64 - 1).max(0);
        1u64 << bucket_index as u32
    }

    fn highest_equivalent(&self, index: usize) -> u64 {
        self.value_from_index(index) + self.equivalent_range(index) - 1
    }

    fn median_equivalent(&self, index: usize) -> u64 {
        self.value_from_index(index) + (self.equivalent_range(index) >> 1)
    }
}

#[derive(Default)]
struct ExtremaTags {
    min: Option<Arc<String>>,
    max: Option<Arc<String>>,
}

/// A reservoir recording positive integers into HDR-style logarithmic
/// buckets.
///
/// Two bucket arrays alternate as the write side: a snapshot flips which
/// array producers record into, drains the retired array into a running
/// totals array, and reports the totals.  This keeps recording wait-free
/// while giving readers a coherent view -- the same A/B arrangement the
/// sampling reservoirs use for their slot storage.
///
/// Exact minimum and maximum are tracked in atomic cells; a short lock is
/// taken only to update the user value associated with a new extremum.
pub struct HdrReservoir {
    layout: Layout,
    primary: Box<[AtomicU64]>,
    secondary: Box<[AtomicU64]>,
    use_primary: AtomicBool,
    totals: Mutex<Vec<u64>>,
    count: AtomicU64,
    min: AtomicU64,
    max: AtomicU64,
    tags: Mutex<ExtremaTags>,
}

impl HdrReservoir {
    /// Creates a reservoir for the given configuration.
    pub fn new(config: HdrConfig) -> Result<Self, Error> {
        let layout = Layout::new(config)?;
        let make = |len: usize| {
            let mut cells = Vec::with_capacity(len);
            for _ in 0..len {
                cells.push(AtomicU64::new(0));
            }
            cells.into_boxed_slice()
        };

        Ok(HdrReservoir {
            layout,
            primary: make(layout.counts_len),
            secondary: make(layout.counts_len),
            use_primary: AtomicBool::new(true),
            totals: Mutex::new(vec![0; layout.counts_len]),
            count: AtomicU64::new(0),
            min: AtomicU64::new(u64::MAX),
            max: AtomicU64::new(0),
            tags: Mutex::new(ExtremaTags::default()),
        })
    }

    /// The highest recordable value.
    pub fn highest_trackable(&self) -> u64 {
        self.layout.highest_trackable
    }

    fn drain_into(source: &[AtomicU64], totals: &mut [u64]) {
        for (cell, total) in source.iter().zip(totals.iter_mut()) {
            let drained = cell.swap(0, Ordering::AcqRel);
            *total += drained;
        }
    }

    fn clear_locked(&self, totals: &mut [u64]) {
        totals.fill(0);
        for cell in self.primary.iter().chain(self.secondary.iter()) {
            cell.store(0, Ordering::Release);
        }
        self.count.store(0, Ordering::Release);
        self.min.store(u64::MAX, Ordering::Release);
        self.max.store(0, Ordering::Release);
        let mut tags = self.tags.lock();
        tags.min = None;
        tags.max = None;
    }
}

impl Reservoir for HdrReservoir {
    fn update_tagged(&self, value: i64, user_value: Option<Arc<String>>) {
        if value < 1 {
            // Sub-unit observations land in the first bucket.
            let index = self.layout.counts_index(1);
            self.record_at(index, 1, user_value);
            return;
        }
        let value = (value as u64).min(self.layout.highest_trackable);
        let index = self.layout.counts_index(value);
        self.record_at(index, value, user_value);
    }

    fn snapshot(&self, reset: bool) -> SnapshotRef {
        let mut totals = self.totals.lock();

        // Flip the write side, then drain the retired array into the running
        // totals.  Writers racing with the flip land in whichever array they
        // loaded; their counts are picked up by this drain or the next one.
        let use_primary = self.use_primary.load(Ordering::Acquire);
        self.use_primary.store(!use_primary, Ordering::Release);
        let retired = if use_primary { &self.primary } else { &self.secondary };
        Self::drain_into(retired, &mut totals);

        let counts = totals.clone();
        let total: u64 = counts.iter().sum();
        let mut min = self.min.load(Ordering::Acquire);
        let mut max = self.max.load(Ordering::Acquire);
        if min > max {
            // A writer can be caught between its bucket increment and its
            // extrema updates; fall back to bucket-derived bounds.
            min = counts
                .iter()
                .position(|count| *count > 0)
                .map(|index| self.layout.value_from_index(index))
                .unwrap_or(0);
            max = counts
                .iter()
                .rposition(|count| *count > 0)
                .map(|index| self.layout.highest_equivalent(index))
                .unwrap_or(0);
        }
        let (min_tag, max_tag) = {
            let tags = self.tags.lock();
            (tags.min.clone(), tags.max.clone())
        };
        let count = self.count.load(Ordering::Acquire);

        if reset {
            self.clear_locked(&mut totals);
        }

        Arc::new(HdrSnapshot {
            layout: self.layout,
            counts,
            total,
            count,
            min: if total == 0 { 0 } else { min },
            max: if total == 0 { 0 } else { max },
            min_tag,
            max_tag,
        })
    }

    fn reset(&self) {
        let mut totals = self.totals.lock();
        self.clear_locked(&mut totals);
    }
}

impl HdrReservoir {
    fn record_at(&self, index: usize, value: u64, user_value: Option<Arc<String>>) {
        let use_primary = self.use_primary.load(Ordering::Relaxed);
        let cells = if use_primary { &self.primary } else { &self.secondary };
        cells[index].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let previous_min = self.min.fetch_min(value, Ordering::AcqRel);
        if value < previous_min {
            self.tags.lock().min = user_value.clone();
        }
        let previous_max = self.max.fetch_max(value, Ordering::AcqRel);
        if value > previous_max {
            self.tags.lock().max = user_value;
        }
    }
}

/// Snapshot over an [`HdrReservoir`]'s bucket counts.
///
/// `values()` yields one representative per non-empty bucket (the bucket's
/// median-equivalent value, with the endpoints pinned to the exact tracked
/// minimum and maximum), so its length is the number of distinct buckets
/// touched rather than the total observation count.
pub struct HdrSnapshot {
    layout: Layout,
    counts: Vec<u64>,
    total: u64,
    count: u64,
    min: u64,
    max: u64,
    min_tag: Option<Arc<String>>,
    max_tag: Option<Arc<String>>,
}

impl HdrSnapshot {
    fn representatives(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(index, count)| (self.layout.median_equivalent(index), *count))
    }
}

impl Snapshot for HdrSnapshot {
    fn count(&self) -> u64 {
        self.count
    }

    fn size(&self) -> usize {
        self.counts.iter().filter(|count| **count > 0).count()
    }

    fn min(&self) -> f64 {
        self.min as f64
    }

    fn max(&self) -> f64 {
        self.max as f64
    }

    fn min_user_value(&self) -> Option<Arc<String>> {
        self.min_tag.clone()
    }

    fn max_user_value(&self) -> Option<Arc<String>> {
        self.max_tag.clone()
    }

    fn mean(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let sum: f64 = self.representatives().map(|(value, count)| value as f64 * count as f64).sum();
        sum / self.total as f64
    }

    fn std_dev(&self) -> f64 {
        if self.total < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let sum_sq: f64 = self
            .representatives()
            .map(|(value, count)| count as f64 * (value as f64 - mean).powi(2))
            .sum();
        (sum_sq / self.total as f64).sqrt()
    }

    fn quantile(&self, q: f64) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        if q <= 0.0 {
            return self.min as f64;
        }
        if q >= 1.0 {
            return self.max as f64;
        }

        let target = ((q * self.total as f64).ceil() as u64).max(1);
        let mut cumulative = 0u64;
        for (index, count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                // The lowest recorded value whose bucket satisfies the
                // cumulative count.
                let value = self.layout.value_from_index(index);
                return value.clamp(self.min, self.max) as f64;
            }
        }
        self.max as f64
    }

    fn values(&self) -> Vec<f64> {
        let mut values: Vec<f64> =
            self.representatives().map(|(value, _)| value as f64).collect();
        if let Some(first) = values.first_mut() {
            *first = self.min as f64;
        }
        if let Some(last) = values.last_mut() {
            *last = self.max as f64;
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::{HdrConfig, HdrReservoir};
    use crate::error::Error;
    use crate::reservoir::Reservoir;
    use crate::snapshot::Snapshot as _;
    use std::sync::Arc;

    fn reservoir(digits: u8, highest: u64) -> HdrReservoir {
        HdrReservoir::new(HdrConfig { significant_digits: digits, highest_trackable: highest })
            .unwrap()
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let bad_digits =
            HdrReservoir::new(HdrConfig { significant_digits: 6, highest_trackable: 1000 });
        assert!(matches!(bad_digits, Err(Error::InvalidSignificantDigits(6))));

        let bad_range =
            HdrReservoir::new(HdrConfig { significant_digits: 2, highest_trackable: 1 });
        assert!(matches!(bad_range, Err(Error::InvalidTrackableRange(1))));
    }

    #[test]
    fn single_value_round_trips_exactly_at_low_magnitudes() {
        let reservoir = reservoir(2, 1_000_000);
        reservoir.update(100);

        let snap = reservoir.snapshot(false);
        assert_eq!(snap.count(), 1);
        assert_eq!(snap.min(), 100.0);
        assert_eq!(snap.max(), 100.0);
        assert_eq!(snap.quantile(0.5), 100.0);
    }

    #[test]
    fn p100_is_within_relative_error_of_true_max() {
        for digits in [0u8, 1, 2, 3] {
            let reservoir = reservoir(digits, 10_000_000_000);
            let bound = 10f64.powi(-(digits as i32));
            for value in [1i64, 17, 999, 123_456, 9_876_543, 1_000_000_000] {
                reservoir.update(value);
                let snap = reservoir.snapshot(true);
                let p100 = snap.quantile(1.0);
                let error = (p100 - value as f64).abs() / value as f64;
                assert!(
                    error <= bound,
                    "digits={digits} value={value} p100={p100} error={error}"
                );
            }
        }
    }

    #[test]
    fn quantiles_are_monotonic_and_pinned_at_the_ends() {
        let reservoir = reservoir(2, 1_000_000);
        for value in 1..=1000 {
            reservoir.update(value);
        }

        let snap = reservoir.snapshot(false);
        assert_eq!(snap.quantile(0.0), 1.0);
        assert_eq!(snap.quantile(1.0), 1000.0);

        let mut last = f64::MIN;
        for i in 0..=1000 {
            let v = snap.quantile(i as f64 / 1000.0);
            assert!(v >= last, "q={} v={v} last={last}", i as f64 / 1000.0);
            last = v;
        }

        // Median within 1% of the true median.
        assert!((snap.median() - 500.0).abs() / 500.0 <= 0.01 + 1e-9);
    }

    #[test]
    fn out_of_range_values_saturate() {
        let reservoir = reservoir(2, 1000);
        reservoir.update(-5);
        reservoir.update(0);
        reservoir.update(1_000_000);

        let snap = reservoir.snapshot(false);
        assert_eq!(snap.count(), 3);
        assert_eq!(snap.min(), 1.0);
        assert_eq!(snap.max(), 1000.0);
    }

    #[test]
    fn extrema_tags_follow_new_extremes() {
        let reservoir = reservoir(2, 100_000);
        reservoir.update_tagged(500, Some(Arc::new("first".to_string())));
        reservoir.update_tagged(100, Some(Arc::new("low".to_string())));
        reservoir.update(300);
        reservoir.update_tagged(900, Some(Arc::new("high".to_string())));

        let snap = reservoir.snapshot(false);
        assert_eq!(snap.min_user_value().unwrap().as_str(), "low");
        assert_eq!(snap.max_user_value().unwrap().as_str(), "high");
    }

    #[test]
    fn successive_snapshots_accumulate_without_reset() {
        let reservoir = reservoir(2, 10_000);
        reservoir.update(10);
        let first = reservoir.snapshot(false);
        assert_eq!(first.count(), 1);

        reservoir.update(20);
        let second = reservoir.snapshot(false);
        assert_eq!(second.count(), 2);
        assert_eq!(second.min(), 10.0);
        assert_eq!(second.max(), 20.0);
    }

    #[test]
    fn reset_returns_to_empty() {
        let reservoir = reservoir(2, 10_000);
        reservoir.update_tagged(42, Some(Arc::new("t".to_string())));
        reservoir.reset();

        let snap = reservoir.snapshot(false);
        assert_eq!(snap.count(), 0);
        assert_eq!(snap.size(), 0);
        assert_eq!(snap.min(), 0.0);
        assert_eq!(snap.max(), 0.0);
        assert_eq!(snap.mean(), 0.0);
        assert!(snap.min_user_value().is_none());
    }

    #[test]
    fn std_dev_of_identical_values_is_zero() {
        let reservoir = reservoir(3, 10_000);
        for _ in 0..100 {
            reservoir.update(250);
        }
        let snap = reservoir.snapshot(false);
        assert_eq!(snap.std_dev(), 0.0);
        assert_eq!(snap.mean(), 250.0);
    }
}
