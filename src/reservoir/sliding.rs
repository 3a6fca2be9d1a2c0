//! A reservoir of the N most recent observations.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use super::Reservoir;
use crate::snapshot::{SampleSnapshot, SnapshotRef};

/// A ring buffer over the most recent observations.
///
/// The k-th observation lands in slot `(k - 1) mod N`, so once the stream has
/// wrapped, the reservoir always holds exactly the last N values.  Updates
/// are lock-free; slot writes race with readers in the same bounded way as
/// [`UniformReservoir`](super::UniformReservoir).
pub struct SlidingWindowReservoir {
    count: AtomicU64,
    values: Box<[AtomicI64]>,
    tags: Box<[ArcSwapOption<String>]>,
}

impl SlidingWindowReservoir {
    /// Creates a reservoir over the last `capacity` observations.
    pub fn new(capacity: usize) -> Self {
        let mut values = Vec::with_capacity(capacity);
        let mut tags = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            values.push(AtomicI64::new(0));
            tags.push(ArcSwapOption::const_empty());
        }
        SlidingWindowReservoir {
            count: AtomicU64::new(0),
            values: values.into_boxed_slice(),
            tags: tags.into_boxed_slice(),
        }
    }

    /// The number of samples currently represented.
    pub fn size(&self) -> usize {
        let count = self.count.load(Ordering::Relaxed) as usize;
        count.min(self.values.len())
    }
}

impl Reservoir for SlidingWindowReservoir {
    fn update_tagged(&self, value: i64, user_value: Option<Arc<String>>) {
        let k = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        let index = ((k - 1) % self.values.len() as u64) as usize;
        self.values[index].store(value, Ordering::Relaxed);
        self.tags[index].store(user_value);
    }

    fn snapshot(&self, reset: bool) -> SnapshotRef {
        let count = self.count.load(Ordering::Relaxed);
        let populated = (count as usize).min(self.values.len());

        let mut samples = Vec::with_capacity(populated);
        for i in 0..populated {
            samples.push((self.values[i].load(Ordering::Relaxed), self.tags[i].load_full()));
        }

        if reset {
            self.reset();
        }

        Arc::new(SampleSnapshot::new(count, samples))
    }

    fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
        for i in 0..self.values.len() {
            self.values[i].store(0, Ordering::Relaxed);
            self.tags[i].store(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SlidingWindowReservoir;
    use crate::reservoir::Reservoir;
    use crate::snapshot::Snapshot as _;
    use std::sync::Arc;

    #[test]
    fn keeps_the_last_n_values() {
        let reservoir = SlidingWindowReservoir::new(4);
        for v in [1, 2, 3, 4, 5, 6] {
            reservoir.update(v);
        }

        let snap = reservoir.snapshot(false);
        assert_eq!(snap.size(), 4);
        assert_eq!(snap.count(), 6);
        assert_eq!(snap.values(), vec![3.0, 4.0, 5.0, 6.0]);
        assert_eq!(snap.min(), 3.0);
        assert_eq!(snap.max(), 6.0);
    }

    #[test]
    fn partial_fill_reports_only_written_slots() {
        let reservoir = SlidingWindowReservoir::new(8);
        reservoir.update(10);
        reservoir.update(20);

        let snap = reservoir.snapshot(false);
        assert_eq!(snap.size(), 2);
        assert_eq!(snap.values(), vec![10.0, 20.0]);
    }

    #[test]
    fn overwritten_slot_drops_its_tag() {
        let reservoir = SlidingWindowReservoir::new(2);
        reservoir.update_tagged(1, Some(Arc::new("old-min".to_string())));
        reservoir.update(5);
        // Wraps onto slot 0, replacing the tagged minimum.
        reservoir.update(9);

        let snap = reservoir.snapshot(false);
        assert_eq!(snap.values(), vec![5.0, 9.0]);
        assert!(snap.min_user_value().is_none());
        assert!(snap.max_user_value().is_none());
    }

    #[test]
    fn reset_clears_everything() {
        let reservoir = SlidingWindowReservoir::new(4);
        reservoir.update_tagged(3, Some(Arc::new("x".to_string())));
        reservoir.reset();

        let snap = reservoir.snapshot(false);
        assert_eq!(snap.count(), 0);
        assert_eq!(snap.size(), 0);

        reservoir.update(2);
        let snap = reservoir.snapshot(false);
        assert_eq!(snap.values(), vec![2.0]);
        assert!(snap.min_user_value().is_none());
    }
}
