//! Uniform reservoir sampling (Vitter's Algorithm R).

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use super::{fastrand, Reservoir, DEFAULT_CAPACITY};
use crate::snapshot::{SampleSnapshot, SnapshotRef};

/// A fixed-size reservoir holding a uniformly random sample of the stream.
///
/// Based on Vitter's ["Algorithm R"][vitter]: the k-th observation replaces a
/// random slot with probability `N/k`, so at any point every observation seen
/// so far had an equal chance of being retained.
///
/// Updates are lock-free.  A single atomic counter tracks the observation
/// count; slot writes race with readers, which is bounded and acceptable --
/// the snapshot path copies the slots into private memory before sorting.
///
/// [vitter]: https://www.cs.umd.edu/~samir/498/vitter.pdf
pub struct UniformReservoir {
    count: AtomicU64,
    values: Box<[AtomicI64]>,
    tags: Box<[ArcSwapOption<String>]>,
}

impl UniformReservoir {
    /// Creates a reservoir with the default capacity of 1028 samples.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a reservoir holding up to `capacity` samples.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut values = Vec::with_capacity(capacity);
        let mut tags = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            values.push(AtomicI64::new(0));
            tags.push(ArcSwapOption::const_empty());
        }
        UniformReservoir {
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

    fn set_slot(&self, index: usize, value: i64, tag: Option<Arc<String>>) {
        self.values[index].store(value, Ordering::Relaxed);
        self.tags[index].store(tag);
    }
}

impl Default for UniformReservoir {
    fn default() -> Self {
        Self::new()
    }
}

impl Reservoir for UniformReservoir {
    fn update_tagged(&self, value: i64, user_value: Option<Arc<String>>) {
        let capacity = self.values.len() as u64;
        let k = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        if k <= capacity {
            self.set_slot((k - 1) as usize, value, user_value);
        } else {
            let r = fastrand(k);
            if r < capacity {
                self.set_slot(r as usize, value, user_value);
            }
        }
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
        // Only the counter is cleared; slots are left to be overwritten by
        // subsequent updates.  An update racing with the reset can therefore
        // surface a pre-reset slot value in the very next snapshot.
        self.count.store(0, Ordering::Relaxed);
    }
}
