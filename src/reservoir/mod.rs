//! Bounded-memory sampling strategies feeding histograms.
//!
//! A [`Reservoir`] maintains a statistically useful sample of an unbounded
//! observation stream in fixed space.  Four strategies are provided:
//!
//! - [`UniformReservoir`]: Vitter's Algorithm R, uniform over the whole
//!   stream.
//! - [`SlidingWindowReservoir`]: the last N observations.
//! - [`ExponentiallyDecayingReservoir`]: forward-decay priority sampling,
//!   biased towards recent data.
//! - [`HdrReservoir`]: high-dynamic-range logarithmic buckets with a
//!   configurable relative-error bound.

use std::cell::UnsafeCell;
use std::sync::Arc;

use rand::rngs::OsRng;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

use crate::snapshot::SnapshotRef;

mod decaying;
mod hdr;
mod sliding;
mod uniform;

pub use decaying::{ExponentiallyDecayingConfig, ExponentiallyDecayingReservoir};
pub use hdr::{HdrConfig, HdrReservoir, HdrSnapshot};
pub use sliding::SlidingWindowReservoir;
pub use uniform::UniformReservoir;

/// Default sample capacity for the uniform and decaying reservoirs.
pub const DEFAULT_CAPACITY: usize = 1028;

thread_local! {
    static FAST_RNG: UnsafeCell<Xoshiro256StarStar> = {
        UnsafeCell::new(Xoshiro256StarStar::try_from_rng(&mut OsRng).unwrap())
    };
}

fn with_rng<T>(f: impl FnOnce(&mut Xoshiro256StarStar) -> T) -> T {
    FAST_RNG.with(|rng| {
        // SAFETY: the mutable reference points at a thread-local value and
        // never outlives the closure executing on this thread.
        let rng = unsafe { &mut *rng.get() };
        f(rng)
    })
}

/// A uniform draw from `[0, upper)`.
pub(crate) fn fastrand(upper: u64) -> u64 {
    with_rng(|rng| rng.random_range(0..upper))
}

/// A uniform draw from `(0.0, 1.0)`: the standard distribution samples
/// `[0.0, 1.0)`, and exact zeroes are retried so the result can head a
/// division.
pub(crate) fn random_unit() -> f64 {
    with_rng(|rng| loop {
        let u: f64 = rng.random();
        if u > 0.0 {
            return u;
        }
    })
}

/// A thread-safe, bounded-memory sample of an observation stream.
pub trait Reservoir: Send + Sync {
    /// Records an observation.
    fn update(&self, value: i64) {
        self.update_tagged(value, None);
    }

    /// Records an observation with a free-form tag that is surfaced if the
    /// observation turns out to be the snapshot's minimum or maximum.
    fn update_tagged(&self, value: i64, user_value: Option<Arc<String>>);

    /// Produces a consistent view of the current samples, optionally
    /// resetting the reservoir afterwards.
    fn snapshot(&self, reset: bool) -> SnapshotRef;

    /// Discards all samples.
    fn reset(&self);
}
