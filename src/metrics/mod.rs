//! The update-path metric primitives.
//!
//! Each primitive is a concurrent data structure: the hot write path
//! (`increment`, `mark`, `update`, `record`) is wait-free or near-wait-free,
//! while the rare read path (`value`, `value_and_reset`) assembles a
//! consistent value object for exporters.

mod counter;
mod gauge;
mod histogram;
mod meter;
mod timer;

pub use counter::Counter;
pub use gauge::Gauge;
pub use histogram::Histogram;
pub use meter::Meter;
pub use timer::{Timer, TimerContext};
