//! A value-producing gauge.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{default_sink, panic_message, ErrorSink};

/// A point-in-time value produced on demand by a user closure.
///
/// The closure runs on the reader's thread each time [`value`](Gauge::value)
/// is called.  A panicking closure never propagates: the failure is reported
/// to the error sink and the gauge reads NaN.
pub struct Gauge {
    value_fn: Box<dyn Fn() -> f64 + Send + Sync>,
    sink: Arc<dyn ErrorSink>,
}

impl Gauge {
    /// Creates a gauge producing values from `value_fn`, reporting failures
    /// to the default sink.
    pub fn new<F>(value_fn: F) -> Self
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        Self::with_sink(value_fn, default_sink())
    }

    /// Creates a gauge reporting failures to `sink`.
    pub fn with_sink<F>(value_fn: F, sink: Arc<dyn ErrorSink>) -> Self
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        Gauge { value_fn: Box::new(value_fn), sink }
    }

    /// Creates a gauge producing the ratio of two value closures.
    ///
    /// Division follows IEEE-754: a zero denominator yields an infinity or
    /// NaN rather than failing.
    pub fn ratio<N, D>(numerator: N, denominator: D) -> Self
    where
        N: Fn() -> f64 + Send + Sync + 'static,
        D: Fn() -> f64 + Send + Sync + 'static,
    {
        Self::new(move || numerator() / denominator())
    }

    /// Produces the current value, or NaN if the closure panicked.
    pub fn value(&self) -> f64 {
        match catch_unwind(AssertUnwindSafe(&self.value_fn)) {
            Ok(value) => value,
            Err(payload) => {
                let message = panic_message(&payload);
                self.sink.report("gauge value function panicked", &message);
                f64::NAN
            }
        }
    }
}

impl std::fmt::Debug for Gauge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gauge").finish_non_exhaustive()
    }
}
