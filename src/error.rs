use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Errors surfaced on the read/configuration path.
///
/// Update paths never return errors: a primitive stays usable no matter what
/// is thrown at it.  These variants cover argument validation when reading
/// values back out or when constructing a primitive with invalid settings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A quantile outside of the valid `[0.0, 1.0]` range was requested.
    #[error("quantile {0} is not within 0.0..=1.0")]
    InvalidQuantile(f64),

    /// A schedule was requested with a zero-length interval.
    #[error("tick interval must be non-zero")]
    InvalidTickInterval,

    /// An HDR reservoir was configured with an unsupported precision.
    #[error("significant digits {0} outside of the supported range 0..=5")]
    InvalidSignificantDigits(u8),

    /// An HDR reservoir was configured with an untrackable value range.
    #[error("highest trackable value {0} must be at least 2")]
    InvalidTrackableRange(u64),
}

/// A sink for failures that happen off the caller's thread.
///
/// Scheduled tick actions and gauge value functions can fail where there is
/// nobody to return an error to.  Those failures are handed to an
/// [`ErrorSink`] instead of being raised to producers.  Implementations must
/// be cheap and must never panic.
pub trait ErrorSink: Send + Sync {
    /// Reports a background failure together with a short static context
    /// message describing where it happened.
    fn report(&self, context: &'static str, error: &dyn fmt::Display);
}

/// The default sink, reporting through [`tracing::error!`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, context: &'static str, error: &dyn fmt::Display) {
        tracing::error!(%error, "{context}");
    }
}

/// A sink that writes directly to standard error.
///
/// Useful for embedders that have not installed a `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl ErrorSink for StderrSink {
    fn report(&self, context: &'static str, error: &dyn fmt::Display) {
        eprintln!("instruments: {context}: {error}");
    }
}

/// Returns the default sink shared by primitives that were not handed one.
pub(crate) fn default_sink() -> Arc<dyn ErrorSink> {
    Arc::new(TracingSink)
}

/// Best-effort extraction of a panic payload's message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn error_display() {
        assert_eq!(
            Error::InvalidQuantile(1.5).to_string(),
            "quantile 1.5 is not within 0.0..=1.0"
        );
        assert_eq!(Error::InvalidTickInterval.to_string(), "tick interval must be non-zero");
    }
}
