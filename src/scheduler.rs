//! Periodic tick scheduling for rate engines and reservoir maintenance.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{select, unbounded, Sender};
use parking_lot::Mutex;

use crate::error::{panic_message, Error, ErrorSink};

/// The action invoked on every tick.
pub type TickAction = Box<dyn FnMut() + Send>;

/// Drives an action approximately every interval.
///
/// No real-time guarantees: jitter is acceptable, and a tick that fires while
/// the previous invocation of the action is still running is skipped rather
/// than queued.  A panicking action is reported to the error sink and its
/// schedule is cancelled.
pub trait Scheduler: Send + Sync {
    /// Starts invoking `action` every `interval`.
    ///
    /// Returns [`Error::InvalidTickInterval`] for a zero interval.  The
    /// returned handle cancels the schedule when stopped or dropped.
    fn schedule(&self, interval: Duration, action: TickAction) -> Result<TickHandle, Error>;
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn schedule(&self, interval: Duration, action: TickAction) -> Result<TickHandle, Error> {
        (**self).schedule(interval, action)
    }
}

trait Cancel: Send + Sync {
    fn cancel(&self);
}

/// A cancellable handle to a running schedule.
///
/// `stop` is idempotent and returns only after the in-flight action, if any,
/// has observed cancellation.  Dropping the handle stops the schedule.
pub struct TickHandle {
    inner: Box<dyn Cancel>,
}

impl TickHandle {
    fn new(inner: impl Cancel + 'static) -> Self {
        TickHandle { inner: Box::new(inner) }
    }

    /// A handle that controls nothing.  Useful as a placeholder in tests.
    pub fn noop() -> Self {
        struct Noop;
        impl Cancel for Noop {
            fn cancel(&self) {}
        }
        TickHandle::new(Noop)
    }

    /// A handle that invokes `cancel` when stopped or dropped.
    pub(crate) fn from_fn(cancel: impl Fn() + Send + Sync + 'static) -> Self {
        struct FnCancel<F>(F);
        impl<F: Fn() + Send + Sync> Cancel for FnCancel<F> {
            fn cancel(&self) {
                (self.0)();
            }
        }
        TickHandle::new(FnCancel(cancel))
    }

    /// Cancels the schedule, waiting for the current action to finish.
    pub fn stop(&self) {
        self.inner.cancel();
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.inner.cancel();
    }
}

impl std::fmt::Debug for TickHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickHandle").finish_non_exhaustive()
    }
}

struct ThreadCancel {
    stop_tx: Sender<()>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Cancel for ThreadCancel {
    fn cancel(&self) {
        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            // The loop may have already exited on a panic, in which case the
            // receiver is gone and the send fails; the join below still
            // completes immediately.
            let _ = self.stop_tx.send(());
            let _ = handle.join();
        }
    }
}

/// A [`Scheduler`] that runs each schedule on its own dedicated thread.
///
/// Cancellation and tick pacing go through crossbeam channels: the loop
/// blocks on either the tick channel or the stop channel, whichever fires
/// first.  Because the action runs on the loop's own thread, overlapping
/// invocations cannot occur; ticks that elapse while the action runs are
/// drained and discarded afterwards.
pub struct ThreadScheduler {
    sink: Arc<dyn ErrorSink>,
}

impl ThreadScheduler {
    /// Creates a scheduler reporting action failures to the default sink.
    pub fn new() -> Self {
        ThreadScheduler { sink: crate::error::default_sink() }
    }

    /// Creates a scheduler reporting action failures to `sink`.
    pub fn with_sink(sink: Arc<dyn ErrorSink>) -> Self {
        ThreadScheduler { sink }
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule(&self, interval: Duration, mut action: TickAction) -> Result<TickHandle, Error> {
        if interval.is_zero() {
            return Err(Error::InvalidTickInterval);
        }

        let (stop_tx, stop_rx) = unbounded::<()>();
        let sink = Arc::clone(&self.sink);

        let thread = std::thread::Builder::new()
            .name("instruments-tick".to_string())
            .spawn(move || {
                let ticker = crossbeam_channel::tick(interval);
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            let outcome = catch_unwind(AssertUnwindSafe(&mut action));
                            if let Err(payload) = outcome {
                                let message = panic_message(&payload);
                                sink.report("scheduled action panicked; schedule cancelled", &message);
                                break;
                            }
                            // Discard ticks that elapsed while the action ran.
                            while ticker.try_recv().is_ok() {}
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }
            })
            .expect("failed to spawn scheduler thread");

        Ok(TickHandle::new(ThreadCancel { stop_tx, thread: Mutex::new(Some(thread)) }))
    }
}
