//! RAII cleanup of a driver context.

use std::marker::PhantomData;

use crate::driver::context::cleanup;

/// Calls [`cleanup`](crate::cleanup) when dropped.
///
/// A driver context belongs to the thread that created it, so the guard is
/// neither `Send` nor `Sync`: dropping it on another thread would clean up the
/// wrong context. Hold one at the top of every test.
///
/// # Example
///
/// ```rust
/// use contester::{enable_breakpoint, thread, DriverScope};
///
/// {
///     let _scope = DriverScope::new();
///     let worker = thread(|| {});
///     enable_breakpoint(&worker, "id")?;
/// }
/// // The context is gone; the worker is no longer registered.
/// # Ok::<(), contester::Error>(())
/// ```
#[must_use = "the driver context is cleaned up when the scope is dropped"]
#[derive(Debug, Default)]
pub struct DriverScope {
    _not_send: PhantomData<*const ()>,
}

impl DriverScope {
    /// Creates a guard for the calling thread's driver context.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Drop for DriverScope {
    fn drop(&mut self) {
        cleanup();
    }
}
