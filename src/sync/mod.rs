//! Instrumented synchronization primitives
//!
//! Drop-in primitives for code under test. On a [`ManagedThread`] they record
//! when the thread blocks, so [`InstrumentedProbe`] can tell "blocked on a
//! resource" and "waiting for a signal" apart from "running". On any other
//! thread they behave like plain `parking_lot` primitives.
//!
//! # Example
//!
//! ```rust
//! use contester::sync::{Mutex, Semaphore};
//!
//! let counter = Mutex::new(0);
//! *counter.lock() += 1;
//! assert_eq!(*counter.lock(), 1);
//!
//! let ready = Semaphore::new(1);
//! ready.acquire();
//! assert_eq!(ready.available_permits(), 0);
//! ```
//!
//! [`ManagedThread`]: crate::ManagedThread
//! [`InstrumentedProbe`]: crate::probe::InstrumentedProbe

mod mutex;
mod semaphore;

pub use mutex::{Mutex, MutexGuard};
pub use semaphore::Semaphore;

use crate::thread::{mark_current, Activity};

/// Reports `activity` for the calling managed thread while alive.
struct ActivityGuard(Option<Activity>);

impl ActivityGuard {
    fn enter(activity: Activity) -> Self {
        Self(mark_current(activity))
    }
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.0 {
            mark_current(previous);
        }
    }
}
