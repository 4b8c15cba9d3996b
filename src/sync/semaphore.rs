//! Counting semaphore that reports waiting.

use parking_lot::{Condvar, Mutex};

use super::ActivityGuard;
use crate::thread::Activity;

/// A counting semaphore that marks the calling managed thread
/// [`Waiting`](crate::ExecutionState::Waiting) while no permit is available.
#[derive(Debug, Default)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    /// Creates a semaphore holding `permits` permits.
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Takes a permit, waiting until one is released if none is available.
    pub fn acquire(&self) {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            let _waiting = ActivityGuard::enter(Activity::Waiting);
            while *permits == 0 {
                self.available.wait(&mut permits);
            }
        }
        *permits -= 1;
    }

    /// Takes a permit if one is available.
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            false
        } else {
            *permits -= 1;
            true
        }
    }

    /// Returns a permit, waking one waiter.
    pub fn release(&self) {
        *self.permits.lock() += 1;
        self.available.notify_one();
    }

    /// Returns the number of permits currently available.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        *self.permits.lock()
    }
}
