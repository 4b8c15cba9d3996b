//! Mutex that reports contention.

use std::fmt;
use std::ops::{Deref, DerefMut};

use super::ActivityGuard;
use crate::thread::Activity;

/// A mutual exclusion lock that marks the calling managed thread
/// [`BlockedOnResource`](crate::ExecutionState::BlockedOnResource) while it
/// waits for the lock.
pub struct Mutex<T: ?Sized> {
    inner: parking_lot::Mutex<T>,
}

/// RAII guard returned by [`Mutex::lock`].
pub struct MutexGuard<'a, T: ?Sized> {
    inner: parking_lot::MutexGuard<'a, T>,
}

impl<T> Mutex<T> {
    /// Creates a new unlocked mutex.
    pub fn new(value: T) -> Self {
        Self {
            inner: parking_lot::Mutex::new(value),
        }
    }

    /// Consumes the mutex, returning the protected value.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: ?Sized> Mutex<T> {
    /// Acquires the lock, blocking the current thread until it is available.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        if let Some(inner) = self.inner.try_lock() {
            return MutexGuard { inner };
        }
        let _blocked = ActivityGuard::enter(Activity::Blocked);
        MutexGuard {
            inner: self.inner.lock(),
        }
    }

    /// Attempts to acquire the lock without blocking.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.inner.try_lock().map(|inner| MutexGuard { inner })
    }

    /// Returns a mutable reference without locking.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl<T: ?Sized> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: ?Sized> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::{ExecutionState, ManagedThread};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[test]
    fn test_lock_and_mutate() {
        let mutex = Mutex::new(vec![1]);
        mutex.lock().push(2);
        assert_eq!(*mutex.lock(), vec![1, 2]);
        assert_eq!(mutex.into_inner(), vec![1, 2]);
    }

    #[test]
    fn test_try_lock_fails_while_held() {
        let mutex = Mutex::new(0);
        let guard = mutex.lock();
        assert!(mutex.try_lock().is_none());
        drop(guard);
        assert!(mutex.try_lock().is_some());
    }

    #[test]
    fn test_contended_lock_reports_blocked() {
        let mutex = Arc::new(Mutex::new(0));
        let held = mutex.lock();

        let shared = Arc::clone(&mutex);
        let thread = ManagedThread::new(move || *shared.lock() += 1);
        thread.start().unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while thread.execution_state() != ExecutionState::BlockedOnResource {
            assert!(Instant::now() < deadline, "thread never blocked");
            std::thread::sleep(Duration::from_millis(1));
        }

        drop(held);
        assert!(thread.join_timeout(Duration::from_secs(10)));
        assert_eq!(*mutex.lock(), 1);
    }
}
