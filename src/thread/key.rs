//! Thread identities used by the driver.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

thread_local! {
    static CURRENT: Cell<Option<ThreadKey>> = const { Cell::new(None) };
}

/// Process-unique identifier for a thread known to the driver.
///
/// Every OS thread that calls into the driver gets a key lazily. A
/// [`ManagedThread`](crate::ManagedThread) receives its key at construction so
/// it can be registered before it runs; the spawned thread adopts that key
/// before executing any user code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadKey(u64);

impl ThreadKey {
    /// Allocates a fresh key.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the key of the calling thread, allocating one on first use.
    #[must_use]
    pub fn current() -> Self {
        CURRENT.with(|cell| {
            if let Some(key) = cell.get() {
                key
            } else {
                let key = Self::next();
                cell.set(Some(key));
                key
            }
        })
    }

    /// Makes `self` the key of the calling thread.
    pub(crate) fn adopt(self) {
        CURRENT.with(|cell| cell.set(Some(self)));
    }

    /// Returns the raw key value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thread({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_key_unique() {
        let k1 = ThreadKey::next();
        let k2 = ThreadKey::next();

        assert_ne!(k1, k2);
        assert!(k1 < k2);
    }

    #[test]
    fn test_current_is_stable() {
        assert_eq!(ThreadKey::current(), ThreadKey::current());
    }

    #[test]
    fn test_current_differs_between_threads() {
        let here = ThreadKey::current();
        let there = std::thread::spawn(ThreadKey::current).join().unwrap();

        assert_ne!(here, there);
    }

    #[test]
    fn test_adopted_key_becomes_current() {
        let key = ThreadKey::next();
        let seen = std::thread::spawn(move || {
            key.adopt();
            ThreadKey::current()
        })
        .join()
        .unwrap();

        assert_eq!(seen, key);
    }

    #[test]
    fn test_display() {
        let key = ThreadKey(7);
        assert_eq!(key.to_string(), "Thread(7)");
        assert_eq!(key.as_u64(), 7);
    }
}
