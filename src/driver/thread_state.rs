//! Per-thread suspension bookkeeping.
//!
//! One lock guards the suspension marker, the captured panic and the permit of
//! the wait primitive. Recording a suspension and parking happen under that
//! lock without releasing it in between, so a `resume` can never slip into the
//! gap and be lost.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::PanicError;

/// Bookkeeping for one managed thread.
pub(crate) struct ThreadState {
    name: String,
    inner: Mutex<StateInner>,
    /// Signalled when the thread suspends or is resumed.
    transition: Condvar,
    /// The private wait primitive of the suspended thread.
    permit: Condvar,
}

#[derive(Default)]
struct StateInner {
    suspended_at: Option<String>,
    panic: Option<Arc<PanicError>>,
    permit: bool,
}

/// Outcome of [`ThreadState::await_suspension`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Awaited {
    Suspended(String),
    Terminated,
    TimedOut,
}

impl ThreadState {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(StateInner::default()),
            transition: Condvar::new(),
            permit: Condvar::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn suspended_at(&self) -> Option<String> {
        self.inner.lock().suspended_at.clone()
    }

    pub(crate) fn panic(&self) -> Option<Arc<PanicError>> {
        self.inner.lock().panic.clone()
    }

    pub(crate) fn record_panic(&self, error: PanicError) {
        self.inner.lock().panic = Some(Arc::new(error));
    }

    /// Marks the thread suspended at `id` and wakes waiting drivers.
    ///
    /// The returned [`Suspension`] keeps the state locked until it parks.
    pub(crate) fn suspend(&self, id: &str) -> Suspension<'_> {
        let mut inner = self.inner.lock();
        debug_assert!(inner.suspended_at.is_none(), "double park");
        inner.suspended_at = Some(id.to_string());
        inner.permit = false;
        self.transition.notify_all();
        Suspension { state: self, inner }
    }

    /// Clears the suspension and hands out the permit.
    ///
    /// Returns the breakpoint the thread was suspended at, or `None` if it
    /// was running.
    pub(crate) fn resume(&self) -> Option<String> {
        let mut inner = self.inner.lock();
        let id = inner.suspended_at.take()?;
        inner.permit = true;
        self.permit.notify_one();
        self.transition.notify_all();
        Some(id)
    }

    /// Waits until the thread suspends, `terminated` reports true, or
    /// `deadline` passes, re-checking at least every `slice`.
    ///
    /// A `None` deadline lies beyond what `Instant` can represent and never
    /// passes.
    pub(crate) fn await_suspension<F>(
        &self,
        deadline: Option<Instant>,
        slice: Duration,
        terminated: F,
    ) -> Awaited
    where
        F: Fn() -> bool,
    {
        let mut inner = self.inner.lock();
        loop {
            if let Some(id) = &inner.suspended_at {
                return Awaited::Suspended(id.clone());
            }
            if terminated() {
                return Awaited::Terminated;
            }
            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Awaited::TimedOut;
                    }
                    slice.min(deadline - now)
                }
                None => slice,
            };
            self.transition.wait_for(&mut inner, wait);
        }
    }

    /// Sleeps for up to `slice`, waking early on a suspension transition.
    pub(crate) fn pause(&self, slice: Duration) {
        let mut inner = self.inner.lock();
        self.transition.wait_for(&mut inner, slice);
    }
}

/// A recorded suspension whose thread has not parked yet.
pub(crate) struct Suspension<'a> {
    state: &'a ThreadState,
    inner: MutexGuard<'a, StateInner>,
}

impl Suspension<'_> {
    /// Blocks until [`ThreadState::resume`] hands out the permit.
    pub(crate) fn park(mut self) {
        while !self.inner.permit {
            self.state.permit.wait(&mut self.inner);
        }
        self.inner.permit = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_resume_without_suspension() {
        let state = ThreadState::new("t");
        assert_eq!(state.resume(), None);
        assert_eq!(state.suspended_at(), None);
    }

    #[test]
    fn test_suspend_then_resume_releases_parked_thread() {
        let state = Arc::new(ThreadState::new("t"));
        let worker_state = Arc::clone(&state);
        let worker = thread::spawn(move || worker_state.suspend("id").park());

        let awaited = state.await_suspension(
            Instant::now().checked_add(Duration::from_secs(10)),
            Duration::from_millis(1),
            || false,
        );
        assert_eq!(awaited, Awaited::Suspended("id".to_string()));

        assert_eq!(state.resume(), Some("id".to_string()));
        worker.join().unwrap();
        assert_eq!(state.suspended_at(), None);
    }

    #[test]
    fn test_await_times_out() {
        let state = ThreadState::new("t");
        let awaited = state.await_suspension(
            Instant::now().checked_add(Duration::from_millis(5)),
            Duration::from_millis(1),
            || false,
        );
        assert_eq!(awaited, Awaited::TimedOut);
    }

    #[test]
    fn test_await_reports_termination() {
        let state = ThreadState::new("t");
        let awaited = state.await_suspension(
            Instant::now().checked_add(Duration::from_secs(10)),
            Duration::from_millis(1),
            || true,
        );
        assert_eq!(awaited, Awaited::Terminated);
    }

    #[test]
    fn test_unbounded_await_still_sees_termination() {
        let state = ThreadState::new("t");
        let awaited = state.await_suspension(None, Duration::from_millis(1), || true);
        assert_eq!(awaited, Awaited::Terminated);
    }

    #[test]
    fn test_record_panic() {
        let state = ThreadState::new("t");
        assert!(state.panic().is_none());
        state.record_panic(PanicError::from_payload("t", &"boom"));
        assert_eq!(state.panic().unwrap().message(), "boom");
    }
}
