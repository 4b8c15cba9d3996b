//! The managed thread handle.

use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
#[cfg(target_os = "linux")]
use std::sync::atomic::{AtomicI32, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::error::{Error, PanicError, Result};
use crate::thread::key::ThreadKey;
use crate::thread::state::{Activity, ActivityCell, ExecutionState};

/// Callback invoked with the panic of a managed thread.
pub type PanicHandler = Arc<dyn Fn(&PanicError) + Send + Sync>;

type Body = Box<dyn FnOnce() + Send + 'static>;

thread_local! {
    static MANAGED: RefCell<Option<Arc<Inner>>> = const { RefCell::new(None) };
}

enum Lifecycle {
    Unstarted(Body),
    Started(JoinHandle<()>),
    /// Joined, or the spawn failed.
    Reaped,
}

struct Inner {
    key: ThreadKey,
    name: String,
    lifecycle: Mutex<Lifecycle>,
    terminated: Mutex<bool>,
    exited: Condvar,
    activity: ActivityCell,
    #[cfg(target_os = "linux")]
    native_tid: AtomicI32,
    panic_handler: Mutex<Option<PanicHandler>>,
}

/// A thread whose lifecycle the driver can observe.
///
/// Unlike [`std::thread::spawn`], creating a `ManagedThread` does not run
/// anything: the body is held until [`start`](Self::start) (or one of the
/// driver's `run_*` operations) spawns it. This lets a test register the
/// thread and enable breakpoints before it executes a single instruction.
///
/// Clones share the same thread.
///
/// # Example
///
/// ```rust
/// use contester::ManagedThread;
/// use std::time::Duration;
///
/// let thread = ManagedThread::new(|| println!("hello"));
/// assert!(!thread.is_started());
///
/// thread.start().unwrap();
/// assert!(thread.join_timeout(Duration::from_secs(10)));
/// assert!(thread.is_terminated());
/// ```
#[derive(Clone)]
pub struct ManagedThread {
    inner: Arc<Inner>,
}

impl ManagedThread {
    /// Creates an unstarted, unregistered thread that will run `body`.
    pub fn new<F>(body: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::builder().build(body)
    }

    /// Returns a builder for naming the thread or installing a panic handler.
    #[must_use]
    pub fn builder() -> ManagedThreadBuilder {
        ManagedThreadBuilder::default()
    }

    /// Returns the identity of this thread.
    #[must_use]
    pub fn key(&self) -> ThreadKey {
        self.inner.key
    }

    /// Returns the thread name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns true once the thread has been started.
    #[must_use]
    pub fn is_started(&self) -> bool {
        !matches!(*self.inner.lifecycle.lock(), Lifecycle::Unstarted(_))
    }

    /// Returns true once the body has returned or panicked.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        *self.inner.terminated.lock()
    }

    /// Returns true while the thread is started and not terminated.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.is_started() && !self.is_terminated()
    }

    /// Returns the execution state as reported by the instrumented
    /// primitives in [`crate::sync`].
    #[must_use]
    pub fn execution_state(&self) -> ExecutionState {
        if self.is_terminated() {
            ExecutionState::Terminated
        } else if !self.is_started() {
            ExecutionState::New
        } else {
            self.inner.activity.get().into()
        }
    }

    /// Spawns the OS thread.
    ///
    /// This does not register the thread with a driver; use
    /// [`crate::start`] for that.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyStarted`] if the thread was started before, or
    /// [`Error::Spawn`] if the OS refuses to create it.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.inner.lifecycle.lock();
        let body = match std::mem::replace(&mut *lifecycle, Lifecycle::Reaped) {
            Lifecycle::Unstarted(body) => body,
            other => {
                *lifecycle = other;
                return Err(Error::AlreadyStarted {
                    thread: self.inner.name.clone(),
                });
            }
        };

        let inner = Arc::clone(&self.inner);
        let spawned = std::thread::Builder::new()
            .name(self.inner.name.clone())
            .spawn(move || run(inner, body));

        match spawned {
            Ok(handle) => {
                *lifecycle = Lifecycle::Started(handle);
                debug!(thread = %self.inner.name, key = %self.inner.key, "started");
                Ok(())
            }
            Err(source) => {
                drop(lifecycle);
                self.mark_terminated();
                Err(Error::Spawn {
                    thread: self.inner.name.clone(),
                    source,
                })
            }
        }
    }

    /// Waits up to `timeout` for the thread to terminate, then reaps it.
    ///
    /// Returns `true` if the thread terminated. An unstarted thread never
    /// terminates, so this returns `false` for it after the timeout.
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        if !self.wait_terminated(timeout) {
            return false;
        }

        let mut lifecycle = self.inner.lifecycle.lock();
        if let Lifecycle::Started(handle) = std::mem::replace(&mut *lifecycle, Lifecycle::Reaped) {
            drop(lifecycle);
            if handle.join().is_err() {
                warn!(thread = %self.inner.name, "panic escaped the panic handler chain");
            }
        }
        true
    }

    /// Blocks until the thread terminates or `timeout` elapses.
    pub(crate) fn wait_terminated(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut terminated = self.inner.terminated.lock();
        while !*terminated {
            match deadline {
                Some(deadline) => {
                    if self
                        .inner
                        .exited
                        .wait_until(&mut terminated, deadline)
                        .timed_out()
                    {
                        break;
                    }
                }
                None => self.inner.exited.wait(&mut terminated),
            }
        }
        *terminated
    }

    /// Installs `first` in front of the current panic handler.
    pub(crate) fn chain_panic_handler<H>(&self, first: H)
    where
        H: Fn(&PanicError) + Send + Sync + 'static,
    {
        let mut slot = self.inner.panic_handler.lock();
        let previous = slot.take();
        *slot = Some(Arc::new(move |error: &PanicError| {
            first(error);
            if let Some(previous) = &previous {
                previous(error);
            }
        }));
    }

    /// Returns the kernel thread id once the thread runs.
    #[cfg(target_os = "linux")]
    pub(crate) fn native_tid(&self) -> Option<i32> {
        match self.inner.native_tid.load(Ordering::SeqCst) {
            0 => None,
            tid => Some(tid),
        }
    }

    fn mark_terminated(&self) {
        *self.inner.terminated.lock() = true;
        self.inner.exited.notify_all();
    }
}

impl PartialEq for ManagedThread {
    fn eq(&self, other: &Self) -> bool {
        self.inner.key == other.inner.key
    }
}

impl Eq for ManagedThread {}

impl fmt::Debug for ManagedThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedThread")
            .field("key", &self.inner.key)
            .field("name", &self.inner.name)
            .field("state", &self.execution_state())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ManagedThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.name)
    }
}

/// Builder for [`ManagedThread`].
#[derive(Default)]
pub struct ManagedThreadBuilder {
    name: Option<String>,
    panic_handler: Option<PanicHandler>,
}

impl ManagedThreadBuilder {
    /// Sets the thread name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Installs a panic handler, invoked after the driver has recorded the
    /// panic.
    #[must_use]
    pub fn panic_handler<H>(mut self, handler: H) -> Self
    where
        H: Fn(&PanicError) + Send + Sync + 'static,
    {
        self.panic_handler = Some(Arc::new(handler));
        self
    }

    /// Creates the unstarted thread.
    pub fn build<F>(self, body: F) -> ManagedThread
    where
        F: FnOnce() + Send + 'static,
    {
        let key = ThreadKey::next();
        let name = self
            .name
            .unwrap_or_else(|| format!("contester-{}", key.as_u64()));
        ManagedThread {
            inner: Arc::new(Inner {
                key,
                name,
                lifecycle: Mutex::new(Lifecycle::Unstarted(Box::new(body))),
                terminated: Mutex::new(false),
                exited: Condvar::new(),
                activity: ActivityCell::default(),
                #[cfg(target_os = "linux")]
                native_tid: AtomicI32::new(0),
                panic_handler: Mutex::new(self.panic_handler),
            }),
        }
    }
}

/// Sets the activity of the calling managed thread.
///
/// Returns the previous activity, or `None` on threads the driver does not
/// manage.
pub(crate) fn mark_current(activity: Activity) -> Option<Activity> {
    MANAGED.with(|managed| {
        managed
            .borrow()
            .as_ref()
            .map(|inner| inner.activity.replace(activity))
    })
}

/// Flags the thread terminated however the body exits.
struct ExitGuard(Arc<Inner>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        MANAGED.with(|managed| managed.borrow_mut().take());
        *self.0.terminated.lock() = true;
        self.0.exited.notify_all();
    }
}

fn run(inner: Arc<Inner>, body: Body) {
    inner.key.adopt();
    #[cfg(target_os = "linux")]
    inner
        .native_tid
        .store(nix::unistd::gettid().as_raw(), Ordering::SeqCst);
    MANAGED.with(|managed| *managed.borrow_mut() = Some(Arc::clone(&inner)));
    let exit = ExitGuard(Arc::clone(&inner));

    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(body)) {
        let error = PanicError::from_payload(&inner.name, payload.as_ref());
        debug!(thread = %inner.name, message = error.message(), "caught panic");
        let handler = inner.panic_handler.lock().clone();
        if let Some(handler) = handler {
            handler(&error);
        }
    }

    // A managed thread may have driven sub-threads of its own.
    crate::driver::cleanup();
    drop(exit);
}
