//! Driver contexts and the process-wide registry.
//!
//! A driver context belongs to the thread that issued the registration, so
//! every test thread (and every managed thread that drives sub-threads of its
//! own) works in an isolated scope.
//!
//! Lock order is registry, then context tables, then thread state. The
//! registry lock is only held to resolve or mutate contexts.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::{debug, warn};

use crate::driver::config::DriverConfig;
use crate::driver::thread_state::ThreadState;
use crate::error::{Error, Result};
use crate::thread::{ManagedThread, ThreadKey};

/// Bookkeeping owned by one driver thread.
pub(crate) struct DriverContext {
    owner: ThreadKey,
    tables: Mutex<Tables>,
    next_thread_id: AtomicUsize,
    config: RwLock<DriverConfig>,
}

/// Thread registry and enabled breakpoints of one context.
#[derive(Default)]
pub(crate) struct Tables {
    pub(crate) threads: HashMap<ThreadKey, Arc<ThreadState>>,
    /// Breakpoint ID to the threads it is enabled for.
    pub(crate) enabled: HashMap<String, HashSet<ThreadKey>>,
}

impl Tables {
    pub(crate) fn is_enabled(&self, id: &str, key: ThreadKey) -> bool {
        self.enabled.get(id).is_some_and(|threads| threads.contains(&key))
    }
}

impl DriverContext {
    fn new(owner: ThreadKey) -> Self {
        Self {
            owner,
            tables: Mutex::new(Tables::default()),
            next_thread_id: AtomicUsize::new(1),
            config: RwLock::new(DriverConfig::default()),
        }
    }

    pub(crate) fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock()
    }

    pub(crate) fn config(&self) -> DriverConfig {
        self.config.read().clone()
    }

    pub(crate) fn set_config(&self, config: DriverConfig) {
        *self.config.write() = config;
    }

    fn next_thread_id(&self) -> usize {
        self.next_thread_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[derive(Default)]
struct Registry {
    /// Contexts by owning driver thread.
    contexts: HashMap<ThreadKey, Arc<DriverContext>>,
    /// Managed thread to the driver thread whose context holds it.
    owners: HashMap<ThreadKey, ThreadKey>,
}

impl Registry {
    fn context_or_create(&mut self, owner: ThreadKey) -> Arc<DriverContext> {
        Arc::clone(
            self.contexts
                .entry(owner)
                .or_insert_with(|| Arc::new(DriverContext::new(owner))),
        )
    }

    /// Registers `thread` in the context of `owner`.
    fn attach(&mut self, owner: ThreadKey, thread: &ManagedThread) {
        let context = self.context_or_create(owner);
        self.owners.insert(thread.key(), owner);

        let state = Arc::new(ThreadState::new(thread.name()));
        context
            .tables()
            .threads
            .insert(thread.key(), Arc::clone(&state));

        let recorder = Arc::downgrade(&state);
        thread.chain_panic_handler(move |error| {
            if let Some(state) = recorder.upgrade() {
                state.record_panic(error.clone());
            }
        });
        debug!(thread = %thread, driver = %owner, "registered");
    }
}

fn registry() -> &'static Mutex<Registry> {
    static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(Mutex::default)
}

/// Returns the context of the calling thread, if it has one.
pub(crate) fn caller_context() -> Option<Arc<DriverContext>> {
    registry()
        .lock()
        .contexts
        .get(&ThreadKey::current())
        .map(Arc::clone)
}

/// Returns the context of the calling thread, creating it if needed.
pub(crate) fn caller_context_or_create() -> Arc<DriverContext> {
    registry().lock().context_or_create(ThreadKey::current())
}

/// Returns the context that manages the thread identified by `key`.
pub(crate) fn owning_context(key: ThreadKey) -> Option<Arc<DriverContext>> {
    let registry = registry().lock();
    let owner = registry.owners.get(&key)?;
    registry.contexts.get(owner).map(Arc::clone)
}

/// Returns true if any context manages `thread`.
pub(crate) fn is_registered(thread: &ManagedThread) -> bool {
    registry().lock().owners.contains_key(&thread.key())
}

/// Resolves `thread` in the calling thread's context.
pub(crate) fn registered(thread: &ManagedThread) -> Result<(Arc<DriverContext>, Arc<ThreadState>)> {
    let not_registered = || Error::NotRegistered {
        thread: thread.name().to_string(),
    };
    let context = caller_context().ok_or_else(not_registered)?;
    let state = context
        .tables()
        .threads
        .get(&thread.key())
        .map(Arc::clone)
        .ok_or_else(not_registered)?;
    Ok((context, state))
}

/// Resolves `thread` in whichever context manages it.
pub(crate) fn registered_anywhere(thread: &ManagedThread) -> Result<Arc<ThreadState>> {
    owning_context(thread.key())
        .and_then(|context| context.tables().threads.get(&thread.key()).map(Arc::clone))
        .ok_or_else(|| Error::NotRegistered {
            thread: thread.name().to_string(),
        })
}

/// Creates a thread running `body`, registered with the calling thread's
/// context but not started.
///
/// The thread is named after the calling thread and a counter that is
/// private to the context, e.g. `"main / contester thread 1"`.
///
/// # Example
///
/// ```rust
/// use contester::{join, thread, DriverScope};
///
/// let _scope = DriverScope::new();
/// let worker = thread(|| {});
/// assert!(worker.name().contains(" / contester thread "));
/// assert!(!worker.is_started());
///
/// join(&worker)?;
/// # Ok::<(), contester::Error>(())
/// ```
pub fn thread<F>(body: F) -> ManagedThread
where
    F: FnOnce() + Send + 'static,
{
    let caller = std::thread::current();
    let caller_name = caller
        .name()
        .map_or_else(|| format!("{:?}", caller.id()), ToString::to_string);
    let owner = ThreadKey::current();

    let mut registry = registry().lock();
    let number = registry.context_or_create(owner).next_thread_id();
    let thread = ManagedThread::builder()
        .name(format!("{caller_name} / contester thread {number}"))
        .build(body);
    registry.attach(owner, &thread);
    thread
}

/// Registers `thread` with the calling thread's driver context.
///
/// Registration installs a panic recorder in front of the thread's own panic
/// handler; both run when the thread panics.
///
/// # Errors
///
/// [`Error::AlreadyRegistered`] if any context already manages the thread,
/// [`Error::SelfRegistration`] if `thread` is the calling thread.
pub fn register(thread: &ManagedThread) -> Result<()> {
    let owner = ThreadKey::current();
    let mut registry = registry().lock();
    if registry.owners.contains_key(&thread.key()) {
        return Err(Error::AlreadyRegistered {
            thread: thread.name().to_string(),
        });
    }
    if thread.key() == owner {
        return Err(Error::SelfRegistration);
    }
    registry.attach(owner, thread);
    Ok(())
}

/// Registers `thread` unless it is registered already, then starts it.
///
/// # Errors
///
/// Fails like [`register`] and [`ManagedThread::start`].
pub fn start(thread: &ManagedThread) -> Result<()> {
    if !is_registered(thread) {
        register(thread)?;
    }
    thread.start()
}

/// Releases every suspended thread of the calling thread's context and
/// forgets the context.
///
/// Safe to call any number of times, and a no-op on threads that never
/// registered anything. Call it after every test, or hold a
/// [`DriverScope`](crate::DriverScope).
pub fn cleanup() {
    let owner = ThreadKey::current();
    let mut registry = registry().lock();
    let Some(context) = registry.contexts.remove(&owner) else {
        return;
    };

    let mut tables = context.tables();
    tables.enabled.clear();
    for (key, state) in tables.threads.drain() {
        registry.owners.remove(&key);
        if let Some(id) = state.resume() {
            warn!(
                thread = state.name(),
                breakpoint = %id,
                "released suspended thread during cleanup"
            );
        }
    }
    debug!(driver = %context.owner, "cleaned up driver context");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_is_registered_but_not_started() {
        let worker = thread(|| {});
        assert!(is_registered(&worker));
        assert!(!worker.is_started());
        assert!(registered(&worker).is_ok());
        cleanup();
        assert!(!is_registered(&worker));
    }

    #[test]
    fn test_thread_numbers_increase() {
        let first = thread(|| {});
        let second = thread(|| {});
        let number = |t: &ManagedThread| -> usize {
            let name = t.name();
            let infix = " / contester thread ";
            name[name.find(infix).unwrap() + infix.len()..].parse().unwrap()
        };
        assert_eq!(number(&first) + 1, number(&second));
        cleanup();
    }

    #[test]
    fn test_register_twice_fails() {
        let worker = ManagedThread::new(|| {});
        register(&worker).unwrap();
        assert!(matches!(
            register(&worker),
            Err(Error::AlreadyRegistered { .. })
        ));
        cleanup();
    }

    #[test]
    fn test_registered_is_scoped_to_caller() {
        let worker = thread(|| {});
        let other = worker.clone();
        let seen_elsewhere = std::thread::spawn(move || registered(&other).is_ok())
            .join()
            .unwrap();
        assert!(!seen_elsewhere);
        assert!(registered_anywhere(&worker).is_ok());
        cleanup();
    }

    #[test]
    fn test_cleanup_without_context_is_noop() {
        cleanup();
        cleanup();
        assert!(caller_context().is_none());
    }

    #[test]
    fn test_owning_context_resolves_owner() {
        let worker = thread(|| {});
        let context = owning_context(worker.key()).unwrap();
        assert_eq!(context.owner, ThreadKey::current());
        cleanup();
        assert!(owning_context(worker.key()).is_none());
    }
}
