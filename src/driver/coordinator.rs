//! Breakpoint enablement and the suspend/resume protocol.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::driver::config::current_config;
use crate::driver::context::{self, owning_context, registered};
use crate::driver::prober::wait_for_breakpoint_timeout;
use crate::error::{Error, Result};
use crate::thread::{ManagedThread, ThreadKey};

/// Enables breakpoint `id` so that `thread` suspends when it visits it.
///
/// # Errors
///
/// [`Error::NotRegistered`] if the calling thread does not manage `thread`,
/// [`Error::BreakpointAlreadyEnabled`] if the breakpoint is enabled already.
pub fn enable_breakpoint(thread: &ManagedThread, id: &str) -> Result<()> {
    let (context, _) = registered(thread)?;
    let inserted = context
        .tables()
        .enabled
        .entry(id.to_string())
        .or_default()
        .insert(thread.key());
    if !inserted {
        return Err(Error::BreakpointAlreadyEnabled { id: id.to_string() });
    }
    debug!(thread = %thread, breakpoint = id, "enabled breakpoint");
    Ok(())
}

/// Disables breakpoint `id` for `thread`.
///
/// # Errors
///
/// [`Error::NotRegistered`] if the calling thread does not manage `thread`,
/// [`Error::BreakpointAlreadyDisabled`] if the breakpoint is not enabled.
pub fn disable_breakpoint(thread: &ManagedThread, id: &str) -> Result<()> {
    let (context, _) = registered(thread)?;
    let mut tables = context.tables();
    let removed = match tables.enabled.get_mut(id) {
        Some(threads) => {
            let removed = threads.remove(&thread.key());
            if threads.is_empty() {
                tables.enabled.remove(id);
            }
            removed
        }
        None => false,
    };
    if !removed {
        return Err(Error::BreakpointAlreadyDisabled { id: id.to_string() });
    }
    debug!(thread = %thread, breakpoint = id, "disabled breakpoint");
    Ok(())
}

/// Returns the breakpoints enabled for `thread`, sorted.
///
/// # Errors
///
/// [`Error::NotRegistered`] if the calling thread does not manage `thread`.
pub fn enabled_breakpoints(thread: &ManagedThread) -> Result<Vec<String>> {
    let (context, _) = registered(thread)?;
    let key = thread.key();
    let mut ids: Vec<String> = context
        .tables()
        .enabled
        .iter()
        .filter(|(_, threads)| threads.contains(&key))
        .map(|(id, _)| id.clone())
        .collect();
    ids.sort();
    Ok(ids)
}

/// Visits breakpoint `id` from production code.
///
/// Suspends the calling thread if it is managed and `id` is enabled for it,
/// until the driver resumes it. Returns immediately otherwise.
pub fn visit_breakpoint(id: &str) {
    visit_breakpoint_if(id, || true);
}

/// Visits breakpoint `id`, suspending only if `predicate` returns true.
///
/// The predicate is evaluated only when the breakpoint is enabled for the
/// calling thread, while the driver context is locked; it must not call back
/// into the driver.
pub fn visit_breakpoint_if<P>(id: &str, predicate: P)
where
    P: FnOnce() -> bool,
{
    let key = ThreadKey::current();
    let Some(context) = owning_context(key) else {
        return;
    };

    let tables = context.tables();
    let Some(state) = tables.threads.get(&key).map(Arc::clone) else {
        return;
    };
    if !tables.is_enabled(id, key) || !predicate() {
        trace!(thread = state.name(), breakpoint = id, "passed breakpoint");
        return;
    }

    let suspension = state.suspend(id);
    drop(tables);
    debug!(thread = state.name(), breakpoint = id, "suspended");
    suspension.park();
    trace!(thread = state.name(), breakpoint = id, "resumed");
}

/// Resumes a thread suspended at a breakpoint.
///
/// # Errors
///
/// [`Error::NotRegistered`] if the calling thread does not manage `thread`,
/// [`Error::NotSuspended`] if the thread is not suspended.
pub fn resume(thread: &ManagedThread) -> Result<()> {
    let (_, state) = registered(thread)?;
    match state.resume() {
        Some(id) => {
            debug!(thread = %thread, breakpoint = %id, "resumed");
            Ok(())
        }
        None => Err(Error::NotSuspended {
            thread: thread.name().to_string(),
        }),
    }
}

/// Returns the breakpoint `thread` is suspended at, if any.
///
/// # Errors
///
/// [`Error::NotRegistered`] if the calling thread does not manage `thread`.
pub fn suspended_at(thread: &ManagedThread) -> Result<Option<String>> {
    let (_, state) = registered(thread)?;
    Ok(state.suspended_at())
}

/// Resumes `thread` if it is suspended. Returns true if it was.
pub(crate) fn resume_if_suspended(thread: &ManagedThread) -> Result<bool> {
    let (_, state) = registered(thread)?;
    Ok(state.resume().is_some())
}

/// Starts `thread` if it has not been started.
pub(crate) fn start_if_unstarted(thread: &ManagedThread) -> Result<()> {
    if thread.is_started() {
        Ok(())
    } else {
        context::start(thread)
    }
}

/// Runs `thread` until it suspends at breakpoint `id`, using the default
/// timeout.
///
/// See [`run_to_breakpoint_timeout`].
///
/// # Errors
///
/// As [`run_to_breakpoint_timeout`].
pub fn run_to_breakpoint(thread: &ManagedThread, id: &str) -> Result<()> {
    run_to_breakpoint_timeout(thread, id, current_config().default_timeout())
}

/// Runs `thread` until it suspends at breakpoint `id`.
///
/// Other breakpoints enabled for the thread are ignored while this runs and
/// are enabled again before it returns; `id` itself stays enabled. The thread
/// is registered and started if needed, and resumed if it is suspended.
///
/// # Errors
///
/// Usage errors as for [`enable_breakpoint`] and [`crate::start`]. Assertion
/// failures as for [`crate::wait_for_breakpoint_timeout`]: the breakpoint was
/// not hit in time, the thread suspended elsewhere, or it terminated.
///
/// # Example
///
/// ```rust
/// use contester::{join, run_to_breakpoint, thread, visit_breakpoint, DriverScope};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// let _scope = DriverScope::new();
/// let steps = Arc::new(AtomicU32::new(0));
/// let counter = Arc::clone(&steps);
/// let worker = thread(move || {
///     counter.fetch_add(1, Ordering::SeqCst);
///     visit_breakpoint("halfway");
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// run_to_breakpoint(&worker, "halfway")?;
/// assert_eq!(steps.load(Ordering::SeqCst), 1);
///
/// join(&worker)?;
/// assert_eq!(steps.load(Ordering::SeqCst), 2);
/// # Ok::<(), contester::Error>(())
/// ```
pub fn run_to_breakpoint_timeout(
    thread: &ManagedThread,
    id: &str,
    timeout: Duration,
) -> Result<()> {
    if !context::is_registered(thread) {
        context::register(thread)?;
    }

    let snapshot = enabled_breakpoints(thread)?;
    for enabled in &snapshot {
        disable_breakpoint(thread, enabled)?;
    }
    enable_breakpoint(thread, id)?;

    let outcome = advance_to(thread, id, timeout);
    let restored = snapshot
        .iter()
        .filter(|enabled| *enabled != id)
        .try_for_each(|enabled| enable_breakpoint(thread, enabled));
    outcome.and(restored)
}

fn advance_to(thread: &ManagedThread, id: &str, timeout: Duration) -> Result<()> {
    resume_if_suspended(thread)?;
    start_if_unstarted(thread)?;
    wait_for_breakpoint_timeout(thread, id, timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::cleanup;
    use crate::driver::context::thread;

    #[test]
    fn test_enable_disable_round_trip() {
        let worker = thread(|| {});
        enable_breakpoint(&worker, "a").unwrap();
        enable_breakpoint(&worker, "b").unwrap();
        assert_eq!(enabled_breakpoints(&worker).unwrap(), vec!["a", "b"]);

        disable_breakpoint(&worker, "a").unwrap();
        assert_eq!(enabled_breakpoints(&worker).unwrap(), vec!["b"]);
        cleanup();
    }

    #[test]
    fn test_double_enable_and_disable_fail() {
        let worker = thread(|| {});
        enable_breakpoint(&worker, "id").unwrap();
        assert!(matches!(
            enable_breakpoint(&worker, "id"),
            Err(Error::BreakpointAlreadyEnabled { .. })
        ));

        disable_breakpoint(&worker, "id").unwrap();
        assert!(matches!(
            disable_breakpoint(&worker, "id"),
            Err(Error::BreakpointAlreadyDisabled { .. })
        ));
        cleanup();
    }

    #[test]
    fn test_enable_requires_registration() {
        let stranger = ManagedThread::new(|| {});
        assert!(matches!(
            enable_breakpoint(&stranger, "id"),
            Err(Error::NotRegistered { .. })
        ));
    }

    #[test]
    fn test_resume_running_thread_fails() {
        let worker = thread(|| {});
        assert!(matches!(resume(&worker), Err(Error::NotSuspended { .. })));
        assert_eq!(suspended_at(&worker).unwrap(), None);
        cleanup();
    }

    #[test]
    fn test_visit_from_unmanaged_thread_returns() {
        visit_breakpoint("anything");
        visit_breakpoint_if("anything", || panic!("predicate must not run"));
    }

    #[test]
    fn test_disabled_breakpoint_does_not_evaluate_predicate() {
        let worker = thread(|| visit_breakpoint_if("id", || panic!("evaluated")));
        crate::driver::join(&worker).unwrap();
        cleanup();
    }
}
