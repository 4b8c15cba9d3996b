//! Bounded waits on managed threads.
//!
//! Every wait has two forms: one taking an explicit timeout and one using the
//! default timeout of the calling thread's [`DriverConfig`]. None of them wait
//! forever.
//!
//! [`DriverConfig`]: crate::DriverConfig

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::driver::config::current_config;
use crate::driver::context::{registered, registered_anywhere};
use crate::driver::coordinator::{resume_if_suspended, start_if_unstarted};
use crate::driver::thread_state::{Awaited, ThreadState};
use crate::error::{Error, PanicError, Result};
use crate::thread::{ExecutionState, ManagedThread};

/// Waits until `thread` suspends at breakpoint `id`, using the default timeout.
///
/// # Errors
///
/// As [`wait_for_breakpoint_timeout`].
pub fn wait_for_breakpoint(thread: &ManagedThread, id: &str) -> Result<()> {
    wait_for_breakpoint_timeout(thread, id, current_config().default_timeout())
}

/// Waits up to `timeout` until `thread` suspends at breakpoint `id`.
///
/// # Errors
///
/// Usage errors: [`Error::NotRegistered`], [`Error::NotStarted`], and
/// [`Error::BreakpointNotEnabled`] if `id` is not enabled for the thread.
///
/// Assertion failures: [`Error::BreakpointNotHit`] on timeout,
/// [`Error::UnexpectedBreakpoint`] if the thread suspended at another
/// breakpoint, [`Error::UncaughtPanic`] or [`Error::Terminated`] if the thread
/// finished first.
pub fn wait_for_breakpoint_timeout(
    thread: &ManagedThread,
    id: &str,
    timeout: Duration,
) -> Result<()> {
    let (context, state) = registered(thread)?;
    if !thread.is_started() {
        return Err(not_started(thread));
    }
    if !context.tables().is_enabled(id, thread.key()) {
        return Err(Error::BreakpointNotEnabled {
            id: id.to_string(),
            thread: thread.name().to_string(),
        });
    }

    let deadline = Instant::now().checked_add(timeout);
    let slice = context.config().poll_interval();
    match state.await_suspension(deadline, slice, || thread.is_terminated()) {
        Awaited::Suspended(actual) if actual == id => {
            debug!(thread = %thread, breakpoint = id, "reached breakpoint");
            Ok(())
        }
        Awaited::Suspended(actual) => Err(Error::UnexpectedBreakpoint {
            thread: thread.name().to_string(),
            expected: id.to_string(),
            actual,
        }),
        Awaited::Terminated => Err(match state.panic() {
            Some(cause) => Error::uncaught_panic(thread.name(), cause),
            None => Error::Terminated {
                thread: thread.name().to_string(),
            },
        }),
        Awaited::TimedOut => Err(Error::BreakpointNotHit {
            thread: thread.name().to_string(),
            id: id.to_string(),
            timeout,
        }),
    }
}

/// Waits until `thread` is blocked, waiting or terminated, using the default
/// timeout.
///
/// # Errors
///
/// As [`wait_for_blocked_or_terminated_timeout`].
pub fn wait_for_blocked_or_terminated(thread: &ManagedThread) -> Result<()> {
    wait_for_blocked_or_terminated_timeout(thread, current_config().default_timeout())
}

/// Waits up to `timeout` until `thread` is blocked on a resource, waiting for
/// a signal, or terminated.
///
/// The state is read through the [`StateProbe`](crate::probe::StateProbe) of
/// the calling thread's configuration.
///
/// # Errors
///
/// Usage errors: [`Error::NotRegistered`], [`Error::NotStarted`], and
/// [`Error::SuspendedAtBreakpoint`] if the thread sits at a breakpoint, since
/// it would never block or terminate on its own.
///
/// Assertion failures: [`Error::NotBlockedOrTerminated`] on timeout and
/// [`Error::UncaughtPanic`] if the thread terminated by panicking.
pub fn wait_for_blocked_or_terminated_timeout(
    thread: &ManagedThread,
    timeout: Duration,
) -> Result<()> {
    let (context, state) = registered(thread)?;
    if !thread.is_started() {
        return Err(not_started(thread));
    }

    let config = context.config();
    let deadline = Instant::now().checked_add(timeout);
    let observed = loop {
        ensure_not_suspended(thread, &state)?;

        let observed = config.probe().query_state(thread);
        trace!(thread = %thread, state = %observed, "probed");
        // A parked breakpoint wait looks like any other wait to the probe.
        if observed.is_blocked_or_terminated()
            && (observed == ExecutionState::Terminated || state.suspended_at().is_none())
        {
            break observed;
        }

        let mut slice = config.poll_interval();
        if let Some(deadline) = deadline {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::NotBlockedOrTerminated {
                    thread: thread.name().to_string(),
                    state: observed,
                    timeout,
                });
            }
            slice = slice.min(deadline - now);
        }
        state.pause(slice);
    };

    if observed == ExecutionState::Terminated {
        if let Some(cause) = state.panic() {
            return Err(Error::uncaught_panic(thread.name(), cause));
        }
    }
    debug!(thread = %thread, state = %observed, "blocked or terminated");
    Ok(())
}

/// Runs `thread` until it is blocked or terminated, using the default timeout.
///
/// # Errors
///
/// As [`run_until_blocked_or_terminated_timeout`].
pub fn run_until_blocked_or_terminated(thread: &ManagedThread) -> Result<()> {
    run_until_blocked_or_terminated_timeout(thread, current_config().default_timeout())
}

/// Starts `thread` if needed, resumes it if it is suspended, and waits up to
/// `timeout` until it is blocked or terminated.
///
/// Use this to make sure a thread is stuck entering a critical section held
/// by another thread, or is done.
///
/// # Errors
///
/// As [`crate::start`] and [`wait_for_blocked_or_terminated_timeout`].
pub fn run_until_blocked_or_terminated_timeout(
    thread: &ManagedThread,
    timeout: Duration,
) -> Result<()> {
    start_if_unstarted(thread)?;
    resume_if_suspended(thread)?;
    wait_for_blocked_or_terminated_timeout(thread, timeout)
}

/// Joins `thread`, using the default timeout.
///
/// # Errors
///
/// As [`join_timeout`].
pub fn join(thread: &ManagedThread) -> Result<()> {
    join_timeout(thread, current_config().default_timeout())
}

/// Lets `thread` run to completion and waits up to `timeout` for it.
///
/// Every breakpoint of the thread is disabled first and a suspended thread is
/// resumed. A registered thread that was never started is started.
///
/// # Errors
///
/// [`Error::NotRegistered`] if the calling thread does not manage `thread`.
/// Assertion failures: [`Error::StillAlive`] if the thread did not finish in
/// time, [`Error::UncaughtPanic`] if it panicked.
pub fn join_timeout(thread: &ManagedThread, timeout: Duration) -> Result<()> {
    let (context, state) = registered(thread)?;
    let key = thread.key();
    context.tables().enabled.retain(|_, threads| {
        threads.remove(&key);
        !threads.is_empty()
    });
    if let Some(id) = state.resume() {
        debug!(thread = %thread, breakpoint = %id, "resumed for join");
    }
    start_if_unstarted(thread)?;

    if !thread.join_timeout(timeout) {
        return Err(Error::StillAlive {
            thread: thread.name().to_string(),
            timeout,
        });
    }
    if let Some(cause) = state.panic() {
        return Err(Error::uncaught_panic(thread.name(), cause));
    }
    debug!(thread = %thread, "joined");
    Ok(())
}

/// Returns the panic that terminated `thread`, if it panicked.
///
/// Works for threads registered with any driver context.
///
/// # Errors
///
/// [`Error::NotRegistered`] if no context manages the thread,
/// [`Error::NotStarted`] if it was never started, and
/// [`Error::ThreadAlive`] if it is still running.
pub fn uncaught_panic(thread: &ManagedThread) -> Result<Option<Arc<PanicError>>> {
    let state = registered_anywhere(thread)?;
    if !thread.is_started() {
        return Err(not_started(thread));
    }
    if !thread.is_terminated() {
        return Err(Error::ThreadAlive {
            thread: thread.name().to_string(),
        });
    }
    Ok(state.panic())
}

fn ensure_not_suspended(thread: &ManagedThread, state: &ThreadState) -> Result<()> {
    match state.suspended_at() {
        Some(id) => Err(Error::SuspendedAtBreakpoint {
            thread: thread.name().to_string(),
            id,
        }),
        None => Ok(()),
    }
}

fn not_started(thread: &ManagedThread) -> Error {
    Error::NotStarted {
        thread: thread.name().to_string(),
    }
}
