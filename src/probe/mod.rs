//! Execution-state probes
//!
//! `wait_for_blocked_or_terminated` needs to know whether a thread is blocked
//! on a resource, waiting for a signal, or done. Rust has no portable way to
//! ask the OS, so the question is answered by a pluggable [`StateProbe`]:
//!
//! - [`InstrumentedProbe`] (the default) trusts the instrumented primitives in
//!   [`crate::sync`]. Code under test must use them for the driver to see it
//!   block.
//! - [`ProcfsProbe`] (Linux only) additionally reads the kernel's scheduler
//!   state from `/proc/self/task/<tid>/stat`, so it also sees threads parked
//!   in uninstrumented locks, channels or condition variables. The kernel does
//!   not tell a lock wait from a condition wait, so both report as
//!   [`ExecutionState::Waiting`].
//!
//! # Example
//!
//! ```rust
//! use contester::probe::{InstrumentedProbe, StateProbe};
//! use contester::thread::{ExecutionState, ManagedThread};
//!
//! let thread = ManagedThread::new(|| {});
//! assert_eq!(InstrumentedProbe.query_state(&thread), ExecutionState::New);
//! ```

#[cfg(target_os = "linux")]
mod procfs;

use std::fmt;

use crate::thread::{ExecutionState, ManagedThread};

#[cfg(target_os = "linux")]
pub use procfs::ProcfsProbe;

/// Answers what a managed thread is currently doing.
pub trait StateProbe: Send + Sync + fmt::Debug {
    /// Returns the current execution state of `thread`.
    fn query_state(&self, thread: &ManagedThread) -> ExecutionState;
}

/// Probe backed by the instrumented primitives in [`crate::sync`].
#[derive(Clone, Copy, Debug, Default)]
pub struct InstrumentedProbe;

impl StateProbe for InstrumentedProbe {
    fn query_state(&self, thread: &ManagedThread) -> ExecutionState {
        thread.execution_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_instrumented_probe_follows_lifecycle() {
        let (tx, rx) = mpsc::channel::<()>();
        let thread = ManagedThread::new(move || {
            let _ = rx.recv();
        });
        assert_eq!(InstrumentedProbe.query_state(&thread), ExecutionState::New);

        thread.start().unwrap();
        assert_eq!(
            InstrumentedProbe.query_state(&thread),
            ExecutionState::Running
        );

        drop(tx);
        assert!(thread.join_timeout(Duration::from_secs(10)));
        assert_eq!(
            InstrumentedProbe.query_state(&thread),
            ExecutionState::Terminated
        );
    }
}
