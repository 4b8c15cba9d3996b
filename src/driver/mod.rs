//! The driver
//!
//! A test thread acts as the *driver* of the threads it creates or registers.
//! It enables breakpoints, runs threads until they suspend, block or finish,
//! and resumes them, forcing one particular interleaving of the code under
//! test. Production code marks its breakpoints with [`visit_breakpoint`]; on
//! threads nobody drives, that is a cheap no-op.
//!
//! Each driver thread has an isolated context, so tests running in parallel
//! do not see each other's threads or breakpoints. Contexts are released by
//! [`cleanup`] or by dropping a [`DriverScope`].
//!
//! # Example
//!
//! ```rust
//! use contester::{
//!     join, resume, run_to_breakpoint, suspended_at, thread, visit_breakpoint, DriverScope,
//! };
//!
//! let _scope = DriverScope::new();
//! let worker = thread(|| {
//!     visit_breakpoint("before-write");
//! });
//!
//! run_to_breakpoint(&worker, "before-write")?;
//! assert_eq!(suspended_at(&worker)?.as_deref(), Some("before-write"));
//!
//! resume(&worker)?;
//! join(&worker)?;
//! # Ok::<(), contester::Error>(())
//! ```

mod config;
mod context;
mod coordinator;
mod prober;
mod scope;
mod thread_state;

pub use config::{configure, DriverConfig, DEFAULT_POLL_INTERVAL, STANDARD_TIMEOUT};
pub use context::{cleanup, register, start, thread};
pub use coordinator::{
    disable_breakpoint, enable_breakpoint, enabled_breakpoints, resume, run_to_breakpoint,
    run_to_breakpoint_timeout, suspended_at, visit_breakpoint, visit_breakpoint_if,
};
pub use prober::{
    join, join_timeout, run_until_blocked_or_terminated, run_until_blocked_or_terminated_timeout,
    uncaught_panic, wait_for_blocked_or_terminated, wait_for_blocked_or_terminated_timeout,
    wait_for_breakpoint, wait_for_breakpoint_timeout,
};
pub use scope::DriverScope;
