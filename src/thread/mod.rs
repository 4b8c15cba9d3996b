//! Managed threads
//!
//! A [`ManagedThread`] is a handle to an OS thread whose body is held until it
//! is started, so a driver can register it and arm breakpoints first. Every
//! thread the driver sees, managed or not, is identified by a [`ThreadKey`].
//!
//! # Example
//!
//! ```rust
//! use contester::thread::{ExecutionState, ManagedThread};
//! use std::time::Duration;
//!
//! let thread = ManagedThread::builder().name("worker").build(|| {});
//! assert_eq!(thread.execution_state(), ExecutionState::New);
//!
//! thread.start().unwrap();
//! assert!(thread.join_timeout(Duration::from_secs(10)));
//! assert_eq!(thread.execution_state(), ExecutionState::Terminated);
//! ```

mod handle;
mod key;
mod state;

pub(crate) use handle::mark_current;
pub use handle::{ManagedThread, ManagedThreadBuilder, PanicHandler};
pub use key::ThreadKey;
pub(crate) use state::Activity;
pub use state::ExecutionState;
