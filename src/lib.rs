//! # contester 🧵
//!
//! > Breakpoint-driven testing of race conditions between threads
//!
//! **contester** lets a test force a specific interleaving of threads. Code
//! under test marks interesting points with named breakpoints; the test, acting
//! as the *driver*, runs each thread up to a breakpoint, until it blocks, or to
//! completion, and so reproduces a race deterministically instead of hoping
//! the scheduler finds it.
//!
//! ## Quick Start
//!
//! ```rust
//! use contester::prelude::*;
//! use std::sync::Arc;
//!
//! let _scope = DriverScope::new();
//! let value = Arc::new(contester::sync::Mutex::new(0));
//!
//! let writer_value = Arc::clone(&value);
//! let writer = thread(move || {
//!     let read = *writer_value.lock();
//!     visit_breakpoint("read");
//!     *writer_value.lock() = read + 1;
//! });
//!
//! let other_value = Arc::clone(&value);
//! let other = thread(move || *other_value.lock() += 1);
//!
//! // Interleave: writer reads, other increments, writer writes back.
//! run_to_breakpoint(&writer, "read")?;
//! join(&other)?;
//! join(&writer)?;
//!
//! // The lost update is reproduced every time.
//! assert_eq!(*value.lock(), 1);
//! # Ok::<(), contester::Error>(())
//! ```
//!
//! ## Features
//!
//! - 🎯 **Breakpoints** - Suspend threads at named points in production code
//! - 🎮 **Driver** - Run, resume and join threads in any order you choose
//! - 🔒 **Blocked detection** - Wait until a thread is stuck on a lock
//! - 💥 **Panic capture** - Panics in workers become test failures
//! - 🧹 **Isolated contexts** - Tests drive their own threads in parallel
//!
//! Production crates depend on the lightweight `contester-breakpoint` facade
//! instead of this crate, so breakpoints compile away unless a test enables
//! its `driver` feature.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Breakpoints and the driver operations
pub mod driver;

pub mod error;
pub mod probe;
pub mod sync;
pub mod thread;

/// Prelude for convenient imports
///
/// ```rust
/// use contester::prelude::*;
/// ```
pub mod prelude {
    pub use crate::driver::*;
    pub use crate::error::{Error, ErrorKind, PanicError, Result};
    pub use crate::thread::{ExecutionState, ManagedThread};
}

// Re-exports
pub use driver::*;
pub use error::{Error, ErrorKind, PanicError, Result};
pub use thread::{ExecutionState, ManagedThread, ManagedThreadBuilder};
