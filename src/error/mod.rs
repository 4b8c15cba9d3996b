//! Error definitions
//!
//! Every driver operation returns [`Result`]. Errors fall into two classes,
//! reported by [`Error::kind`]:
//!
//! - **Usage errors** are mistakes in the test itself (registering a thread
//!   twice, enabling a breakpoint that is already enabled, waiting on a thread
//!   that was never started). Retrying never helps.
//! - **Assertion failures** mean the threads under test did not behave as the
//!   test expected (a breakpoint was not hit in time, a worker panicked, a
//!   thread is still alive after `join`).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Main error type for contester
#[derive(Error, Debug)]
pub enum Error {
    /// The thread is already managed by a driver context.
    #[error("Thread '{thread}' has already been registered")]
    AlreadyRegistered {
        /// Name of the thread.
        thread: String,
    },

    /// A thread tried to register its own handle.
    #[error("A thread cannot self-register")]
    SelfRegistration,

    /// The thread is not managed by the calling thread's driver context.
    #[error("The thread '{thread}' is not registered")]
    NotRegistered {
        /// Name of the thread.
        thread: String,
    },

    /// `start` was called on a thread that already runs or ran.
    #[error("Thread '{thread}' has already been started")]
    AlreadyStarted {
        /// Name of the thread.
        thread: String,
    },

    /// The operating system refused to spawn the thread.
    #[error("Failed to spawn thread '{thread}': {source}")]
    Spawn {
        /// Name of the thread.
        thread: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The breakpoint is already enabled for the thread.
    #[error("Breakpoint '{id}' is already enabled")]
    BreakpointAlreadyEnabled {
        /// Breakpoint ID.
        id: String,
    },

    /// The breakpoint is already disabled for the thread.
    #[error("Breakpoint '{id}' is already disabled")]
    BreakpointAlreadyDisabled {
        /// Breakpoint ID.
        id: String,
    },

    /// Waiting for a breakpoint that is not enabled for the thread.
    #[error("Breakpoint '{id}' is not enabled for {thread}")]
    BreakpointNotEnabled {
        /// Breakpoint ID.
        id: String,
        /// Name of the thread.
        thread: String,
    },

    /// Waiting on, or querying, a thread that has not been started.
    #[error("Cannot wait for unstarted thread")]
    NotStarted {
        /// Name of the thread.
        thread: String,
    },

    /// `resume` was called on a thread that is not suspended.
    #[error("Thread '{thread}' is not suspended")]
    NotSuspended {
        /// Name of the thread.
        thread: String,
    },

    /// Querying the panic of a thread that is still running.
    #[error("Thread '{thread}' is alive, must be terminated")]
    ThreadAlive {
        /// Name of the thread.
        thread: String,
    },

    /// Blocked detection was requested while the thread sits at a breakpoint.
    #[error("Cannot wait while '{thread}' is suspended at breakpoint '{id}'")]
    SuspendedAtBreakpoint {
        /// Name of the thread.
        thread: String,
        /// Breakpoint the thread is suspended at.
        id: String,
    },

    /// The thread did not reach the breakpoint in time.
    #[error("Breakpoint '{id}' wasn't hit by '{thread}' within {timeout:?}")]
    BreakpointNotHit {
        /// Name of the thread.
        thread: String,
        /// Expected breakpoint ID.
        id: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// The thread suspended, but not where the test expected.
    #[error("Thread '{thread}' suspended on unexpected breakpoint '{actual}' (expected '{expected}')")]
    UnexpectedBreakpoint {
        /// Name of the thread.
        thread: String,
        /// Breakpoint the test waited for.
        expected: String,
        /// Breakpoint the thread suspended at.
        actual: String,
    },

    /// The thread finished before the awaited condition.
    #[error("Thread '{thread}' has terminated")]
    Terminated {
        /// Name of the thread.
        thread: String,
    },

    /// The thread panicked.
    #[error("Thread '{thread}' threw an uncaught panic")]
    UncaughtPanic {
        /// Name of the thread.
        thread: String,
        /// The captured panic.
        #[source]
        cause: Arc<PanicError>,
    },

    /// The thread did not terminate within the join timeout.
    #[error("Thread '{thread}' is still alive after {timeout:?}")]
    StillAlive {
        /// Name of the thread.
        thread: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// The thread neither blocked nor terminated in time.
    #[error("Thread state ({state}) of '{thread}' is not blocked nor waiting nor terminated after {timeout:?}")]
    NotBlockedOrTerminated {
        /// Name of the thread.
        thread: String,
        /// Last observed execution state.
        state: crate::thread::ExecutionState,
        /// Timeout that elapsed.
        timeout: Duration,
    },
}

/// Which class an [`Error`] belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The test used the driver incorrectly.
    Usage,
    /// The threads under test did not behave as expected.
    Assertion,
}

impl Error {
    /// Returns the class of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BreakpointNotHit { .. }
            | Self::UnexpectedBreakpoint { .. }
            | Self::Terminated { .. }
            | Self::UncaughtPanic { .. }
            | Self::StillAlive { .. }
            | Self::NotBlockedOrTerminated { .. } => ErrorKind::Assertion,
            _ => ErrorKind::Usage,
        }
    }

    /// Returns true for usage errors.
    #[must_use]
    pub fn is_usage(&self) -> bool {
        self.kind() == ErrorKind::Usage
    }

    /// Returns true for assertion failures.
    #[must_use]
    pub fn is_assertion(&self) -> bool {
        self.kind() == ErrorKind::Assertion
    }

    /// Returns the captured panic if this error wraps one.
    #[must_use]
    pub fn panic(&self) -> Option<&Arc<PanicError>> {
        match self {
            Self::UncaughtPanic { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// Create an uncaught panic failure.
    #[must_use]
    pub fn uncaught_panic(thread: impl Into<String>, cause: Arc<PanicError>) -> Self {
        Self::UncaughtPanic {
            thread: thread.into(),
            cause,
        }
    }
}

/// A panic that escaped the body of a managed thread.
///
/// The payload is reduced to its message; `&str` and `String` payloads are
/// kept verbatim, anything else is reported as opaque.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PanicError {
    thread: String,
    message: String,
}

impl PanicError {
    /// Creates a panic error from an unwinding payload.
    pub(crate) fn from_payload(
        thread: impl Into<String>,
        payload: &(dyn std::any::Any + Send),
    ) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_string()
        };
        Self {
            thread: thread.into(),
            message,
        }
    }

    /// Name of the thread that panicked.
    #[must_use]
    pub fn thread(&self) -> &str {
        &self.thread
    }

    /// The panic message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread '{}' panicked: {}", self.thread, self.message)
    }
}

impl std::error::Error for PanicError {}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_errors_are_classified() {
        let err = Error::BreakpointAlreadyEnabled { id: "id".into() };
        assert!(err.is_usage());
        assert!(!err.is_assertion());
        assert_eq!(err.to_string(), "Breakpoint 'id' is already enabled");
    }

    #[test]
    fn test_not_started_message() {
        let err = Error::NotStarted {
            thread: "worker".into(),
        };
        assert_eq!(err.to_string(), "Cannot wait for unstarted thread");
    }

    #[test]
    fn test_assertion_errors_are_classified() {
        let err = Error::BreakpointNotHit {
            thread: "worker".into(),
            id: "id".into(),
            timeout: Duration::from_millis(5),
        };
        assert_eq!(err.kind(), ErrorKind::Assertion);
        assert!(err.to_string().contains("wasn't hit"));
    }

    #[test]
    fn test_panic_error_from_payloads() {
        let from_str = PanicError::from_payload("t", &"boom");
        assert_eq!(from_str.message(), "boom");

        let from_string = PanicError::from_payload("t", &String::from("bang"));
        assert_eq!(from_string.message(), "bang");

        let opaque = PanicError::from_payload("t", &42_u32);
        assert_eq!(opaque.message(), "Box<dyn Any>");
        assert_eq!(opaque.thread(), "t");
    }

    #[test]
    fn test_uncaught_panic_exposes_source() {
        use std::error::Error as _;

        let cause = Arc::new(PanicError::from_payload("worker", &"boom"));
        let err = Error::uncaught_panic("worker", Arc::clone(&cause));
        assert!(err.is_assertion());
        assert!(err.to_string().contains("threw an uncaught panic"));
        assert_eq!(err.panic(), Some(&cause));
        assert_eq!(err.source().map(ToString::to_string), Some(cause.to_string()));
    }
}
