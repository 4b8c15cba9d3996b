//! Execution states of managed threads.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// What a managed thread is doing right now, as far as a probe can tell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionState {
    /// Created but not started.
    New,
    /// Executing (or parked somewhere the probe cannot see).
    Running,
    /// Blocked acquiring a resource held by another thread.
    BlockedOnResource,
    /// Waiting for a signal from another thread.
    Waiting,
    /// Finished, normally or by panicking.
    Terminated,
}

impl ExecutionState {
    /// Returns true for the states `wait_for_blocked_or_terminated` stops at.
    #[must_use]
    pub fn is_blocked_or_terminated(self) -> bool {
        matches!(
            self,
            Self::BlockedOnResource | Self::Waiting | Self::Terminated
        )
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionState::New => write!(f, "New"),
            ExecutionState::Running => write!(f, "Running"),
            ExecutionState::BlockedOnResource => write!(f, "BlockedOnResource"),
            ExecutionState::Waiting => write!(f, "Waiting"),
            ExecutionState::Terminated => write!(f, "Terminated"),
        }
    }
}

/// Activity reported by the instrumented primitives in [`crate::sync`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum Activity {
    Running = 0,
    Blocked = 1,
    Waiting = 2,
}

/// Lock-free cell holding an [`Activity`].
#[derive(Debug, Default)]
pub(crate) struct ActivityCell(AtomicU8);

impl ActivityCell {
    pub(crate) fn get(&self) -> Activity {
        match self.0.load(Ordering::SeqCst) {
            1 => Activity::Blocked,
            2 => Activity::Waiting,
            _ => Activity::Running,
        }
    }

    /// Stores `activity` and returns the previous value.
    pub(crate) fn replace(&self, activity: Activity) -> Activity {
        match self.0.swap(activity as u8, Ordering::SeqCst) {
            1 => Activity::Blocked,
            2 => Activity::Waiting,
            _ => Activity::Running,
        }
    }
}

impl From<Activity> for ExecutionState {
    fn from(activity: Activity) -> Self {
        match activity {
            Activity::Running => ExecutionState::Running,
            Activity::Blocked => ExecutionState::BlockedOnResource,
            Activity::Waiting => ExecutionState::Waiting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_state_display() {
        assert_eq!(ExecutionState::New.to_string(), "New");
        assert_eq!(ExecutionState::Running.to_string(), "Running");
        assert_eq!(
            ExecutionState::BlockedOnResource.to_string(),
            "BlockedOnResource"
        );
        assert_eq!(ExecutionState::Waiting.to_string(), "Waiting");
        assert_eq!(ExecutionState::Terminated.to_string(), "Terminated");
    }

    #[test]
    fn test_blocked_or_terminated() {
        assert!(!ExecutionState::New.is_blocked_or_terminated());
        assert!(!ExecutionState::Running.is_blocked_or_terminated());
        assert!(ExecutionState::BlockedOnResource.is_blocked_or_terminated());
        assert!(ExecutionState::Waiting.is_blocked_or_terminated());
        assert!(ExecutionState::Terminated.is_blocked_or_terminated());
    }

    #[test]
    fn test_activity_cell_replace() {
        let cell = ActivityCell::default();
        assert_eq!(cell.get(), Activity::Running);

        assert_eq!(cell.replace(Activity::Blocked), Activity::Running);
        assert_eq!(cell.get(), Activity::Blocked);
        assert_eq!(cell.replace(Activity::Waiting), Activity::Blocked);
        assert_eq!(ExecutionState::from(cell.get()), ExecutionState::Waiting);
    }
}
