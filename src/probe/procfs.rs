//! Linux scheduler-state probe.

use std::fs;
use std::io;

use tracing::trace;

use super::StateProbe;
use crate::thread::{ExecutionState, ManagedThread};

/// Probe that reads `/proc/self/task/<tid>/stat`.
///
/// States reported by the instrumented primitives take precedence; the kernel
/// is consulted only while the thread looks running to them.
///
/// The kernel does not tell a timed sleep from an indefinite wait. A thread in
/// `std::thread::sleep`, or in any other interruptible syscall, is reported as
/// [`ExecutionState::Waiting`], so a blocked-or-terminated wait ends as soon as
/// the thread sleeps, even if it would wake up and carry on by itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcfsProbe;

impl StateProbe for ProcfsProbe {
    fn query_state(&self, thread: &ManagedThread) -> ExecutionState {
        let reported = thread.execution_state();
        if reported != ExecutionState::Running {
            return reported;
        }
        let Some(tid) = thread.native_tid() else {
            return reported;
        };
        match read_task_state(tid) {
            Ok(state) => from_stat_state(state),
            Err(err) => {
                // The task directory vanishes between exit and our flag flip.
                trace!(tid, error = %err, "task stat unavailable");
                reported
            }
        }
    }
}

fn read_task_state(tid: i32) -> io::Result<char> {
    let stat = fs::read_to_string(format!("/proc/self/task/{tid}/stat"))?;
    parse_stat_state(&stat)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed stat line"))
}

/// Extracts the state field from a `stat` line.
///
/// The command name is parenthesized and may itself contain spaces and
/// parentheses, so the state is the first field after the last `)`.
fn parse_stat_state(stat: &str) -> Option<char> {
    let rest = &stat[stat.rfind(')')? + 1..];
    rest.trim_start().chars().next()
}

fn from_stat_state(state: char) -> ExecutionState {
    match state {
        'D' => ExecutionState::BlockedOnResource,
        'S' | 'T' | 't' => ExecutionState::Waiting,
        'Z' | 'X' | 'x' => ExecutionState::Terminated,
        _ => ExecutionState::Running,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    #[test]
    fn test_parse_stat_state() {
        assert_eq!(parse_stat_state("1234 (worker) S 1 2 3"), Some('S'));
        assert_eq!(parse_stat_state("1234 (a) b) (c) R 1 2"), Some('R'));
        assert_eq!(parse_stat_state("garbage"), None);
        assert_eq!(parse_stat_state("1 (x)"), None);
    }

    #[test]
    fn test_from_stat_state() {
        assert_eq!(from_stat_state('R'), ExecutionState::Running);
        assert_eq!(from_stat_state('D'), ExecutionState::BlockedOnResource);
        assert_eq!(from_stat_state('S'), ExecutionState::Waiting);
        assert_eq!(from_stat_state('Z'), ExecutionState::Terminated);
    }

    #[test]
    fn test_sees_thread_parked_in_channel() {
        let (tx, rx) = mpsc::channel::<()>();
        let thread = ManagedThread::new(move || {
            let _ = rx.recv();
        });
        thread.start().unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while ProcfsProbe.query_state(&thread) != ExecutionState::Waiting {
            assert!(Instant::now() < deadline, "thread never parked");
            std::thread::sleep(Duration::from_millis(1));
        }

        drop(tx);
        assert!(thread.join_timeout(Duration::from_secs(10)));
        assert_eq!(
            ProcfsProbe.query_state(&thread),
            ExecutionState::Terminated
        );
    }
}
