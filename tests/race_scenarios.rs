//! Reproduces two classic races deterministically.
//!
//! Each scenario has a broken implementation, which the driven interleaving
//! must expose as an assertion failure, and a fixed one, which must pass the
//! same interleaving.

use std::collections::VecDeque;
use std::sync::Arc;

use contester::sync::{Mutex, Semaphore};
use contester::{
    join, resume, run_to_breakpoint, run_until_blocked_or_terminated, thread, DriverScope, Result,
};
use contester_breakpoint::define_breakpoint;

/// One method clears a field while another dereferences it.
trait Modification: Send + Sync + 'static {
    fn reset(&self);
    fn print(&self);
}

struct BrokenModification {
    member: Mutex<Option<String>>,
}

impl Modification for BrokenModification {
    fn reset(&self) {
        define_breakpoint("reset");
        *self.member.lock() = None;
    }

    fn print(&self) {
        // Checked and used under separate locks, so it can vanish in between.
        if self.member.lock().is_some() {
            define_breakpoint("print");
            let member = self.member.lock().clone().expect("member vanished");
            println!("{member}");
        }
    }
}

struct FixedModification {
    member: Mutex<Option<String>>,
}

impl Modification for FixedModification {
    fn reset(&self) {
        define_breakpoint("reset");
        *self.member.lock() = None;
    }

    fn print(&self) {
        let member = self.member.lock();
        if let Some(member) = member.as_ref() {
            define_breakpoint("print");
            println!("{member}");
        }
    }
}

fn member() -> Mutex<Option<String>> {
    Mutex::new(Some("member".to_string()))
}

fn run_modification<M: Modification>(obj: M) -> Result<()> {
    let obj = Arc::new(obj);
    let resetter_obj = Arc::clone(&obj);
    let resetter = thread(move || resetter_obj.reset());
    let printer_obj = Arc::clone(&obj);
    let printer = thread(move || printer_obj.print());

    run_to_breakpoint(&resetter, "reset")?;
    run_to_breakpoint(&printer, "print")?;
    // Broken: the resetter runs reset() in full.
    run_until_blocked_or_terminated(&resetter)?;
    // Broken: the printer finds the member gone.
    run_until_blocked_or_terminated(&printer)?;

    join(&resetter)?;
    join(&printer)
}

#[test]
fn test_modification_broken() {
    let _scope = DriverScope::new();
    let err = run_modification(BrokenModification { member: member() }).unwrap_err();
    assert!(err.is_assertion());
    assert_eq!(err.panic().map(|cause| cause.message()), Some("member vanished"));
}

#[test]
fn test_modification_fixed() {
    let _scope = DriverScope::new();
    run_modification(FixedModification { member: member() }).unwrap();
}

/// A consumer may outrun the producer and take from an empty buffer.
trait Underflow: Send + Sync + 'static {
    fn produce(&self);
    fn consume(&self);
}

#[derive(Default)]
struct BrokenUnderflow {
    buffer: Mutex<VecDeque<u32>>,
}

impl Underflow for BrokenUnderflow {
    fn produce(&self) {
        define_breakpoint("produce");
        self.buffer.lock().push_back(1);
    }

    fn consume(&self) {
        let _item = self.buffer.lock().pop_front().expect("buffer underflow");
    }
}

struct FixedUnderflow {
    buffer: Mutex<VecDeque<u32>>,
    available: Semaphore,
}

impl Default for FixedUnderflow {
    fn default() -> Self {
        Self {
            buffer: Mutex::default(),
            available: Semaphore::new(0),
        }
    }
}

impl Underflow for FixedUnderflow {
    fn produce(&self) {
        define_breakpoint("produce");
        self.buffer.lock().push_back(1);
        self.available.release();
    }

    fn consume(&self) {
        self.available.acquire();
        let _item = self.buffer.lock().pop_front().expect("buffer underflow");
    }
}

fn run_underflow<U: Underflow>(obj: U) -> Result<()> {
    let obj = Arc::new(obj);
    let producer_obj = Arc::clone(&obj);
    let producer = thread(move || producer_obj.produce());

    run_to_breakpoint(&producer, "produce")?;

    let consumer_obj = Arc::clone(&obj);
    let consumer = thread(move || consumer_obj.consume());
    run_until_blocked_or_terminated(&consumer)?;
    resume(&producer)?;

    join(&consumer)?;
    join(&producer)
}

#[test]
fn test_underflow_broken() {
    let _scope = DriverScope::new();
    let err = run_underflow(BrokenUnderflow::default()).unwrap_err();
    assert!(err.is_assertion());
    assert_eq!(err.panic().map(|cause| cause.message()), Some("buffer underflow"));
}

#[test]
fn test_underflow_fixed() {
    let _scope = DriverScope::new();
    run_underflow(FixedUnderflow::default()).unwrap();
}
