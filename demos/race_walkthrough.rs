//! Example: Reproducing races with breakpoints
//!
//! This example walks through forcing interleavings of real threads: a lost
//! update on a shared counter, and a consumer that must wait for its producer.
//!
//! Run with `RUST_LOG=contester=debug` to watch the driver at work.

use std::sync::Arc;

use contester::prelude::*;
use contester::sync::{Mutex, Semaphore};
use contester_breakpoint::define_breakpoint;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    let _ = fmt().with_env_filter(EnvFilter::from_default_env()).try_init();

    println!("🧵 contester - Reproducing races with breakpoints\n");

    example_lost_update()?;
    example_fixed_update()?;
    example_blocked_consumer()?;
    example_panicking_worker()?;

    println!("\n✅ All walkthrough examples completed!");
    Ok(())
}

/// Read-modify-write without holding the lock in between
fn example_lost_update() -> Result<()> {
    println!("📌 Example 1: Lost update");
    println!("   Two increments, but one of them reads a stale value\n");

    let _scope = DriverScope::new();
    let counter = Arc::new(Mutex::new(0));

    let slow_counter = Arc::clone(&counter);
    let slow = thread(move || {
        let read = *slow_counter.lock();
        define_breakpoint("after-read");
        *slow_counter.lock() = read + 1;
    });
    let fast_counter = Arc::clone(&counter);
    let fast = thread(move || *fast_counter.lock() += 1);

    println!("   Running slow increment up to 'after-read'...");
    run_to_breakpoint(&slow, "after-read")?;
    println!("   Running fast increment to completion...");
    join(&fast)?;
    println!("   Counter after fast increment: {}", *counter.lock());
    println!("   Letting slow increment write back...");
    join(&slow)?;

    println!("   Counter: {} (two increments ran)", *counter.lock());
    assert_eq!(*counter.lock(), 1, "The update must be lost every time");
    println!();
    Ok(())
}

/// Same interleaving, with the lock held across read and write
fn example_fixed_update() -> Result<()> {
    println!("📌 Example 2: Fixed update");
    println!("   The fast increment now blocks until the slow one is done\n");

    let _scope = DriverScope::new();
    let counter = Arc::new(Mutex::new(0));

    let slow_counter = Arc::clone(&counter);
    let slow = thread(move || {
        let mut value = slow_counter.lock();
        define_breakpoint("after-read");
        *value += 1;
    });
    let fast_counter = Arc::clone(&counter);
    let fast = thread(move || *fast_counter.lock() += 1);

    run_to_breakpoint(&slow, "after-read")?;
    println!("   Running fast increment until it blocks...");
    run_until_blocked_or_terminated(&fast)?;
    println!("   Fast increment state: {}", fast.execution_state());

    join(&slow)?;
    join(&fast)?;
    println!("   Counter: {}", *counter.lock());
    assert_eq!(*counter.lock(), 2);
    println!();
    Ok(())
}

/// A consumer waiting on a semaphore for its producer
fn example_blocked_consumer() -> Result<()> {
    println!("📌 Example 3: Consumer waits for producer");

    let _scope = DriverScope::new();
    let available = Arc::new(Semaphore::new(0));

    let producer_permits = Arc::clone(&available);
    let producer = thread(move || {
        define_breakpoint("produce");
        producer_permits.release();
    });
    let consumer_permits = Arc::clone(&available);
    let consumer = thread(move || consumer_permits.acquire());

    run_to_breakpoint(&producer, "produce")?;
    run_until_blocked_or_terminated(&consumer)?;
    println!("   Consumer state: {}", consumer.execution_state());

    resume(&producer)?;
    join(&consumer)?;
    join(&producer)?;
    println!("   Consumer finished after the producer released a permit");
    println!();
    Ok(())
}

/// A panic in a worker surfaces as an assertion failure
fn example_panicking_worker() -> Result<()> {
    println!("📌 Example 4: Panicking worker");

    let _scope = DriverScope::new();
    let worker = thread(|| panic!("worker gave up"));

    match join(&worker) {
        Err(err) if err.is_assertion() => {
            println!("   Assertion failure: {err}");
            if let Some(cause) = err.panic() {
                println!("   Caused by: {cause}");
            }
        }
        other => other?,
    }
    Ok(())
}
