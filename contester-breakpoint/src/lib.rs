//! # contester-breakpoint
//!
//! Breakpoint definitions for production code.
//!
//! Mark the points where a race can happen:
//!
//! ```rust
//! use contester_breakpoint::define_breakpoint;
//!
//! fn reset(slot: &mut Option<String>) {
//!     define_breakpoint("before-reset");
//!     *slot = None;
//! }
//!
//! let mut slot = Some("value".to_string());
//! reset(&mut slot);
//! assert_eq!(slot, None);
//! ```
//!
//! Without the `driver` feature every call compiles to nothing and the crate
//! has no dependencies. Tests enable the feature through a dev-dependency, and
//! the breakpoints then suspend threads driven by `contester`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

/// Whether breakpoints are routed to the driver in this build.
pub const DRIVER_PRESENT: bool = cfg!(feature = "driver");

/// Defines breakpoint `id`.
///
/// Suspends the calling thread if a driver has enabled `id` for it.
#[inline]
pub fn define_breakpoint(id: &str) {
    #[cfg(feature = "driver")]
    contester::visit_breakpoint(id);
    #[cfg(not(feature = "driver"))]
    let _ = id;
}

/// Defines breakpoint `id`, suspending only if `predicate` returns true.
///
/// The predicate is evaluated only when `id` is enabled for the calling
/// thread, so it may be arbitrarily expensive.
///
/// ```rust
/// use contester_breakpoint::define_breakpoint_if;
///
/// let mut counter = 0;
/// for _ in 0..1000 {
///     counter += 1;
///     define_breakpoint_if("thousandth", || counter == 1000);
/// }
/// assert_eq!(counter, 1000);
/// ```
#[inline]
pub fn define_breakpoint_if<P>(id: &str, predicate: P)
where
    P: FnOnce() -> bool,
{
    #[cfg(feature = "driver")]
    contester::visit_breakpoint_if(id, predicate);
    #[cfg(not(feature = "driver"))]
    let _ = (id, predicate);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakpoints_pass_on_undriven_thread() {
        define_breakpoint("id");
        define_breakpoint_if("id", || panic!("predicate evaluated"));
    }

    #[test]
    fn test_driver_flag_matches_feature() {
        assert_eq!(DRIVER_PRESENT, cfg!(feature = "driver"));
    }

    #[cfg(feature = "driver")]
    #[test]
    fn test_breakpoint_suspends_driven_thread() {
        let _scope = contester::DriverScope::new();
        let worker = contester::thread(|| define_breakpoint("facade"));
        contester::run_to_breakpoint(&worker, "facade").unwrap();
        assert_eq!(contester::suspended_at(&worker).unwrap().as_deref(), Some("facade"));
        contester::join(&worker).unwrap();
    }
}
