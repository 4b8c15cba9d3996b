//! Driver configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::driver::context;
use crate::probe::{InstrumentedProbe, StateProbe};

/// Standard timeout for the blocking driver operations.
pub const STANDARD_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default interval at which the bounded waits re-check their condition.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

const MIN_POLL_INTERVAL: Duration = Duration::from_micros(50);

/// Settings read by the waits issued from one driver thread.
///
/// # Example
///
/// ```rust
/// use contester::{configure, DriverConfig, DriverScope};
/// use std::time::Duration;
///
/// let _scope = DriverScope::new();
/// configure(DriverConfig::new().with_default_timeout(Duration::from_secs(2)));
/// ```
#[derive(Clone, Debug)]
pub struct DriverConfig {
    default_timeout: Duration,
    poll_interval: Duration,
    probe: Arc<dyn StateProbe>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverConfig {
    /// Creates the standard configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_timeout: STANDARD_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            probe: Arc::new(InstrumentedProbe),
        }
    }

    /// Sets the timeout used by operations called without an explicit one.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Sets how often the bounded waits re-check their condition.
    ///
    /// Values below 50µs are raised to 50µs.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Sets the probe used by the blocked-or-terminated waits.
    #[must_use]
    pub fn with_probe<P>(mut self, probe: P) -> Self
    where
        P: StateProbe + 'static,
    {
        self.probe = Arc::new(probe);
        self
    }

    /// Returns the default timeout.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Returns the poll interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Returns the state probe.
    #[must_use]
    pub fn probe(&self) -> &Arc<dyn StateProbe> {
        &self.probe
    }
}

/// Applies `config` to the calling thread's driver context, creating the
/// context if needed.
///
/// The configuration lives until [`cleanup`](crate::cleanup).
pub fn configure(config: DriverConfig) {
    context::caller_context_or_create().set_config(config);
}

/// Returns the configuration of the calling thread's context.
pub(crate) fn current_config() -> DriverConfig {
    context::caller_context()
        .map(|context| context.config())
        .unwrap_or_default()
}
