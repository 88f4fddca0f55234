//! Fluent builder for runtime construction.

use crate::config::{self, ErrorPolicy, MultithreadPolicy};
use crate::runtime::Runtime;

/// Builds a [`Runtime`] and installs the process-wide settings that go
/// with it.
///
/// # Example
/// ```ignore
/// let rt = RuntimeBuilder::new()
///     .error_policy(ErrorPolicy::Errors)
///     .build();
/// ```
pub struct RuntimeBuilder {
    error_policy: ErrorPolicy,
    multithread_policy: MultithreadPolicy,
    read_cache_size: usize,
    legacy_sleep_units: bool,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            error_policy: ErrorPolicy::ReturnCodes,
            multithread_policy: MultithreadPolicy::Silent,
            read_cache_size: 0,
            legacy_sleep_units: false,
        }
    }

    /// Deliver failures as typed errors instead of `rc`/`errno` replies.
    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// React to descriptor objects used off their creator thread.
    pub fn multithread_policy(mut self, policy: MultithreadPolicy) -> Self {
        self.multithread_policy = policy;
        self
    }

    /// Span size for [`ReadCache`](crate::fs::ReadCache); 0 disables.
    pub fn read_cache_size(mut self, bytes: usize) -> Self {
        self.read_cache_size = bytes;
        self
    }

    /// Reproduce the historical nanosecond conversion of `sleep_units`.
    pub fn legacy_sleep_units(mut self, enabled: bool) -> Self {
        self.legacy_sleep_units = enabled;
        self
    }

    /// Install the settings process-wide and build the runtime.
    pub fn build(self) -> Runtime {
        config::set_error_policy(self.error_policy);
        config::set_multithread_policy(self.multithread_policy);
        config::set_read_cache_size(self.read_cache_size);
        config::set_legacy_sleep_units(self.legacy_sleep_units);

        Runtime::new()
    }
}
