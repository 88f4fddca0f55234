//! Process-wide runtime configuration.
//!
//! All settings are plain atomics: they may be changed mid-flight and the
//! new value affects only subsequent operations. The usual entry point is
//! [`RuntimeBuilder`](crate::RuntimeBuilder), which installs its settings
//! at build time.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

/// How completed operations report failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Every reply carries `rc`/`errno` and the caller inspects them.
    ReturnCodes,
    /// A negative `rc` is delivered as a typed [`SysError`](crate::SysError).
    Errors,
}

/// What happens when a descriptor object is used off its creator thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MultithreadPolicy {
    Silent,
    Warn,
    Fatal,
}

static ERROR_POLICY: AtomicU8 = AtomicU8::new(0);
static MULTITHREAD_POLICY: AtomicU8 = AtomicU8::new(0);
static READ_CACHE_SIZE: AtomicUsize = AtomicUsize::new(0);
static LEGACY_SLEEP_UNITS: AtomicBool = AtomicBool::new(false);

pub fn error_policy() -> ErrorPolicy {
    match ERROR_POLICY.load(Ordering::Relaxed) {
        0 => ErrorPolicy::ReturnCodes,
        _ => ErrorPolicy::Errors,
    }
}

pub fn set_error_policy(policy: ErrorPolicy) {
    let raw = match policy {
        ErrorPolicy::ReturnCodes => 0,
        ErrorPolicy::Errors => 1,
    };
    ERROR_POLICY.store(raw, Ordering::Relaxed);
}

pub fn multithread_policy() -> MultithreadPolicy {
    match MULTITHREAD_POLICY.load(Ordering::Relaxed) {
        0 => MultithreadPolicy::Silent,
        1 => MultithreadPolicy::Warn,
        _ => MultithreadPolicy::Fatal,
    }
}

pub fn set_multithread_policy(policy: MultithreadPolicy) {
    let raw = match policy {
        MultithreadPolicy::Silent => 0,
        MultithreadPolicy::Warn => 1,
        MultithreadPolicy::Fatal => 2,
    };
    MULTITHREAD_POLICY.store(raw, Ordering::Relaxed);
}

/// Read-cache span size in bytes; 0 disables caching.
pub fn read_cache_size() -> usize {
    READ_CACHE_SIZE.load(Ordering::Relaxed)
}

pub fn set_read_cache_size(bytes: usize) {
    READ_CACHE_SIZE.store(bytes, Ordering::Relaxed);
}

/// When set, `sleep_units` reproduces the historical conversion that
/// treated the nanosecond argument as microseconds.
pub fn legacy_sleep_units() -> bool {
    LEGACY_SLEEP_UNITS.load(Ordering::Relaxed)
}

pub fn set_legacy_sleep_units(enabled: bool) {
    LEGACY_SLEEP_UNITS.store(enabled, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    // The policies are process-wide, so these only touch settings no other
    // unit test reads concurrently.
    #[test]
    fn settings_roundtrip() {
        set_read_cache_size(4096);
        assert_eq!(read_cache_size(), 4096);
        set_read_cache_size(0);

        set_legacy_sleep_units(true);
        assert!(legacy_sleep_units());
        set_legacy_sleep_units(false);
    }
}
