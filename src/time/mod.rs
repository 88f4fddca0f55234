//! Timers over the request protocol.
//!
//! A sleep is a TIMER request armed with the poller; the task suspends
//! until the one-shot timer completes the request with `(0, 0)`.

use crate::config;
use crate::reactor::request::{NO_FD, OpKind};
use crate::reactor::submit;

use std::time::Duration;

/// Suspend the current task for at least `duration`.
///
/// Zero-duration sleeps complete immediately without a request.
pub async fn sleep(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    let _ = submit(NO_FD, OpKind::Timer { duration }, None).await;
}

/// Sleep expressed in split units, with millisecond resolution.
///
/// The nanosecond argument contributes `nanos / 1_000_000` milliseconds.
/// With the legacy-units setting it contributes `nanos / 1000` instead,
/// reproducing a historical conversion some consumers depend on.
pub async fn sleep_units(secs: u64, millis: u64, nanos: u64) {
    let nano_part = if config::legacy_sleep_units() {
        nanos / 1_000
    } else {
        nanos / 1_000_000
    };
    let total = secs * 1_000 + millis + nano_part;
    sleep(Duration::from_millis(total)).await
}
