//! Platform selector backends behind one seam.
//!
//! Both backends expose the same inherent API: arm one-shot read/write
//! filters and one-shot timers, then wait with a bounded timeout for
//! [`Token`]s. At most one read and one write registration exist per fd;
//! a fired registration is gone until it is armed again.

use crate::reactor::request::Interest;

use std::os::unix::io::RawFd;

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
mod kqueue;
#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
pub(crate) use self::kqueue::Selector;

#[cfg(any(target_os = "linux", target_os = "android"))]
mod epoll;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) use self::epoll::Selector;

/// One readiness event translated out of the kernel's native encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Token {
    Io { fd: RawFd, interest: Interest },
    Timer { id: u64 },
}
