//! Error taxonomy and the configurable delivery policy.
//!
//! Kernel errnos are surfaced verbatim in the `rc`/`errno` slots of every
//! reply. Under [`ErrorPolicy::Errors`](crate::config::ErrorPolicy) a
//! negative `rc` is instead converted into a [`SysError`] whose kind
//! derives from the errno and whose payload names the attempted operation.

use crate::config::{self, ErrorPolicy};

use std::fmt;
use thiserror::Error;

/// Typed wrapper over the common errno set.
///
/// Everything outside the common set is preserved in [`Errno::Other`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Errno {
    BadDescriptor,
    InvalidArgument,
    WouldBlock,
    Interrupted,
    Io,
    TimedOut,
    ConnectionReset,
    BrokenPipe,
    AddrInUse,
    NotFound,
    PermissionDenied,
    Other(i32),
}

impl Errno {
    pub fn from_raw(errno: i32) -> Self {
        match errno {
            libc::EBADF => Errno::BadDescriptor,
            libc::EINVAL => Errno::InvalidArgument,
            libc::EAGAIN => Errno::WouldBlock,
            libc::EINTR => Errno::Interrupted,
            libc::EIO => Errno::Io,
            libc::ETIMEDOUT => Errno::TimedOut,
            libc::ECONNRESET => Errno::ConnectionReset,
            libc::EPIPE => Errno::BrokenPipe,
            libc::EADDRINUSE => Errno::AddrInUse,
            libc::ENOENT => Errno::NotFound,
            libc::EACCES => Errno::PermissionDenied,
            other => Errno::Other(other),
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            Errno::BadDescriptor => libc::EBADF,
            Errno::InvalidArgument => libc::EINVAL,
            Errno::WouldBlock => libc::EAGAIN,
            Errno::Interrupted => libc::EINTR,
            Errno::Io => libc::EIO,
            Errno::TimedOut => libc::ETIMEDOUT,
            Errno::ConnectionReset => libc::ECONNRESET,
            Errno::BrokenPipe => libc::EPIPE,
            Errno::AddrInUse => libc::EADDRINUSE,
            Errno::NotFound => libc::ENOENT,
            Errno::PermissionDenied => libc::EACCES,
            Errno::Other(raw) => raw,
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Errno::BadDescriptor => "bad file descriptor",
            Errno::InvalidArgument => "invalid argument",
            Errno::WouldBlock => "resource temporarily unavailable",
            Errno::Interrupted => "interrupted system call",
            Errno::Io => "input/output error",
            Errno::TimedOut => "operation timed out",
            Errno::ConnectionReset => "connection reset by peer",
            Errno::BrokenPipe => "broken pipe",
            Errno::AddrInUse => "address already in use",
            Errno::NotFound => "no such file or directory",
            Errno::PermissionDenied => "permission denied",
            Errno::Other(raw) => return write!(f, "errno {raw}"),
        };
        f.write_str(text)
    }
}

/// A failed operation, delivered when the error policy is
/// [`ErrorPolicy::Errors`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{op}: {kind} (errno {errno})")]
pub struct SysError {
    /// The operation that failed, e.g. `"File::read"`.
    pub op: &'static str,
    /// Raw errno as reported by the kernel or the state machine.
    pub errno: i32,
    /// Typed classification of `errno`.
    pub kind: Errno,
}

impl SysError {
    pub(crate) fn new(op: &'static str, errno: i32) -> Self {
        Self {
            op,
            errno,
            kind: Errno::from_raw(errno),
        }
    }
}

/// Apply the process-wide error policy to a completed `(rc, errno)` pair.
///
/// In return-codes mode this is the identity; in errors mode a negative
/// `rc` becomes an `Err` carrying the operation name.
pub(crate) fn deliver(op: &'static str, rc: isize, errno: i32) -> Result<(), SysError> {
    if rc < 0 && config::error_policy() == ErrorPolicy::Errors {
        return Err(SysError::new(op, errno));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_set_roundtrips() {
        for raw in [
            libc::EBADF,
            libc::EINVAL,
            libc::EAGAIN,
            libc::EINTR,
            libc::EIO,
            libc::ETIMEDOUT,
            libc::ECONNRESET,
            libc::EPIPE,
            libc::EADDRINUSE,
            libc::ENOENT,
            libc::EACCES,
        ] {
            assert_eq!(Errno::from_raw(raw).as_raw(), raw);
        }
    }

    #[test]
    fn uncommon_errno_is_preserved() {
        let kind = Errno::from_raw(libc::EMSGSIZE);
        assert_eq!(kind, Errno::Other(libc::EMSGSIZE));
        assert_eq!(kind.as_raw(), libc::EMSGSIZE);
    }

    #[test]
    fn error_names_the_operation() {
        let err = SysError::new("Socket::bind", libc::EADDRINUSE);
        let text = err.to_string();
        assert!(text.contains("Socket::bind"));
        assert!(text.contains("address already in use"));
    }
}
