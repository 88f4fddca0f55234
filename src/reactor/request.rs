//! Per-in-flight-syscall records.
//!
//! A [`Request`] describes one pending operation: its descriptor, its
//! parameter block, a result slot written exactly once, and the waker of
//! the suspended task. The poller and the submission fast path share
//! [`Request::perform`], which runs the actual non-blocking syscall and
//! either completes the request or reports that it would block.

use crate::sys;

use std::ffi::CString;
use std::net::SocketAddr;
use std::os::unix::io::RawFd;
use std::sync::{Arc, Mutex};
use std::task::Waker;
use std::time::Duration;

/// Placeholder descriptor for operations that do not target an fd.
pub(crate) const NO_FD: RawFd = -1;

/// Readiness direction a blocked operation is waiting on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Interest {
    Read,
    Write,
}

/// Parameter block, one variant per operation kind.
pub(crate) enum OpKind {
    Open { path: CString, flags: i32, mode: u32 },
    Close,
    Read { buf: Vec<u8> },
    Pread { buf: Vec<u8>, offset: u64 },
    Write { buf: Vec<u8> },
    Pwrite { buf: Vec<u8>, offset: u64 },
    Recv { buf: Vec<u8>, flags: i32 },
    SendMsg { buf: Vec<u8>, flags: i32, addr: Option<SocketAddr> },
    Accept,
    Connect { addr: SocketAddr, started: bool },
    Bind { addr: SocketAddr },
    Listen { backlog: i32 },
    Timer { duration: Duration },
    Getaddrinfo { host: CString, port: u16 },
}

/// Auxiliary result payload beyond the `(rc, errno)` slot.
pub(crate) enum Output {
    None,
    Data(Vec<u8>),
    Peer(Option<SocketAddr>),
    Resolved(Vec<SocketAddr>),
}

impl Output {
    pub(crate) fn into_data(self) -> Option<Vec<u8>> {
        match self {
            Output::Data(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub(crate) fn into_peer(self) -> Option<SocketAddr> {
        match self {
            Output::Peer(peer) => peer,
            _ => None,
        }
    }

    pub(crate) fn into_resolved(self) -> Vec<SocketAddr> {
        match self {
            Output::Resolved(addrs) => addrs,
            _ => Vec::new(),
        }
    }
}

/// The completed `(rc, errno)` pair of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Completion {
    /// Syscall return value; −1 on failure.
    pub rc: isize,
    /// Raw errno; 0 on success.
    pub errno: i32,
}

impl Completion {
    pub fn ok(&self) -> bool {
        self.rc >= 0
    }
}

/// Outcome of one [`Request::perform`] attempt.
pub(crate) enum Progress {
    /// The result slot has been written and the continuation signaled.
    Done,
    /// The descriptor was not ready; wait for the given readiness.
    WouldBlock(Interest),
}

struct Inner {
    kind: OpKind,
    result: Option<Completion>,
    output: Output,
    waker: Option<Waker>,
}

/// One pending syscall and its continuation.
pub(crate) struct Request {
    fd: RawFd,
    inner: Mutex<Inner>,
}

impl Request {
    pub(crate) fn new(fd: RawFd, kind: OpKind) -> Arc<Self> {
        Arc::new(Self {
            fd,
            inner: Mutex::new(Inner {
                kind,
                result: None,
                output: Output::None,
                waker: None,
            }),
        })
    }

    pub(crate) fn fd(&self) -> RawFd {
        self.fd
    }

    pub(crate) fn result(&self) -> Option<Completion> {
        self.inner.lock().unwrap().result
    }

    /// Replace the stored continuation with the caller's current waker.
    pub(crate) fn set_waker(&self, waker: Waker) {
        self.inner.lock().unwrap().waker = Some(waker);
    }

    /// Duration of a TIMER request, `None` for every other kind.
    pub(crate) fn timer_duration(&self) -> Option<Duration> {
        match self.inner.lock().unwrap().kind {
            OpKind::Timer { duration } => Some(duration),
            _ => None,
        }
    }

    pub(crate) fn take_output(&self) -> Output {
        std::mem::replace(&mut self.inner.lock().unwrap().output, Output::None)
    }

    /// Write the result slot and signal the continuation.
    ///
    /// The first write wins; later calls are ignored and report `false`.
    /// This is what resolves completed-then-canceled races.
    pub(crate) fn complete(&self, rc: isize, errno: i32) -> bool {
        let waker = {
            let mut inner = self.inner.lock().unwrap();
            if inner.result.is_some() {
                return false;
            }
            inner.result = Some(Completion { rc, errno });
            inner.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    fn finish(&self, inner: &mut Inner, rc: isize, errno: i32) -> Progress {
        if inner.result.is_none() {
            inner.result = Some(Completion { rc, errno });
            if let Some(waker) = inner.waker.take() {
                waker.wake();
            }
        }
        Progress::Done
    }

    /// Run the actual syscall for this request.
    ///
    /// Called once from the submission fast path and again by the poller
    /// whenever the kernel reports readiness. `EAGAIN` is never written to
    /// the result slot; it comes back as [`Progress::WouldBlock`] so the
    /// poller can re-register and keep the task suspended. `EINTR` is
    /// surfaced as an ordinary failure for the caller to retry.
    pub(crate) fn perform(&self) -> Progress {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        if inner.result.is_some() {
            return Progress::Done;
        }

        match &mut inner.kind {
            OpKind::Open { path, flags, mode } => {
                let (rc, errno) = sys::open(path, *flags, *mode);
                self.finish(inner, rc, errno)
            }
            OpKind::Close => {
                let (rc, errno) = sys::close(self.fd);
                self.finish(inner, rc, errno)
            }
            OpKind::Read { buf } => {
                let (rc, errno) = sys::read(self.fd, buf);
                if would_block(rc, errno) {
                    return Progress::WouldBlock(Interest::Read);
                }
                if rc >= 0 {
                    buf.truncate(rc as usize);
                    inner.output = Output::Data(std::mem::take(buf));
                }
                self.finish(inner, rc, errno)
            }
            OpKind::Pread { buf, offset } => {
                let (rc, errno) = sys::pread(self.fd, buf, *offset);
                if would_block(rc, errno) {
                    return Progress::WouldBlock(Interest::Read);
                }
                if rc >= 0 {
                    buf.truncate(rc as usize);
                    inner.output = Output::Data(std::mem::take(buf));
                }
                self.finish(inner, rc, errno)
            }
            OpKind::Write { buf } => {
                let (rc, errno) = sys::write(self.fd, buf);
                if would_block(rc, errno) {
                    return Progress::WouldBlock(Interest::Write);
                }
                self.finish(inner, rc, errno)
            }
            OpKind::Pwrite { buf, offset } => {
                let (rc, errno) = sys::pwrite(self.fd, buf, *offset);
                if would_block(rc, errno) {
                    return Progress::WouldBlock(Interest::Write);
                }
                self.finish(inner, rc, errno)
            }
            OpKind::Recv { buf, flags } => {
                let (rc, errno) = sys::recv(self.fd, buf, *flags);
                if would_block(rc, errno) {
                    return Progress::WouldBlock(Interest::Read);
                }
                if rc >= 0 {
                    buf.truncate(rc as usize);
                    inner.output = Output::Data(std::mem::take(buf));
                }
                self.finish(inner, rc, errno)
            }
            OpKind::SendMsg { buf, flags, addr } => {
                let (rc, errno) = sys::sendmsg(self.fd, buf, *flags, addr.as_ref());
                if would_block(rc, errno) {
                    return Progress::WouldBlock(Interest::Write);
                }
                self.finish(inner, rc, errno)
            }
            OpKind::Accept => {
                let (rc, errno, peer) = sys::accept(self.fd);
                if would_block(rc, errno) {
                    return Progress::WouldBlock(Interest::Read);
                }
                if rc >= 0 {
                    sys::set_nonblocking(rc as RawFd);
                    inner.output = Output::Peer(peer);
                }
                self.finish(inner, rc, errno)
            }
            OpKind::Connect { addr, started } => {
                if *started {
                    // Writability after a pending connect; the verdict is
                    // whatever SO_ERROR drained.
                    let err = sys::socket_error(self.fd);
                    let (rc, errno) = if err == 0 { (0, 0) } else { (-1, err) };
                    return self.finish(inner, rc, errno);
                }
                let (rc, errno) = sys::connect(self.fd, addr);
                if rc == 0 {
                    return self.finish(inner, 0, 0);
                }
                if errno == libc::EINPROGRESS || errno == libc::EAGAIN {
                    *started = true;
                    return Progress::WouldBlock(Interest::Write);
                }
                self.finish(inner, rc, errno)
            }
            OpKind::Bind { addr } => {
                let (rc, errno) = sys::bind(self.fd, addr);
                self.finish(inner, rc, errno)
            }
            OpKind::Listen { backlog } => {
                let (rc, errno) = sys::listen(self.fd, *backlog);
                self.finish(inner, rc, errno)
            }
            OpKind::Timer { .. } => {
                unreachable!("timer requests are armed with the poller, never performed")
            }
            OpKind::Getaddrinfo { host, port } => {
                let (rc, errno, resolved) = sys::getaddrinfo(host, *port);
                if rc >= 0 {
                    inner.output = Output::Resolved(resolved);
                }
                self.finish(inner, rc, errno)
            }
        }
    }
}

fn would_block(rc: isize, errno: i32) -> bool {
    rc < 0 && (errno == libc::EAGAIN || errno == libc::EWOULDBLOCK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{RawWaker, RawWakerVTable, Waker};

    fn counting_waker(hits: &'static AtomicUsize) -> Waker {
        fn clone(data: *const ()) -> RawWaker {
            RawWaker::new(data, &VTABLE)
        }
        fn wake(data: *const ()) {
            unsafe { &*(data as *const AtomicUsize) }.fetch_add(1, Ordering::SeqCst);
        }
        fn drop(_: *const ()) {}
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, wake, wake, drop);
        unsafe { Waker::from_raw(RawWaker::new(hits as *const _ as *const (), &VTABLE)) }
    }

    #[test]
    fn result_slot_is_written_exactly_once() {
        static HITS: AtomicUsize = AtomicUsize::new(0);

        let request = Request::new(NO_FD, OpKind::Timer {
            duration: Duration::from_millis(1),
        });
        request.set_waker(counting_waker(&HITS));

        assert!(request.complete(-1, libc::ETIMEDOUT));
        assert!(!request.complete(0, 0), "second write must lose");

        let done = request.result().unwrap();
        assert_eq!(done.rc, -1);
        assert_eq!(done.errno, libc::ETIMEDOUT);
        assert_eq!(HITS.load(Ordering::SeqCst), 1, "continuation signaled once");
    }

    #[test]
    fn deadline_race_resolves_to_first_writer() {
        let request = Request::new(NO_FD, OpKind::Timer {
            duration: Duration::from_millis(1),
        });

        assert!(request.complete(5, 0));
        // The late deadline must not clobber the completed result.
        assert!(!request.complete(-1, libc::ETIMEDOUT));
        assert_eq!(request.result().unwrap().rc, 5);
    }

    #[test]
    fn perform_after_completion_is_a_no_op() {
        let (rc, errno, fds) = sys::pipe();
        assert_eq!(rc, 0, "pipe failed: {errno}");

        let request = Request::new(fds[0], OpKind::Read { buf: vec![0; 4] });
        request.complete(-1, libc::ETIMEDOUT);
        assert!(matches!(request.perform(), Progress::Done));
        assert_eq!(request.result().unwrap().errno, libc::ETIMEDOUT);

        sys::close(fds[0]);
        sys::close(fds[1]);
    }

    #[test]
    fn empty_pipe_read_would_block() {
        let (rc, errno, fds) = sys::pipe();
        assert_eq!(rc, 0, "pipe failed: {errno}");
        sys::set_nonblocking(fds[0]);

        let request = Request::new(fds[0], OpKind::Read { buf: vec![0; 4] });
        assert!(matches!(
            request.perform(),
            Progress::WouldBlock(Interest::Read)
        ));
        assert!(request.result().is_none(), "EAGAIN never reaches the slot");

        sys::close(fds[0]);
        sys::close(fds[1]);
    }
}
