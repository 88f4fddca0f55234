//! kqueue selector backend.

use crate::reactor::poller::Token;
use crate::reactor::request::Interest;
use crate::sys;

use std::os::unix::io::RawFd;
use std::ptr;
use std::time::Duration;

const EVENT_CAPACITY: usize = 64;

pub(crate) struct Selector {
    queue: RawFd,
    ready: Vec<libc::kevent>,
}

impl Selector {
    /// Allocate the kernel event queue. Failure here is unrecoverable.
    pub(crate) fn new() -> Self {
        let queue = unsafe { libc::kqueue() };
        assert!(queue >= 0, "kqueue() failed: errno {}", sys::errno());

        Self {
            queue,
            ready: Vec::with_capacity(EVENT_CAPACITY),
        }
    }

    fn apply(&self, event: &libc::kevent) {
        unsafe {
            libc::kevent(self.queue, event, 1, ptr::null_mut(), 0, ptr::null());
        }
    }

    /// Arm a one-shot readiness filter for `fd`.
    pub(crate) fn arm(&mut self, fd: RawFd, interest: Interest) {
        let event = libc::kevent {
            ident: fd as libc::uintptr_t,
            filter: filter_for(interest),
            flags: libc::EV_ADD | libc::EV_ENABLE | libc::EV_ONESHOT,
            fflags: 0,
            data: 0,
            udata: ptr::null_mut(),
        };
        self.apply(&event);
    }

    /// Drop a registration that has not fired. Already-fired one-shots are
    /// gone from the kernel; the resulting ENOENT is ignored.
    pub(crate) fn disarm(&mut self, fd: RawFd, interest: Interest) {
        let event = libc::kevent {
            ident: fd as libc::uintptr_t,
            filter: filter_for(interest),
            flags: libc::EV_DELETE,
            fflags: 0,
            data: 0,
            udata: ptr::null_mut(),
        };
        self.apply(&event);
    }

    /// Arm a one-shot millisecond timer under the caller's id.
    pub(crate) fn arm_timer(&mut self, id: u64, millis: u64) {
        let event = libc::kevent {
            ident: id as libc::uintptr_t,
            filter: libc::EVFILT_TIMER,
            flags: libc::EV_ADD | libc::EV_ENABLE | libc::EV_ONESHOT,
            fflags: 0,
            data: millis.max(1) as libc::intptr_t,
            udata: ptr::null_mut(),
        };
        self.apply(&event);
    }

    /// Block up to `timeout` for readiness and translate the batch.
    pub(crate) fn wait(&mut self, timeout: Duration, out: &mut Vec<Token>) {
        let ts = libc::timespec {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_nsec: timeout.subsec_nanos() as libc::c_long,
        };

        let n = unsafe {
            libc::kevent(
                self.queue,
                ptr::null(),
                0,
                self.ready.as_mut_ptr(),
                self.ready.capacity() as i32,
                &ts,
            )
        };

        if n < 0 {
            let errno = sys::errno();
            if errno == libc::EINTR {
                return;
            }
            panic!("kevent() failed: errno {errno}");
        }

        unsafe {
            self.ready.set_len(n as usize);
        }

        for event in &self.ready {
            let token = match event.filter {
                libc::EVFILT_READ => Token::Io {
                    fd: event.ident as RawFd,
                    interest: Interest::Read,
                },
                libc::EVFILT_WRITE => Token::Io {
                    fd: event.ident as RawFd,
                    interest: Interest::Write,
                },
                libc::EVFILT_TIMER => Token::Timer {
                    id: event.ident as u64,
                },
                other => panic!("unknown kevent filter {other}"),
            };
            out.push(token);
        }
    }
}

impl Drop for Selector {
    fn drop(&mut self) {
        sys::close(self.queue);
    }
}
