//! epoll selector backend.
//!
//! Readiness uses `EPOLLONESHOT` so a fired registration stays disabled
//! until it is armed again; timers are one-shot timerfds. When both
//! directions are armed on one fd they share a single epoll entry, so a
//! fire that consumed only one direction re-arms the survivor.

use crate::reactor::poller::Token;
use crate::reactor::request::Interest;
use crate::sys;

use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::time::Duration;

const EVENT_CAPACITY: usize = 64;

#[derive(Clone, Copy, Default)]
struct Armed {
    read: bool,
    write: bool,
}

impl Armed {
    fn mask(&self) -> u32 {
        let mut mask = libc::EPOLLONESHOT as u32;
        if self.read {
            mask |= libc::EPOLLIN as u32;
        }
        if self.write {
            mask |= libc::EPOLLOUT as u32;
        }
        mask
    }

    fn is_empty(&self) -> bool {
        !self.read && !self.write
    }
}

pub(crate) struct Selector {
    epoll: RawFd,
    ready: Vec<libc::epoll_event>,
    armed: HashMap<RawFd, Armed>,
    timer_ids: HashMap<RawFd, u64>,
    timer_fds: HashMap<u64, RawFd>,
}

impl Selector {
    /// Allocate the kernel event queue. Failure here is unrecoverable.
    pub(crate) fn new() -> Self {
        let epoll = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        assert!(epoll >= 0, "epoll_create1() failed: errno {}", sys::errno());

        Self {
            epoll,
            ready: Vec::with_capacity(EVENT_CAPACITY),
            armed: HashMap::new(),
            timer_ids: HashMap::new(),
            timer_fds: HashMap::new(),
        }
    }

    fn ctl(&self, op: i32, fd: RawFd, mask: u32) -> i32 {
        let mut event = libc::epoll_event {
            events: mask,
            u64: fd as u64,
        };
        let rc = unsafe { libc::epoll_ctl(self.epoll, op, fd, &mut event) };
        if rc < 0 { sys::errno() } else { 0 }
    }

    fn update(&mut self, fd: RawFd, armed: Armed) {
        if armed.is_empty() {
            self.armed.remove(&fd);
            self.ctl(libc::EPOLL_CTL_DEL, fd, 0);
            return;
        }
        self.armed.insert(fd, armed);
        let errno = self.ctl(libc::EPOLL_CTL_ADD, fd, armed.mask());
        if errno == libc::EEXIST {
            // The fd survived an earlier one-shot fire in disabled state.
            self.ctl(libc::EPOLL_CTL_MOD, fd, armed.mask());
        }
    }

    /// Arm a one-shot readiness filter for `fd`.
    pub(crate) fn arm(&mut self, fd: RawFd, interest: Interest) {
        let mut armed = self.armed.get(&fd).copied().unwrap_or_default();
        match interest {
            Interest::Read => armed.read = true,
            Interest::Write => armed.write = true,
        }
        self.update(fd, armed);
    }

    /// Drop a registration that has not fired.
    pub(crate) fn disarm(&mut self, fd: RawFd, interest: Interest) {
        let mut armed = self.armed.get(&fd).copied().unwrap_or_default();
        match interest {
            Interest::Read => armed.read = false,
            Interest::Write => armed.write = false,
        }
        self.update(fd, armed);
    }

    /// Arm a one-shot millisecond timer under the caller's id.
    pub(crate) fn arm_timer(&mut self, id: u64, millis: u64) {
        let tfd = unsafe {
            libc::timerfd_create(
                libc::CLOCK_MONOTONIC,
                libc::TFD_NONBLOCK | libc::TFD_CLOEXEC,
            )
        };
        assert!(tfd >= 0, "timerfd_create() failed: errno {}", sys::errno());

        // A zeroed it_value disarms the timerfd; keep at least one tick.
        let spec = libc::itimerspec {
            it_interval: libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            },
            it_value: libc::timespec {
                tv_sec: (millis / 1000) as libc::time_t,
                tv_nsec: (((millis % 1000) * 1_000_000).max(1)) as libc::c_long,
            },
        };
        unsafe {
            libc::timerfd_settime(tfd, 0, &spec, std::ptr::null_mut());
        }

        self.ctl(
            libc::EPOLL_CTL_ADD,
            tfd,
            libc::EPOLLIN as u32 | libc::EPOLLONESHOT as u32,
        );
        self.timer_ids.insert(tfd, id);
        self.timer_fds.insert(id, tfd);
    }

    fn reap_timer(&mut self, tfd: RawFd) -> u64 {
        let id = self
            .timer_ids
            .remove(&tfd)
            .unwrap_or_else(|| panic!("readiness on unknown timerfd {tfd}"));
        self.timer_fds.remove(&id);
        self.ctl(libc::EPOLL_CTL_DEL, tfd, 0);
        sys::close(tfd);
        id
    }

    /// Block up to `timeout` for readiness and translate the batch.
    pub(crate) fn wait(&mut self, timeout: Duration, out: &mut Vec<Token>) {
        let millis = timeout.as_millis().min(i32::MAX as u128) as i32;

        let n = unsafe {
            libc::epoll_wait(
                self.epoll,
                self.ready.as_mut_ptr(),
                self.ready.capacity() as i32,
                millis,
            )
        };

        if n < 0 {
            let errno = sys::errno();
            if errno == libc::EINTR {
                return;
            }
            panic!("epoll_wait() failed: errno {errno}");
        }

        unsafe {
            self.ready.set_len(n as usize);
        }

        let fired: Vec<(RawFd, u32)> = self
            .ready
            .iter()
            .map(|event| (event.u64 as RawFd, event.events))
            .collect();

        for (fd, events) in fired {
            if self.timer_ids.contains_key(&fd) {
                let id = self.reap_timer(fd);
                out.push(Token::Timer { id });
                continue;
            }

            let mut armed = self.armed.get(&fd).copied().unwrap_or_default();
            // Error and hang-up conditions complete whichever direction is
            // pending so the retried syscall observes the real errno.
            let broken = events & (libc::EPOLLERR as u32 | libc::EPOLLHUP as u32) != 0;
            let readable = armed.read && (broken || events & libc::EPOLLIN as u32 != 0);
            let writable = armed.write && (broken || events & libc::EPOLLOUT as u32 != 0);

            if readable {
                armed.read = false;
                out.push(Token::Io {
                    fd,
                    interest: Interest::Read,
                });
            }
            if writable {
                armed.write = false;
                out.push(Token::Io {
                    fd,
                    interest: Interest::Write,
                });
            }

            // One-shot left the whole entry disabled; re-arm the direction
            // that did not fire.
            self.update(fd, armed);
        }
    }
}

impl Drop for Selector {
    fn drop(&mut self) {
        for (&tfd, _) in &self.timer_ids {
            sys::close(tfd);
        }
        sys::close(self.epoll);
    }
}
