//! The readiness poller.
//!
//! The reactor owns the platform selector, a bounded change list, and the
//! registration tables that map `(fd, direction)` and timer ids to the
//! [`Request`]s awaiting them. All registrations are one-shot: they are
//! removed from the tables when they fire, and re-inserted only if the
//! retried syscall still reports `EAGAIN`.
//!
//! The reactor is single-writer: only the scheduler's pump touches it.

use crate::reactor::poller::{Selector, Token};
use crate::reactor::request::{Interest, Progress, Request};

use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Capacity of the change list; back-pressure point for registrations.
pub(crate) const MAX_EVENTS: usize = 10;

/// Upper bound on one kernel wait, so the pump can re-check its queues.
pub(crate) const SHORT_TIMEOUT: Duration = Duration::from_secs(1);

pub(crate) type ReactorHandle = Arc<Mutex<Reactor>>;

/// A pending registration not yet submitted to the kernel.
enum Change {
    Arm { fd: RawFd, interest: Interest },
    Disarm { fd: RawFd, interest: Interest },
    ArmTimer { id: u64, millis: u64 },
}

/// What a timer firing means for its request.
enum TimerKind {
    /// An ordinary sleep: complete with `(0, 0)`.
    Fire,
    /// A deadline racing an I/O registration: complete with
    /// `(-1, ETIMEDOUT)` and cancel the losing registration.
    Deadline { fd: RawFd, interest: Interest },
}

pub(crate) struct Reactor {
    selector: Selector,
    changes: Vec<Change>,
    readers: HashMap<RawFd, Arc<Request>>,
    writers: HashMap<RawFd, Arc<Request>>,
    timers: HashMap<u64, (Arc<Request>, TimerKind)>,
    next_timer: u64,
    ready: Vec<Token>,
}

impl Reactor {
    pub(crate) fn new() -> Self {
        Self {
            selector: Selector::new(),
            changes: Vec::with_capacity(MAX_EVENTS),
            readers: HashMap::new(),
            writers: HashMap::new(),
            timers: HashMap::new(),
            next_timer: 1,
            ready: Vec::new(),
        }
    }

    fn table(&mut self, interest: Interest) -> &mut HashMap<RawFd, Arc<Request>> {
        match interest {
            Interest::Read => &mut self.readers,
            Interest::Write => &mut self.writers,
        }
    }

    fn push(&mut self, change: Change) {
        self.changes.push(change);
        if self.changes.len() >= MAX_EVENTS {
            self.flush();
        }
    }

    /// Submit the pending change list to the kernel and reset it.
    pub(crate) fn flush(&mut self) {
        for change in self.changes.drain(..) {
            match change {
                Change::Arm { fd, interest } => self.selector.arm(fd, interest),
                Change::Disarm { fd, interest } => self.selector.disarm(fd, interest),
                Change::ArmTimer { id, millis } => self.selector.arm_timer(id, millis),
            }
        }
    }

    /// Number of registrations waiting for the next flush.
    pub(crate) fn change_count(&self) -> usize {
        self.changes.len()
    }

    /// Register `request` for one-shot readiness on its descriptor.
    pub(crate) fn register(&mut self, interest: Interest, request: Arc<Request>) {
        let fd = request.fd();
        let previous = self.table(interest).insert(fd, request);
        debug_assert!(
            previous.is_none(),
            "duplicate {interest:?} registration for fd {fd}"
        );
        self.push(Change::Arm { fd, interest });
    }

    /// Arm a one-shot timer that completes `request` with `(0, 0)`.
    pub(crate) fn register_timer(&mut self, duration: Duration, request: Arc<Request>) -> u64 {
        self.insert_timer(duration, request, TimerKind::Fire)
    }

    /// Arm a deadline racing the I/O registration on `(fd, interest)`.
    pub(crate) fn register_deadline(
        &mut self,
        duration: Duration,
        fd: RawFd,
        interest: Interest,
        request: Arc<Request>,
    ) -> u64 {
        self.insert_timer(duration, request, TimerKind::Deadline { fd, interest })
    }

    fn insert_timer(
        &mut self,
        duration: Duration,
        request: Arc<Request>,
        kind: TimerKind,
    ) -> u64 {
        let id = self.next_timer;
        self.next_timer = self.next_timer.wrapping_add(1).max(1);

        let millis = duration.as_millis().min(u64::MAX as u128) as u64;
        self.timers.insert(id, (request, kind));
        self.push(Change::ArmTimer { id, millis });
        id
    }

    /// Whether any registration is still outstanding.
    pub(crate) fn pending(&self) -> bool {
        !self.readers.is_empty() || !self.writers.is_empty() || !self.timers.is_empty()
    }

    /// Flush the change list, wait up to `timeout`, and dispatch.
    pub(crate) fn poll(&mut self, timeout: Duration) {
        self.flush();

        let mut ready = std::mem::take(&mut self.ready);
        ready.clear();
        self.selector.wait(timeout, &mut ready);

        for token in ready.drain(..) {
            self.dispatch(token);
        }
        self.ready = ready;

        // Re-registrations accumulated during dispatch.
        self.flush();
    }

    fn dispatch(&mut self, token: Token) {
        match token {
            Token::Io { fd, interest } => {
                let Some(request) = self.table(interest).remove(&fd) else {
                    // A deadline already canceled this registration.
                    return;
                };
                if request.result().is_some() {
                    return;
                }
                if let Progress::WouldBlock(again) = request.perform() {
                    // Spurious readiness; keep the task suspended.
                    self.table(again).insert(fd, request);
                    self.push(Change::Arm { fd, interest: again });
                }
            }
            Token::Timer { id } => {
                let Some((request, kind)) = self.timers.remove(&id) else {
                    panic!("readiness on unknown timer id {id}");
                };
                match kind {
                    TimerKind::Fire => {
                        request.complete(0, 0);
                    }
                    TimerKind::Deadline { fd, interest } => {
                        if request.complete(-1, libc::ETIMEDOUT)
                            && self.table(interest).remove(&fd).is_some()
                        {
                            self.push(Change::Disarm { fd, interest });
                        }
                    }
                }
            }
        }
    }
}
