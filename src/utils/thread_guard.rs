//! Creator-thread pinning for descriptor objects.
//!
//! The scheduler, poller and per-task tables are never touched from more
//! than one OS thread, so descriptor objects are pinned to the thread that
//! created them. The process-wide multithread policy decides whether an
//! off-thread use is ignored, reported, or fatal.

use crate::config::{self, MultithreadPolicy};

use std::thread::{self, ThreadId};

#[derive(Debug)]
pub(crate) struct ThreadBound {
    owner: ThreadId,
}

impl ThreadBound {
    pub(crate) fn new() -> Self {
        Self {
            owner: thread::current().id(),
        }
    }

    /// Consulted on every method entry of the owning object.
    pub(crate) fn check(&self, op: &'static str) {
        if thread::current().id() == self.owner {
            return;
        }
        match config::multithread_policy() {
            MultithreadPolicy::Silent => {}
            MultithreadPolicy::Warn => {
                eprintln!("kqio: {op} called off the owning thread");
            }
            MultithreadPolicy::Fatal => {
                panic!("{op} called off the owning thread");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_thread_is_always_fine() {
        // The owner-thread fast path never consults the policy.
        let bound = ThreadBound::new();
        bound.check("test op");
    }

    #[test]
    fn fatal_policy_panics_off_thread() {
        config::set_multithread_policy(MultithreadPolicy::Fatal);
        let bound = ThreadBound::new();
        let result = thread::spawn(move || bound.check("test op")).join();
        assert!(result.is_err());
        config::set_multithread_policy(MultithreadPolicy::Silent);
    }
}
