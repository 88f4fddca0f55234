//! The cooperative scheduler.
//!
//! One `Runtime` multiplexes its tasks over the calling OS thread. The
//! pump inside [`Runtime::block_on`] plays the role of a dedicated I/O
//! task: whenever no user task is runnable it parks inside the reactor's
//! bounded kernel wait, and resumes whichever tasks the completions wake.

use crate::reactor::{Reactor, ReactorHandle, SHORT_TIMEOUT};
use crate::runtime::context::enter_context;
use crate::runtime::{TaskQueue, WakeRef, waker_from};

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

/// Notification flag standing in for the root future's continuation.
struct RootNotify {
    notified: AtomicBool,
}

impl RootNotify {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            notified: AtomicBool::new(true),
        })
    }

    fn take(&self) -> bool {
        self.notified.swap(false, Ordering::AcqRel)
    }

    fn pending(&self) -> bool {
        self.notified.load(Ordering::Acquire)
    }
}

impl WakeRef for RootNotify {
    fn wake_ref(self: &Arc<Self>) {
        self.notified.store(true, Ordering::Release);
    }
}

/// A single-threaded cooperative scheduler and its reactor.
pub struct Runtime {
    queue: Arc<TaskQueue>,
    reactor: ReactorHandle,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(TaskQueue::new()),
            reactor: Arc::new(Mutex::new(Reactor::new())),
        }
    }

    /// Drive `future` to completion, running spawned tasks and the
    /// reactor along the way.
    ///
    /// Tasks still suspended when the root future finishes are dropped
    /// with the call, the same way detached tasks end with their runtime.
    pub fn block_on<F: Future>(&mut self, future: F) -> F::Output {
        enter_context(self.queue.clone(), self.reactor.clone(), || {
            let mut future = Box::pin(future);

            let root = RootNotify::new();
            let waker = waker_from(root.clone());
            let mut cx = Context::from_waker(&waker);

            let mut finished: Option<F::Output> = None;

            loop {
                if finished.is_none() && root.take() {
                    if let Poll::Ready(value) = future.as_mut().poll(&mut cx) {
                        finished = Some(value);
                    }
                }

                // FIFO drain: every runnable task gets exactly one poll
                // before the queue is revisited.
                while let Some(task) = self.queue.pop() {
                    task.poll();
                }

                if finished.is_some() && self.queue.is_empty() {
                    return finished.take().expect("root result stored");
                }

                // Park in the kernel wait only when nothing is runnable;
                // otherwise just collect whatever readiness is already
                // there.
                let idle = self.queue.is_empty() && !root.pending();
                let timeout = if idle { SHORT_TIMEOUT } else { Duration::ZERO };
                self.reactor.lock().unwrap().poll(timeout);
            }
        })
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
