//! Thread-local runtime context.
//!
//! `block_on` installs the task queue and reactor handle for the duration
//! of the call, so `Task::spawn` and the submission future can find the
//! current scheduler without an explicit handle. Each OS thread gets an
//! independent context; nothing here is process-global.

use crate::reactor::ReactorHandle;
use crate::runtime::TaskQueue;

use std::cell::RefCell;
use std::sync::Arc;

thread_local! {
    pub(crate) static CURRENT_QUEUE: RefCell<Option<Arc<TaskQueue>>> =
        const { RefCell::new(None) };

    pub(crate) static CURRENT_REACTOR: RefCell<Option<ReactorHandle>> =
        const { RefCell::new(None) };
}

/// Enter a runtime context for the current thread, run `function`, and
/// restore whatever context was active before.
pub(crate) fn enter_context<F, R>(
    queue: Arc<TaskQueue>,
    reactor: ReactorHandle,
    function: F,
) -> R
where
    F: FnOnce() -> R,
{
    CURRENT_QUEUE.with(|current_queue| {
        CURRENT_REACTOR.with(|current_reactor| {
            let previous_queue = current_queue.borrow_mut().replace(queue);
            let previous_reactor = current_reactor.borrow_mut().replace(reactor);

            let result = function();

            *current_queue.borrow_mut() = previous_queue;
            *current_reactor.borrow_mut() = previous_reactor;

            result
        })
    })
}

/// The reactor of the running scheduler.
///
/// # Panics
/// Panics outside of `Runtime::block_on`.
pub(crate) fn current_reactor() -> ReactorHandle {
    CURRENT_REACTOR.with(|current| {
        current.borrow().clone().expect(
            "no reactor in the current context; I/O must run within Runtime::block_on",
        )
    })
}

/// The task queue of the running scheduler.
///
/// # Panics
/// Panics outside of `Runtime::block_on`.
pub(crate) fn current_queue() -> Arc<TaskQueue> {
    CURRENT_QUEUE.with(|current| {
        current
            .borrow()
            .clone()
            .expect("Task::spawn called outside of a runtime context")
    })
}
