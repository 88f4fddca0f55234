//! Cooperative tasks and join handles.
//!
//! A task owns its future and lives in one of four states: runnable
//! (present in the scheduler's queue), running (being polled), suspended
//! (its waker is held by a pending request or another future), or dead
//! (completed, its result parked for the join handle).

use crate::runtime::context::current_queue;
use crate::runtime::{TaskQueue, WakeRef, waker_from};

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

pub struct Task<T: Send> {
    future: Mutex<Option<Pin<Box<dyn Future<Output = T> + Send>>>>,
    result: Mutex<Option<T>>,
    queue: Arc<TaskQueue>,
    completed: AtomicBool,
    waiters: Mutex<Vec<Waker>>,
}

impl<T: Send + 'static> Task<T> {
    fn new<F>(future: F, queue: Arc<TaskQueue>) -> Arc<Self>
    where
        F: Future<Output = T> + Send + 'static,
    {
        Arc::new(Self {
            future: Mutex::new(Some(Box::pin(future))),
            result: Mutex::new(None),
            queue,
            completed: AtomicBool::new(false),
            waiters: Mutex::new(Vec::new()),
        })
    }

    /// Spawn a task on the current runtime and return its join handle.
    ///
    /// # Panics
    /// Panics outside of `Runtime::block_on`.
    pub fn spawn<F>(future: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let queue = current_queue();
        let task = Task::new(future, queue.clone());
        queue.push(task.clone());

        JoinHandle { task }
    }

    fn poll_once(self: &Arc<Self>) {
        let waker = waker_from(self.clone());
        let mut cx = Context::from_waker(&waker);

        let mut slot = self.future.lock().unwrap();
        let Some(mut future) = slot.take() else {
            return;
        };

        match future.as_mut().poll(&mut cx) {
            Poll::Pending => {
                *slot = Some(future);
            }
            Poll::Ready(value) => {
                *self.result.lock().unwrap() = Some(value);
                self.completed.store(true, Ordering::Release);

                for waiter in self.waiters.lock().unwrap().drain(..) {
                    waiter.wake();
                }
            }
        }
    }
}

impl<T: Send + 'static> WakeRef for Task<T> {
    fn wake_ref(self: &Arc<Self>) {
        self.queue.push(self.clone());
    }
}

/// Object-safe face of a task for the scheduler's queue.
pub(crate) trait Runnable: Send + Sync {
    fn poll(self: Arc<Self>);
}

impl<T: Send + 'static> Runnable for Task<T> {
    fn poll(self: Arc<Self>) {
        Task::poll_once(&self);
    }
}

/// Awaits a spawned task's completion and yields its result.
pub struct JoinHandle<T: Send> {
    task: Arc<Task<T>>,
}

impl<T: Send> Future for JoinHandle<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.task.completed.load(Ordering::Acquire) {
            let value = self
                .task
                .result
                .lock()
                .unwrap()
                .take()
                .expect("task completed but result already taken");
            return Poll::Ready(value);
        }

        self.task.waiters.lock().unwrap().push(cx.waker().clone());
        Poll::Pending
    }
}

/// A bag of join handles awaited together.
pub struct JoinSet<T: Send> {
    handles: Vec<JoinHandle<T>>,
}

impl<T: Send> JoinSet<T> {
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    pub fn push(&mut self, handle: JoinHandle<T>) {
        self.handles.push(handle);
    }

    pub async fn await_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.await;
        }
    }
}

impl<T: Send> Default for JoinSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
