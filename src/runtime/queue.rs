//! FIFO queue of runnable tasks.
//!
//! Tasks enter the queue when spawned and every time their waker fires;
//! the scheduler pops them in submission order, which is the fairness
//! guarantee: strictly FIFO, no priorities.

use crate::task::Runnable;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub(crate) struct TaskQueue {
    runnable: Mutex<VecDeque<Arc<dyn Runnable>>>,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        Self {
            runnable: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn push(&self, task: Arc<dyn Runnable>) {
        self.runnable.lock().unwrap().push_back(task);
    }

    pub(crate) fn pop(&self) -> Option<Arc<dyn Runnable>> {
        self.runnable.lock().unwrap().pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.runnable.lock().unwrap().is_empty()
    }
}
