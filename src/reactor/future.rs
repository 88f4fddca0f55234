//! The submission future: the single suspension point of the runtime.
//!
//! Every user-level operation funnels into [`submit`], which builds a
//! [`Request`], runs the optimistic syscall, and parks the calling task
//! until the poller delivers the result. An optional deadline arms a
//! one-shot timer racing the I/O registration; the first completion
//! write wins.

use crate::reactor::core::ReactorHandle;
use crate::reactor::request::{Completion, OpKind, Output, Progress, Request};
use crate::runtime::context::current_reactor;

use std::future::Future;
use std::os::unix::io::RawFd;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

/// Run one operation through the request/continuation protocol and return
/// its completion plus any auxiliary output.
pub(crate) async fn submit(
    fd: RawFd,
    kind: OpKind,
    deadline: Option<Duration>,
) -> (Completion, Output) {
    let request = Request::new(fd, kind);
    let done = Submission::new(request.clone(), deadline).await;
    (done, request.take_output())
}

pub(crate) struct Submission {
    request: Arc<Request>,
    deadline: Option<Duration>,
    reactor: ReactorHandle,
    submitted: bool,
}

impl Submission {
    pub(crate) fn new(request: Arc<Request>, deadline: Option<Duration>) -> Self {
        Self {
            request,
            deadline,
            reactor: current_reactor(),
            submitted: false,
        }
    }
}

impl Future for Submission {
    type Output = Completion;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if !this.submitted {
            this.submitted = true;

            if let Some(duration) = this.request.timer_duration() {
                this.request.set_waker(cx.waker().clone());
                this.reactor
                    .lock()
                    .unwrap()
                    .register_timer(duration, this.request.clone());
                return Poll::Pending;
            }

            match this.request.perform() {
                Progress::Done => {
                    let done = this
                        .request
                        .result()
                        .expect("performed request has a result");
                    return Poll::Ready(done);
                }
                Progress::WouldBlock(interest) => {
                    this.request.set_waker(cx.waker().clone());
                    let mut reactor = this.reactor.lock().unwrap();
                    reactor.register(interest, this.request.clone());
                    if let Some(limit) = this.deadline {
                        reactor.register_deadline(
                            limit,
                            this.request.fd(),
                            interest,
                            this.request.clone(),
                        );
                    }
                    return Poll::Pending;
                }
            }
        }

        // Refresh the continuation before re-checking, so a completion
        // racing this poll still wakes the latest waker.
        this.request.set_waker(cx.waker().clone());
        match this.request.result() {
            Some(done) => Poll::Ready(done),
            None => Poll::Pending,
        }
    }
}
