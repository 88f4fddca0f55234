//! Readiness poller, request records, and the submission protocol.

mod core;
mod future;
mod poller;
pub(crate) mod request;

pub(crate) use self::core::{Reactor, ReactorHandle, SHORT_TIMEOUT};
pub(crate) use self::future::submit;
pub use self::request::Completion;
