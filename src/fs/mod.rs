//! Files as per-descriptor state machines.
//!
//! A [`File`] gates every operation on its current state: the access mode
//! decides which operations reach the kernel, and a closed file rejects
//! everything with `EBADF` before any request is built.

mod cache;
mod file;

pub use cache::ReadCache;
pub use file::{File, FileState, ReadReply, WriteReply};
