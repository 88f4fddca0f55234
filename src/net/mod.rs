//! Sockets as per-descriptor state machines, plus name resolution.

mod lookup;
mod socket;

pub use lookup::{ResolveReply, resolve};
pub use socket::{AcceptReply, RecvReply, Socket, SocketState};
