//! Asynchronous socket gated by a per-descriptor state machine.
//!
//! Operations inappropriate for the current state return `(-1, EINVAL)`
//! without touching the kernel; a socket whose descriptor is gone returns
//! `(-1, EBADF)` the same way. `bind` and `connect` are one-shot.

use crate::error::{self, SysError};
use crate::reactor::request::{NO_FD, OpKind};
use crate::reactor::{Completion, submit};
use crate::sys;
use crate::utils::thread_guard::ThreadBound;

use std::net::SocketAddr;
use std::os::unix::io::RawFd;
use std::time::Duration;

/// Legal states of a socket's automaton.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocketState {
    /// Open but neither bound nor connected; also the terminal state
    /// after close, at which point the descriptor is gone.
    Closed,
    Bound,
    Connecting,
    Connected,
    Listening,
}

/// Reply of an accept: on success a freshly minted connected socket and
/// the normalized peer address.
#[derive(Debug)]
pub struct AcceptReply {
    pub rc: isize,
    pub errno: i32,
    pub addr: Option<SocketAddr>,
    pub socket: Option<Socket>,
}

/// Reply of a recv: `data` is `None` when the caller supplied the buffer.
#[derive(Debug)]
pub struct RecvReply {
    pub rc: isize,
    pub errno: i32,
    pub data: Option<Vec<u8>>,
}

/// A socket and the automaton guarding its descriptor.
#[derive(Debug)]
pub struct Socket {
    fd: RawFd,
    state: SocketState,
    owner: ThreadBound,
}

impl Socket {
    /// Mint a non-blocking IPv4 TCP socket in the unbound state.
    pub fn tcp_v4() -> Result<Socket, SysError> {
        Self::create(libc::AF_INET)
    }

    /// Mint a non-blocking IPv6 TCP socket in the unbound state.
    pub fn tcp_v6() -> Result<Socket, SysError> {
        Self::create(libc::AF_INET6)
    }

    fn create(domain: i32) -> Result<Socket, SysError> {
        let (rc, errno) = sys::socket(domain, libc::SOCK_STREAM);
        if rc < 0 {
            return Err(SysError::new("Socket::new", errno));
        }

        let fd = rc as RawFd;
        sys::set_nonblocking(fd);

        Ok(Socket {
            fd,
            state: SocketState::Closed,
            owner: ThreadBound::new(),
        })
    }

    fn from_accepted(fd: RawFd) -> Socket {
        Socket {
            fd,
            state: SocketState::Connected,
            owner: ThreadBound::new(),
        }
    }

    pub fn state(&self) -> SocketState {
        self.state
    }

    /// The locally bound address, once there is one.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        if self.fd < 0 {
            return None;
        }
        let (rc, _, addr) = sys::getsockname(self.fd);
        if rc < 0 { None } else { addr }
    }

    fn reject(&self, op: &'static str, errno: i32) -> Result<Completion, SysError> {
        error::deliver(op, -1, errno)?;
        Ok(Completion { rc: -1, errno })
    }

    /// Bind to `addr`. One-shot: a bound, connecting, or connected socket
    /// rejects with `EINVAL`.
    pub async fn bind(
        &mut self,
        addr: SocketAddr,
        timeout: Option<Duration>,
    ) -> Result<Completion, SysError> {
        self.owner.check("Socket::bind");

        if self.fd < 0 {
            return self.reject("Socket::bind", libc::EBADF);
        }
        if self.state != SocketState::Closed {
            return self.reject("Socket::bind", libc::EINVAL);
        }

        let (done, _) = submit(self.fd, OpKind::Bind { addr }, timeout).await;
        if done.rc == 0 {
            self.state = SocketState::Bound;
        }

        error::deliver("Socket::bind", done.rc, done.errno)?;
        Ok(done)
    }

    /// Connect to `addr`; the socket passes through the connecting state
    /// until the kernel reports the verdict.
    pub async fn connect(
        &mut self,
        addr: SocketAddr,
        timeout: Option<Duration>,
    ) -> Result<Completion, SysError> {
        self.owner.check("Socket::connect");

        if self.fd < 0 {
            return self.reject("Socket::connect", libc::EBADF);
        }
        if self.state != SocketState::Closed {
            return self.reject("Socket::connect", libc::EINVAL);
        }

        self.state = SocketState::Connecting;
        let (done, _) = submit(
            self.fd,
            OpKind::Connect {
                addr,
                started: false,
            },
            timeout,
        )
        .await;

        // A failed connect falls back to the unconnected state.
        self.state = if done.rc == 0 {
            SocketState::Connected
        } else {
            SocketState::Closed
        };

        error::deliver("Socket::connect", done.rc, done.errno)?;
        Ok(done)
    }

    /// Start listening; legal only from the bound state.
    pub async fn listen(
        &mut self,
        backlog: i32,
        timeout: Option<Duration>,
    ) -> Result<Completion, SysError> {
        self.owner.check("Socket::listen");

        if self.fd < 0 {
            return self.reject("Socket::listen", libc::EBADF);
        }
        if self.state != SocketState::Bound {
            return self.reject("Socket::listen", libc::EINVAL);
        }

        let (done, _) = submit(self.fd, OpKind::Listen { backlog }, timeout).await;
        if done.rc == 0 {
            self.state = SocketState::Listening;
        }

        error::deliver("Socket::listen", done.rc, done.errno)?;
        Ok(done)
    }

    /// Accept one connection; the parent stays listening and the reply
    /// carries a new connected socket.
    pub async fn accept(&self, timeout: Option<Duration>) -> Result<AcceptReply, SysError> {
        self.owner.check("Socket::accept");

        let rejected = if self.fd < 0 {
            Some(libc::EBADF)
        } else if self.state != SocketState::Listening {
            Some(libc::EINVAL)
        } else {
            None
        };
        if let Some(errno) = rejected {
            error::deliver("Socket::accept", -1, errno)?;
            return Ok(AcceptReply {
                rc: -1,
                errno,
                addr: None,
                socket: None,
            });
        }

        let (done, output) = submit(self.fd, OpKind::Accept, timeout).await;
        error::deliver("Socket::accept", done.rc, done.errno)?;

        let socket = if done.rc >= 0 {
            Some(Socket::from_accepted(done.rc as RawFd))
        } else {
            None
        };

        Ok(AcceptReply {
            rc: done.rc,
            errno: done.errno,
            addr: output.into_peer(),
            socket,
        })
    }

    /// Receive up to `nbytes`, returning the bytes read.
    pub async fn recv(
        &self,
        nbytes: usize,
        flags: i32,
        timeout: Option<Duration>,
    ) -> Result<RecvReply, SysError> {
        self.owner.check("Socket::recv");

        let rejected = if self.fd < 0 {
            Some(libc::EBADF)
        } else if self.state != SocketState::Connected {
            Some(libc::EINVAL)
        } else {
            None
        };
        if let Some(errno) = rejected {
            error::deliver("Socket::recv", -1, errno)?;
            return Ok(RecvReply {
                rc: -1,
                errno,
                data: None,
            });
        }

        let (done, output) = submit(
            self.fd,
            OpKind::Recv {
                buf: vec![0; nbytes],
                flags,
            },
            timeout,
        )
        .await;
        error::deliver("Socket::recv", done.rc, done.errno)?;

        Ok(RecvReply {
            rc: done.rc,
            errno: done.errno,
            data: output.into_data(),
        })
    }

    /// Receive into the caller's buffer; the data slot is omitted.
    pub async fn recv_into(
        &self,
        buffer: &mut [u8],
        flags: i32,
        timeout: Option<Duration>,
    ) -> Result<RecvReply, SysError> {
        let mut reply = self.recv(buffer.len(), flags, timeout).await?;

        if let Some(bytes) = reply.data.take() {
            let n = bytes.len().min(buffer.len());
            buffer[..n].copy_from_slice(&bytes[..n]);
        }

        Ok(reply)
    }

    /// Send `data` on a connected socket.
    pub async fn ssend(
        &self,
        data: &[u8],
        flags: i32,
        timeout: Option<Duration>,
    ) -> Result<Completion, SysError> {
        self.sendto(data, flags, None, timeout).await
    }

    /// Send `data`, optionally to an explicit destination.
    pub async fn sendto(
        &self,
        data: &[u8],
        flags: i32,
        addr: Option<SocketAddr>,
        timeout: Option<Duration>,
    ) -> Result<Completion, SysError> {
        self.sendmsg(data, flags, addr, timeout).await
    }

    /// Bottom of the send cascade. States without send support reject
    /// with `EBADF`.
    pub async fn sendmsg(
        &self,
        data: &[u8],
        flags: i32,
        addr: Option<SocketAddr>,
        timeout: Option<Duration>,
    ) -> Result<Completion, SysError> {
        self.owner.check("Socket::sendmsg");

        if self.fd < 0 || self.state != SocketState::Connected {
            return self.reject("Socket::sendmsg", libc::EBADF);
        }

        let (done, _) = submit(
            self.fd,
            OpKind::SendMsg {
                buf: data.to_vec(),
                flags,
                addr,
            },
            timeout,
        )
        .await;

        error::deliver("Socket::sendmsg", done.rc, done.errno)?;
        Ok(done)
    }

    /// Close the descriptor; every state transitions to closed.
    pub async fn close(&mut self, timeout: Option<Duration>) -> Result<Completion, SysError> {
        self.owner.check("Socket::close");

        if self.fd < 0 {
            return self.reject("Socket::close", libc::EBADF);
        }

        let (done, _) = submit(self.fd, OpKind::Close, timeout).await;

        if done.rc == 0 {
            self.state = SocketState::Closed;
            self.fd = NO_FD;
        } else if !matches!(done.errno, libc::EBADF | libc::EINTR | libc::EIO) {
            eprintln!("kqio: close({}) returned unexpected errno {}", self.fd, done.errno);
            std::process::abort();
        }

        error::deliver("Socket::close", done.rc, done.errno)?;
        Ok(done)
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        if self.fd >= 0 {
            sys::close(self.fd);
        }
    }
}
