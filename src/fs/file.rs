//! Asynchronous file handle gated by a per-descriptor state machine.

use crate::error::{self, SysError};
use crate::reactor::request::{NO_FD, OpKind};
use crate::reactor::{Completion, submit};
use crate::sys;
use crate::utils::thread_guard::ThreadBound;

use std::ffi::CString;
use std::os::unix::io::RawFd;
use std::time::Duration;

/// Legal states of a file descriptor's automaton.
///
/// The only transition is any non-closed state to [`FileState::Closed`]
/// on a successful close.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileState {
    Closed,
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl FileState {
    fn readable(self) -> bool {
        matches!(self, FileState::ReadOnly | FileState::ReadWrite)
    }

    fn writable(self) -> bool {
        matches!(self, FileState::WriteOnly | FileState::ReadWrite)
    }

    fn from_flags(flags: i32) -> Self {
        match flags & libc::O_ACCMODE {
            libc::O_RDWR => FileState::ReadWrite,
            libc::O_WRONLY => FileState::WriteOnly,
            _ => FileState::ReadOnly,
        }
    }
}

/// Reply of a read: `data` is `None` when the caller supplied the buffer.
#[derive(Debug)]
pub struct ReadReply {
    pub rc: isize,
    pub errno: i32,
    pub data: Option<Vec<u8>>,
    pub offset: u64,
}

/// Reply of a write; `offset` is the position after the written bytes.
#[derive(Debug)]
pub struct WriteReply {
    pub rc: isize,
    pub errno: i32,
    pub offset: u64,
}

/// An open file and the automaton guarding its descriptor.
#[derive(Debug)]
pub struct File {
    fd: RawFd,
    state: FileState,
    seekable: bool,
    owner: ThreadBound,
}

impl File {
    /// Open `path` and place the file in the state matching its access
    /// mode.
    ///
    /// Under the return-codes policy an open failure yields `Ok(None)`;
    /// under the errors policy it is delivered as a [`SysError`].
    pub async fn open(
        path: &str,
        flags: i32,
        mode: u32,
        timeout: Option<Duration>,
    ) -> Result<Option<File>, SysError> {
        let Ok(c_path) = CString::new(path) else {
            error::deliver("File::open", -1, libc::EINVAL)?;
            return Ok(None);
        };

        let (done, _) = submit(
            NO_FD,
            OpKind::Open {
                path: c_path,
                flags,
                mode,
            },
            timeout,
        )
        .await;

        if done.rc < 0 {
            error::deliver("File::open", done.rc, done.errno)?;
            return Ok(None);
        }

        let fd = done.rc as RawFd;
        sys::set_nonblocking(fd);

        Ok(Some(File {
            fd,
            state: FileState::from_flags(flags),
            seekable: true,
            owner: ThreadBound::new(),
        }))
    }

    /// Adopt an inherited descriptor, typically a pipe end.
    ///
    /// Inherited descriptors are treated as non-seekable: reads and
    /// writes consume the stream while the offset bookkeeping stays
    /// purely logical.
    pub fn from_raw(fd: RawFd, state: FileState) -> File {
        sys::set_nonblocking(fd);
        File {
            fd,
            state,
            seekable: false,
            owner: ThreadBound::new(),
        }
    }

    pub fn state(&self) -> FileState {
        self.state
    }

    /// Read up to `nbytes` at `offset`, returning the bytes read.
    pub async fn read(
        &self,
        nbytes: usize,
        offset: u64,
        timeout: Option<Duration>,
    ) -> Result<ReadReply, SysError> {
        self.owner.check("File::read");

        if !self.state.readable() || self.fd < 0 {
            error::deliver("File::read", -1, libc::EBADF)?;
            return Ok(ReadReply {
                rc: -1,
                errno: libc::EBADF,
                data: None,
                offset,
            });
        }

        let kind = self.read_kind(nbytes, offset);
        let (done, output) = submit(self.fd, kind, timeout).await;
        error::deliver("File::read", done.rc, done.errno)?;

        Ok(ReadReply {
            rc: done.rc,
            errno: done.errno,
            data: output.into_data(),
            offset: advance(offset, done.rc),
        })
    }

    /// Read into the caller's buffer; the data slot of the reply is
    /// omitted and ownership of the bytes stays with the caller.
    pub async fn read_into(
        &self,
        buffer: &mut [u8],
        offset: u64,
        timeout: Option<Duration>,
    ) -> Result<ReadReply, SysError> {
        let mut reply = self.read(buffer.len(), offset, timeout).await?;

        if let Some(bytes) = reply.data.take() {
            let n = bytes.len().min(buffer.len());
            buffer[..n].copy_from_slice(&bytes[..n]);
        }

        Ok(reply)
    }

    /// Write `data` at `offset`; the reply carries the offset after the
    /// bytes actually written, which may be short.
    pub async fn write(
        &self,
        offset: u64,
        data: &[u8],
        timeout: Option<Duration>,
    ) -> Result<WriteReply, SysError> {
        self.owner.check("File::write");

        if !self.state.writable() || self.fd < 0 {
            error::deliver("File::write", -1, libc::EBADF)?;
            return Ok(WriteReply {
                rc: -1,
                errno: libc::EBADF,
                offset,
            });
        }

        let kind = if self.seekable {
            OpKind::Pwrite {
                buf: data.to_vec(),
                offset,
            }
        } else {
            OpKind::Write { buf: data.to_vec() }
        };

        let (done, _) = submit(self.fd, kind, timeout).await;
        error::deliver("File::write", done.rc, done.errno)?;

        Ok(WriteReply {
            rc: done.rc,
            errno: done.errno,
            offset: advance(offset, done.rc),
        })
    }

    /// Close the descriptor and transition to [`FileState::Closed`].
    pub async fn close(&mut self, timeout: Option<Duration>) -> Result<Completion, SysError> {
        self.owner.check("File::close");

        if self.state == FileState::Closed || self.fd < 0 {
            error::deliver("File::close", -1, libc::EBADF)?;
            return Ok(Completion {
                rc: -1,
                errno: libc::EBADF,
            });
        }

        let (done, _) = submit(self.fd, OpKind::Close, timeout).await;

        if done.rc == 0 {
            self.state = FileState::Closed;
            self.fd = NO_FD;
        } else if !matches!(done.errno, libc::EBADF | libc::EINTR | libc::EIO) {
            // close(2) has no other documented failure; anything else is a
            // system bug we cannot recover from.
            eprintln!("kqio: close({}) returned unexpected errno {}", self.fd, done.errno);
            std::process::abort();
        }

        error::deliver("File::close", done.rc, done.errno)?;
        Ok(done)
    }

    fn read_kind(&self, nbytes: usize, offset: u64) -> OpKind {
        if self.seekable {
            OpKind::Pread {
                buf: vec![0; nbytes],
                offset,
            }
        } else {
            OpKind::Read {
                buf: vec![0; nbytes],
            }
        }
    }
}

impl Drop for File {
    fn drop(&mut self) {
        if self.fd >= 0 {
            sys::close(self.fd);
        }
    }
}

fn advance(offset: u64, rc: isize) -> u64 {
    if rc > 0 { offset + rc as u64 } else { offset }
}
