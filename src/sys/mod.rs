//! Thin typed wrappers over the raw POSIX surface.
//!
//! Every wrapper returns an `(rc, errno)` pair: `rc` is the syscall return
//! value (−1 on failure) and `errno` is the raw error number, 0 on success.
//! No business logic lives here; callers decide what an error means.

pub(crate) mod addr;

use std::ffi::CStr;
use std::io;
use std::net::SocketAddr;
use std::os::unix::io::RawFd;
use std::ptr;

/// Raw errno of the most recent failed call on this thread.
pub(crate) fn errno() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

fn outcome(rc: isize) -> (isize, i32) {
    if rc < 0 { (-1, errno()) } else { (rc, 0) }
}

pub(crate) fn open(path: &CStr, flags: i32, mode: u32) -> (isize, i32) {
    let rc = unsafe { libc::open(path.as_ptr(), flags, mode as libc::c_uint) };
    outcome(rc as isize)
}

pub(crate) fn close(fd: RawFd) -> (isize, i32) {
    let rc = unsafe { libc::close(fd) };
    outcome(rc as isize)
}

pub(crate) fn read(fd: RawFd, buf: &mut [u8]) -> (isize, i32) {
    let rc = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
    outcome(rc as isize)
}

pub(crate) fn pread(fd: RawFd, buf: &mut [u8], offset: u64) -> (isize, i32) {
    let rc = unsafe {
        libc::pread(
            fd,
            buf.as_mut_ptr() as *mut libc::c_void,
            buf.len(),
            offset as libc::off_t,
        )
    };
    outcome(rc as isize)
}

pub(crate) fn write(fd: RawFd, buf: &[u8]) -> (isize, i32) {
    let rc = unsafe { libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
    outcome(rc as isize)
}

pub(crate) fn pwrite(fd: RawFd, buf: &[u8], offset: u64) -> (isize, i32) {
    let rc = unsafe {
        libc::pwrite(
            fd,
            buf.as_ptr() as *const libc::c_void,
            buf.len(),
            offset as libc::off_t,
        )
    };
    outcome(rc as isize)
}

pub(crate) fn socket(domain: i32, kind: i32) -> (isize, i32) {
    let rc = unsafe { libc::socket(domain, kind, 0) };
    outcome(rc as isize)
}

pub(crate) fn bind(fd: RawFd, address: &SocketAddr) -> (isize, i32) {
    let (storage, len) = addr::encode(address);
    let rc = unsafe { libc::bind(fd, &storage as *const _ as *const libc::sockaddr, len) };
    outcome(rc as isize)
}

pub(crate) fn connect(fd: RawFd, address: &SocketAddr) -> (isize, i32) {
    let (storage, len) = addr::encode(address);
    let rc = unsafe { libc::connect(fd, &storage as *const _ as *const libc::sockaddr, len) };
    outcome(rc as isize)
}

pub(crate) fn listen(fd: RawFd, backlog: i32) -> (isize, i32) {
    let rc = unsafe { libc::listen(fd, backlog) };
    outcome(rc as isize)
}

/// Accept one connection; on success the peer address accompanies the new fd.
pub(crate) fn accept(fd: RawFd) -> (isize, i32, Option<SocketAddr>) {
    let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
    let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
    let rc = unsafe {
        libc::accept(
            fd,
            &mut storage as *mut _ as *mut libc::sockaddr,
            &mut len,
        )
    };
    if rc < 0 {
        return (-1, errno(), None);
    }
    (rc as isize, 0, addr::decode(&storage))
}

pub(crate) fn recv(fd: RawFd, buf: &mut [u8], flags: i32) -> (isize, i32) {
    let rc = unsafe { libc::recv(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), flags) };
    outcome(rc as isize)
}

/// Scatter-gather send with an optional destination; the bottom of the
/// `ssend → sendto → sendmsg` cascade.
pub(crate) fn sendmsg(fd: RawFd, buf: &[u8], flags: i32, dest: Option<&SocketAddr>) -> (isize, i32) {
    let mut iov = libc::iovec {
        iov_base: buf.as_ptr() as *mut libc::c_void,
        iov_len: buf.len(),
    };
    let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;

    let storage;
    if let Some(address) = dest {
        let (packed, len) = addr::encode(address);
        storage = packed;
        msg.msg_name = &storage as *const _ as *mut libc::c_void;
        msg.msg_namelen = len;
    }

    let rc = unsafe { libc::sendmsg(fd, &msg, flags) };
    outcome(rc as isize)
}

/// Pending asynchronous error on a socket, drained via `SO_ERROR`.
pub(crate) fn socket_error(fd: RawFd) -> i32 {
    let mut err: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
    let rc = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_ERROR,
            &mut err as *mut _ as *mut libc::c_void,
            &mut len,
        )
    };
    if rc < 0 { errno() } else { err }
}

pub(crate) fn getsockname(fd: RawFd) -> (isize, i32, Option<SocketAddr>) {
    let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
    let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
    let rc = unsafe {
        libc::getsockname(
            fd,
            &mut storage as *mut _ as *mut libc::sockaddr,
            &mut len,
        )
    };
    if rc < 0 {
        return (-1, errno(), None);
    }
    (0, 0, addr::decode(&storage))
}

pub(crate) fn pipe() -> (isize, i32, [RawFd; 2]) {
    let mut fds = [0 as RawFd; 2];
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if rc < 0 {
        return (-1, errno(), fds);
    }
    (0, 0, fds)
}

pub(crate) fn set_nonblocking(fd: RawFd) {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
    }
}

/// Resolve `host:port` into socket addresses. getaddrinfo failures that do
/// not carry an errno are reported as `EINVAL`.
pub(crate) fn getaddrinfo(host: &CStr, port: u16) -> (isize, i32, Vec<SocketAddr>) {
    let hints = libc::addrinfo {
        ai_flags: 0,
        ai_family: libc::AF_UNSPEC,
        ai_socktype: libc::SOCK_STREAM,
        ai_protocol: 0,
        ai_addrlen: 0,
        ai_canonname: ptr::null_mut(),
        ai_addr: ptr::null_mut(),
        ai_next: ptr::null_mut(),
    };
    let mut list: *mut libc::addrinfo = ptr::null_mut();
    let rc = unsafe { libc::getaddrinfo(host.as_ptr(), ptr::null(), &hints, &mut list) };
    if rc != 0 {
        let err = if rc == libc::EAI_SYSTEM { errno() } else { libc::EINVAL };
        return (-1, err, Vec::new());
    }

    let mut resolved = Vec::new();
    let mut node = list;
    while !node.is_null() {
        let info = unsafe { &*node };
        if !info.ai_addr.is_null() {
            let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
            let len = (info.ai_addrlen as usize).min(std::mem::size_of::<libc::sockaddr_storage>());
            unsafe {
                ptr::copy_nonoverlapping(
                    info.ai_addr as *const u8,
                    &mut storage as *mut _ as *mut u8,
                    len,
                );
            }
            if let Some(mut address) = addr::decode(&storage) {
                address.set_port(port);
                if !resolved.contains(&address) {
                    resolved.push(address);
                }
            }
        }
        node = info.ai_next;
    }
    unsafe { libc::freeaddrinfo(list) };

    (resolved.len() as isize, 0, resolved)
}
