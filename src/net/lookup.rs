//! Host name resolution through the request protocol.

use crate::error::{self, SysError};
use crate::reactor::request::{NO_FD, OpKind};
use crate::reactor::submit;

use std::ffi::CString;
use std::net::SocketAddr;
use std::time::Duration;

/// Reply of a resolution; `rc` is the number of addresses found.
#[derive(Debug)]
pub struct ResolveReply {
    pub rc: isize,
    pub errno: i32,
    pub addrs: Vec<SocketAddr>,
}

/// Resolve `host` into socket addresses carrying `port`.
pub async fn resolve(
    host: &str,
    port: u16,
    timeout: Option<Duration>,
) -> Result<ResolveReply, SysError> {
    let Ok(c_host) = CString::new(host) else {
        error::deliver("net::resolve", -1, libc::EINVAL)?;
        return Ok(ResolveReply {
            rc: -1,
            errno: libc::EINVAL,
            addrs: Vec::new(),
        });
    };

    let (done, output) = submit(
        NO_FD,
        OpKind::Getaddrinfo {
            host: c_host,
            port,
        },
        timeout,
    )
    .await;
    error::deliver("net::resolve", done.rc, done.errno)?;

    Ok(ResolveReply {
        rc: done.rc,
        errno: done.errno,
        addrs: output.into_resolved(),
    })
}
