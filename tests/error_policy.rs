use kqio::fs::File;
use kqio::net::Socket;
use kqio::{Errno, ErrorPolicy, RuntimeBuilder, config};
use std::net::SocketAddr;

// The error policy is process-wide, so everything exercising it lives in
// one test function.
#[test]
fn errors_mode_delivers_typed_errors() {
    let mut rt = RuntimeBuilder::new()
        .error_policy(ErrorPolicy::Errors)
        .build();

    rt.block_on(async {
        let missing = File::open("/nonexistent/kqio/surely/not", libc::O_RDONLY, 0, None).await;
        let err = missing.expect_err("open of a missing file must error");
        assert_eq!(err.kind, Errno::NotFound);
        assert_eq!(err.errno, libc::ENOENT);
        assert_eq!(err.op, "File::open");

        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let mut socket = Socket::tcp_v4().expect("socket");
        socket.bind(addr, None).await.expect("first bind");

        let err = socket
            .bind(addr, None)
            .await
            .expect_err("second bind must error");
        assert_eq!(err.kind, Errno::InvalidArgument);
        assert_eq!(err.op, "Socket::bind");

        // Switching mid-flight affects only subsequent operations.
        config::set_error_policy(ErrorPolicy::ReturnCodes);
        let reply = socket.bind(addr, None).await.expect("tuple mode");
        assert_eq!((reply.rc, reply.errno), (-1, libc::EINVAL));
    });

    config::set_error_policy(ErrorPolicy::ReturnCodes);
}
