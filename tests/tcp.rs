use kqio::RuntimeBuilder;
use kqio::net::{Socket, SocketState};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream as StdTcpStream};
use std::time::Duration;

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

#[test]
fn accept_two_concurrent_connections() {
    let mut rt = RuntimeBuilder::new().build();

    rt.block_on(async {
        let mut listener = Socket::tcp_v4().expect("socket");
        listener.bind(loopback(), None).await.unwrap();
        listener.listen(16, None).await.unwrap();
        assert_eq!(listener.state(), SocketState::Listening);

        let addr = listener.local_addr().expect("bound address");
        let port = addr.port();

        let clients: Vec<_> = (0..2)
            .map(|i| {
                std::thread::spawn(move || {
                    let mut c =
                        StdTcpStream::connect(("127.0.0.1", port)).expect("connect");
                    c.write_all(&[i as u8]).expect("write");
                })
            })
            .collect();

        let first = listener.accept(None).await.unwrap();
        let second = listener.accept(None).await.unwrap();
        assert_eq!(listener.state(), SocketState::Listening, "parent unchanged");

        for reply in [&first, &second] {
            assert!(reply.rc >= 0);
            let socket = reply.socket.as_ref().expect("accepted socket");
            assert_eq!(socket.state(), SocketState::Connected);
            assert!(reply.addr.is_some(), "peer address normalized");
        }
        assert_ne!(first.rc, second.rc, "distinct descriptors");

        // Each accepted socket carries its client's payload.
        let mut seen = Vec::new();
        for reply in [first, second] {
            let socket = reply.socket.unwrap();
            let data = socket.recv(1, 0, None).await.unwrap();
            assert_eq!(data.rc, 1);
            seen.push(data.data.unwrap()[0]);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1]);

        for client in clients {
            client.join().unwrap();
        }
    });
}

#[test]
fn connect_then_echo_roundtrip() {
    let mut rt = RuntimeBuilder::new().build();

    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").expect("std bind");
    let addr = std_listener.local_addr().unwrap();

    let server = std::thread::spawn(move || {
        let (mut peer, _) = std_listener.accept().expect("std accept");
        let mut buf = [0u8; 4];
        peer.read_exact(&mut buf).expect("read");
        assert_eq!(&buf, b"ping");
        peer.write_all(b"pong").expect("write");
    });

    rt.block_on(async {
        let mut socket = Socket::tcp_v4().expect("socket");

        let connected = socket.connect(addr, None).await.unwrap();
        assert_eq!((connected.rc, connected.errno), (0, 0));
        assert_eq!(socket.state(), SocketState::Connected);

        let sent = socket.ssend(b"ping", 0, None).await.unwrap();
        assert_eq!(sent.rc, 4);

        let reply = socket.recv(4, 0, None).await.unwrap();
        assert_eq!(reply.rc, 4);
        assert_eq!(reply.data.as_deref(), Some(&b"pong"[..]));

        let closed = socket.close(None).await.unwrap();
        assert_eq!((closed.rc, closed.errno), (0, 0));
        assert_eq!(socket.state(), SocketState::Closed);
    });

    server.join().unwrap();
}

#[test]
fn recv_deadline_then_data_arrives() {
    let mut rt = RuntimeBuilder::new().build();

    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").expect("std bind");
    let addr = std_listener.local_addr().unwrap();

    let server = std::thread::spawn(move || {
        let (mut peer, _) = std_listener.accept().expect("std accept");
        // Stay silent long enough for the deadline to fire, then speak.
        std::thread::sleep(Duration::from_millis(150));
        peer.write_all(b"late").expect("write");
        peer
    });

    rt.block_on(async {
        let mut socket = Socket::tcp_v4().expect("socket");
        socket.connect(addr, None).await.unwrap();

        let timed_out = socket
            .recv(4, 0, Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert_eq!((timed_out.rc, timed_out.errno), (-1, libc::ETIMEDOUT));
        assert!(timed_out.data.is_none());

        // Without a deadline the next recv suspends until the bytes land.
        let reply = socket.recv(4, 0, None).await.unwrap();
        assert_eq!(reply.rc, 4);
        assert_eq!(reply.data.as_deref(), Some(&b"late"[..]));
    });

    server.join().unwrap();
}

#[test]
fn recv_into_fills_the_caller_buffer() {
    let mut rt = RuntimeBuilder::new().build();

    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").expect("std bind");
    let addr = std_listener.local_addr().unwrap();

    let server = std::thread::spawn(move || {
        let (mut peer, _) = std_listener.accept().expect("std accept");
        peer.write_all(b"fill").expect("write");
    });

    rt.block_on(async {
        let mut socket = Socket::tcp_v4().expect("socket");
        socket.connect(addr, None).await.unwrap();

        let mut buffer = [0u8; 4];
        let reply = socket.recv_into(&mut buffer, 0, None).await.unwrap();
        assert_eq!(reply.rc, 4);
        assert!(reply.data.is_none(), "data slot omitted for caller buffers");
        assert_eq!(&buffer, b"fill");
    });

    server.join().unwrap();
}
