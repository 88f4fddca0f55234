use kqio::RuntimeBuilder;
use kqio::fs::{File, FileState};
use std::time::Duration;

fn pipe() -> (i32, i32) {
    let mut fds = [0i32; 2];
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    assert_eq!(rc, 0, "pipe() failed");
    (fds[0], fds[1])
}

#[test]
fn short_read_then_suspension_until_more_bytes() {
    let mut rt = RuntimeBuilder::new().build();
    let (rfd, wfd) = pipe();

    // Three bytes are available up front; two more arrive later.
    let wrote = unsafe { libc::write(wfd, b"abc".as_ptr() as *const _, 3) };
    assert_eq!(wrote, 3);

    let writer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(10));
        let wrote = unsafe { libc::write(wfd, b"de".as_ptr() as *const _, 2) };
        assert_eq!(wrote, 2);
        unsafe { libc::close(wfd) };
    });

    rt.block_on(async {
        let reader = File::from_raw(rfd, FileState::ReadOnly);

        // Asking for five bytes surfaces the three that exist.
        let first = reader.read(5, 0, None).await.unwrap();
        assert_eq!(first.rc, 3);
        assert_eq!(first.errno, 0);
        assert_eq!(first.data.as_deref(), Some(&b"abc"[..]));
        assert_eq!(first.offset, 3);

        // The pipe is now empty; this read suspends until the writer
        // delivers the rest.
        let second = reader.read(2, first.offset, None).await.unwrap();
        assert_eq!(second.rc, 2);
        assert_eq!(second.data.as_deref(), Some(&b"de"[..]));
        assert_eq!(second.offset, 5);
    });

    writer.join().unwrap();
}

#[test]
fn read_deadline_expires_on_a_silent_pipe() {
    let mut rt = RuntimeBuilder::new().build();
    let (rfd, wfd) = pipe();

    rt.block_on(async {
        let reader = File::from_raw(rfd, FileState::ReadOnly);

        let reply = reader
            .read(1, 0, Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert_eq!((reply.rc, reply.errno), (-1, libc::ETIMEDOUT));
        assert!(reply.data.is_none());
        assert_eq!(reply.offset, 0, "failed read leaves the offset alone");
    });

    unsafe { libc::close(wfd) };
}

#[test]
fn pipe_write_goes_through_the_stream_path() {
    let mut rt = RuntimeBuilder::new().build();
    let (rfd, wfd) = pipe();

    rt.block_on(async {
        let writer = File::from_raw(wfd, FileState::WriteOnly);
        let reply = writer.write(0, b"ping", None).await.unwrap();
        assert_eq!(reply.rc, 4);
        assert_eq!(reply.offset, 4);
    });

    let mut buf = [0u8; 4];
    let got = unsafe { libc::read(rfd, buf.as_mut_ptr() as *mut _, 4) };
    assert_eq!(got, 4);
    assert_eq!(&buf, b"ping");
    unsafe { libc::close(rfd) };
}
