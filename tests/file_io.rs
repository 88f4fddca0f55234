use kqio::RuntimeBuilder;
use kqio::fs::{File, FileState};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(tag: &str) -> String {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock drift")
        .as_nanos();

    std::env::temp_dir()
        .join(format!("kqio-{tag}-{}-{unique}.tmp", std::process::id()))
        .to_string_lossy()
        .into_owned()
}

#[test]
fn file_write_read_roundtrip_at_offsets() {
    let mut rt = RuntimeBuilder::new().build();
    let path = temp_path("roundtrip");

    rt.block_on(async {
        let mut file = File::open(&path, libc::O_CREAT | libc::O_RDWR, 0o644, None)
            .await
            .expect("open delivered")
            .expect("open succeeded");
        assert_eq!(file.state(), FileState::ReadWrite);

        let wrote = file.write(0, b"hello", None).await.expect("write delivered");
        assert_eq!(wrote.rc, 5);
        assert_eq!(wrote.errno, 0);
        assert_eq!(wrote.offset, 5);

        let read = file.read(5, 0, None).await.expect("read delivered");
        assert_eq!(read.rc, 5);
        assert_eq!(read.errno, 0);
        assert_eq!(read.data.as_deref(), Some(&b"hello"[..]));
        assert_eq!(read.offset, 5);

        let closed = file.close(None).await.expect("close delivered");
        assert_eq!((closed.rc, closed.errno), (0, 0));
        assert_eq!(file.state(), FileState::Closed);
    });

    let _ = std::fs::remove_file(&path);
}

#[test]
fn bytes_survive_a_close_and_reopen() {
    let mut rt = RuntimeBuilder::new().build();
    let path = temp_path("reopen");

    rt.block_on(async {
        let mut writer = File::open(&path, libc::O_CREAT | libc::O_WRONLY, 0o644, None)
            .await
            .unwrap()
            .expect("create file");
        writer.write(0, b"abc", None).await.unwrap();
        writer.write(3, b"def", None).await.unwrap();
        writer.close(None).await.unwrap();

        let mut reader = File::open(&path, libc::O_RDONLY, 0, None)
            .await
            .unwrap()
            .expect("reopen file");
        let reply = reader.read(6, 0, None).await.unwrap();
        assert_eq!(reply.data.as_deref(), Some(&b"abcdef"[..]));
        reader.close(None).await.unwrap();
    });

    let _ = std::fs::remove_file(&path);
}

#[test]
fn failed_read_leaves_the_offset_unchanged() {
    let mut rt = RuntimeBuilder::new().build();
    let path = temp_path("offsets");

    rt.block_on(async {
        let mut file = File::open(&path, libc::O_CREAT | libc::O_RDWR, 0o644, None)
            .await
            .unwrap()
            .expect("create file");

        // Reading past EOF returns rc 0 and must not advance.
        let reply = file.read(8, 100, None).await.unwrap();
        assert_eq!(reply.rc, 0);
        assert_eq!(reply.offset, 100);

        file.close(None).await.unwrap();
    });

    let _ = std::fs::remove_file(&path);
}

#[test]
fn wrong_access_mode_is_rejected_with_ebadf() {
    let mut rt = RuntimeBuilder::new().build();
    let path = temp_path("modes");

    rt.block_on(async {
        let mut readonly = File::open(&path, libc::O_CREAT | libc::O_RDONLY, 0o644, None)
            .await
            .unwrap()
            .expect("create file");
        assert_eq!(readonly.state(), FileState::ReadOnly);

        let reply = readonly.write(0, b"nope", None).await.unwrap();
        assert_eq!((reply.rc, reply.errno), (-1, libc::EBADF));
        assert_eq!(reply.offset, 0);

        readonly.close(None).await.unwrap();

        let mut writeonly = File::open(&path, libc::O_WRONLY, 0, None)
            .await
            .unwrap()
            .expect("reopen write-only");
        assert_eq!(writeonly.state(), FileState::WriteOnly);

        let reply = writeonly.read(4, 0, None).await.unwrap();
        assert_eq!((reply.rc, reply.errno), (-1, libc::EBADF));

        writeonly.close(None).await.unwrap();
    });

    let _ = std::fs::remove_file(&path);
}

#[test]
fn every_operation_after_close_returns_ebadf() {
    let mut rt = RuntimeBuilder::new().build();
    let path = temp_path("closed");

    rt.block_on(async {
        let mut file = File::open(&path, libc::O_CREAT | libc::O_RDWR, 0o644, None)
            .await
            .unwrap()
            .expect("create file");
        file.close(None).await.unwrap();

        let read = file.read(1, 0, None).await.unwrap();
        assert_eq!((read.rc, read.errno), (-1, libc::EBADF));

        let write = file.write(0, b"x", None).await.unwrap();
        assert_eq!((write.rc, write.errno), (-1, libc::EBADF));

        let close = file.close(None).await.unwrap();
        assert_eq!((close.rc, close.errno), (-1, libc::EBADF));
    });

    let _ = std::fs::remove_file(&path);
}

#[test]
fn caller_buffer_omits_the_data_slot() {
    let mut rt = RuntimeBuilder::new().build();
    let path = temp_path("buffer");

    rt.block_on(async {
        let mut file = File::open(&path, libc::O_CREAT | libc::O_RDWR, 0o644, None)
            .await
            .unwrap()
            .expect("create file");
        file.write(0, b"payload", None).await.unwrap();

        let mut buffer = [0u8; 7];
        let reply = file.read_into(&mut buffer, 0, None).await.unwrap();
        assert_eq!(reply.rc, 7);
        assert!(reply.data.is_none(), "data slot omitted for caller buffers");
        assert_eq!(&buffer, b"payload");

        file.close(None).await.unwrap();
    });

    let _ = std::fs::remove_file(&path);
}

#[test]
fn missing_file_opens_as_none_under_return_codes() {
    let mut rt = RuntimeBuilder::new().build();

    rt.block_on(async {
        let file = File::open("/nonexistent/kqio/surely/not", libc::O_RDONLY, 0, None)
            .await
            .expect("return-codes policy never errors");
        assert!(file.is_none());
    });
}
