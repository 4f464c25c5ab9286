//! End-to-end protocol sessions over localhost sockets: a real listener
//! thread on one side, the scanner-driven client on the other.

use std::fs;
use std::io::Write as _;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::thread;

use tempfile::TempDir;

use treesum_core::digest::Digest;
use treesum_core::entry::{Coze, Entry};
use treesum_core::error::Error;
use treesum_core::protocol::{self, Reply};
use treesum_core::scanner::{Peer as _, Scanner};
use treesum_transport::listen::tls_acceptor;
use treesum_transport::{Client, Handler, TlsConfig};

fn spawn_server(base: PathBuf) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        for conn in listener.incoming() {
            let Ok(conn) = conn else { break };
            let base = base.clone();
            thread::spawn(move || {
                if let Ok(mut handler) = Handler::new(conn, base) {
                    let _ = handler.run();
                }
            });
        }
    });
    addr
}

fn local_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.bin"), "hello").unwrap();
    fs::write(dir.path().join("b.bin"), "world").unwrap();
    dir
}

#[test]
fn test_check_aborts_on_missing_remote_file_without_sync() {
    let local = local_tree();
    let remote = TempDir::new().unwrap();
    fs::write(remote.path().join("a.bin"), "hello").unwrap();

    let addr = spawn_server(remote.path().to_path_buf());
    let mut client = Client::connect(addr, "md5").unwrap();
    let mut scanner = Scanner::new("md5").unwrap();

    let err = scanner
        .synchronize(&mut client, local.path(), None, false, |_, _| {})
        .unwrap_err();
    match err {
        Error::NoSuchFile { path } => assert!(path.ends_with("b.bin"), "path {path}"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_sync_flag_copies_missing_file_and_compare_agrees() {
    let local = local_tree();
    let remote = TempDir::new().unwrap();
    fs::write(remote.path().join("a.bin"), "hello").unwrap();

    let addr = spawn_server(remote.path().to_path_buf());
    let mut client = Client::connect(addr, "md5").unwrap();
    let mut scanner = Scanner::new("md5").unwrap();

    let cz = scanner
        .synchronize(&mut client, local.path(), None, true, |_, _| {})
        .unwrap();

    assert_eq!(cz.count, 2);
    assert_eq!(cz.size, 10);
    assert_eq!(fs::read(remote.path().join("b.bin")).unwrap(), b"world");
    assert!(!remote.path().join("b.bin.part").exists());
}

#[test]
fn test_transfer_populates_an_empty_remote() {
    let local = TempDir::new().unwrap();
    fs::create_dir(local.path().join("sub")).unwrap();
    fs::write(local.path().join("a.bin"), "hello").unwrap();
    fs::write(local.path().join("sub/c.bin"), "nested payload").unwrap();

    let remote = TempDir::new().unwrap();
    let addr = spawn_server(remote.path().to_path_buf());
    let mut client = Client::connect(addr, "sha256").unwrap();
    let mut scanner = Scanner::new("sha256").unwrap();

    let cz = scanner
        .transfer(&mut client, local.path(), None, |_, _| {})
        .unwrap();

    assert_eq!(cz.count, 2);
    assert_eq!(fs::read(remote.path().join("a.bin")).unwrap(), b"hello");
    assert_eq!(
        fs::read(remote.path().join("sub/c.bin")).unwrap(),
        b"nested payload"
    );
}

#[test]
fn test_unknown_tag_keeps_the_connection_open() {
    let remote = TempDir::new().unwrap();
    let addr = spawn_server(remote.path().to_path_buf());

    let mut conn = TcpStream::connect(addr).unwrap();
    protocol::write_preamble(&mut conn, "md5").unwrap();
    let opening = Reply::read_from(&mut conn, 16).unwrap();
    assert!(matches!(opening, Reply::Ok { .. }));

    conn.write_all(&[0xff]).unwrap();
    let reply = Reply::read_from(&mut conn, 16).unwrap();
    assert!(matches!(reply, Reply::Unexpected { .. }));

    // The session still answers a well-formed request afterwards.
    let digest = Digest::new("md5").unwrap();
    protocol::write_compare(&mut conn, &Coze::default(), &digest.global()).unwrap();
    let reply = Reply::read_from(&mut conn, 16).unwrap();
    assert!(matches!(reply, Reply::Ok { .. }));
}

#[test]
fn test_check_reports_digest_drift_and_copy_replaces_the_file() {
    let local = TempDir::new().unwrap();
    fs::write(local.path().join("b.bin"), "world").unwrap();

    let remote = TempDir::new().unwrap();
    fs::write(remote.path().join("b.bin"), "WORLD").unwrap();

    let addr = spawn_server(remote.path().to_path_buf());
    let mut client = Client::connect(addr, "md5").unwrap();

    let mut digest = Digest::new("md5").unwrap();
    let source = Entry {
        path: local.path().join("b.bin"),
        size: 5,
    };
    source.compute(&mut digest).unwrap();
    let local_digest = digest.local();

    let entry = Entry {
        path: PathBuf::from("b.bin"),
        size: 5,
    };

    let err = client.check(&entry, &local_digest).unwrap_err();
    assert!(matches!(err, Error::ChecksumMismatch { .. }));
    assert!(err.is_recoverable());

    client
        .copy(&local.path().join("b.bin"), &entry, &local_digest)
        .unwrap();
    assert_eq!(fs::read(remote.path().join("b.bin")).unwrap(), b"world");
}

#[test]
fn test_check_reports_size_mismatch() {
    let remote = TempDir::new().unwrap();
    fs::write(remote.path().join("a.bin"), "hello").unwrap();

    let addr = spawn_server(remote.path().to_path_buf());
    let mut client = Client::connect(addr, "md5").unwrap();

    let entry = Entry {
        path: PathBuf::from("a.bin"),
        size: 9,
    };
    let err = client.check(&entry, &[0u8; 16]).unwrap_err();
    match err {
        Error::SizeMismatch { want, got, .. } => {
            assert_eq!(want, 9);
            assert_eq!(got, 5);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_unknown_algorithm_is_rejected_at_session_open() {
    let remote = TempDir::new().unwrap();
    let addr = spawn_server(remote.path().to_path_buf());

    let mut conn = TcpStream::connect(addr).unwrap();
    protocol::write_preamble(&mut conn, "blake3").unwrap();
    let reply = Reply::read_from(&mut conn, 0).unwrap();
    match reply {
        Reply::Unexpected { message } => assert!(message.contains("blake3"), "{message}"),
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[test]
fn test_tls_acceptor_builds_from_pem_material() {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".into()]).unwrap();

    let dir = TempDir::new().unwrap();
    let pem = dir.path().join("server.pem");
    let key = dir.path().join("server.key");
    fs::write(&pem, certified.cert.pem()).unwrap();
    fs::write(&key, certified.key_pair.serialize_pem()).unwrap();

    // The self-signed certificate doubles as the client-CA bundle; leaving
    // `root` unset would read the host's trust store instead.
    let config = TlsConfig {
        pem: pem.clone(),
        key,
        root: Some(pem),
    };
    assert!(tls_acceptor(&config).is_ok());
}
