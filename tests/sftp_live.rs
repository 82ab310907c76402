//! Tests against a real SFTP server.
//!
//! Marked `#[ignore]`; run with `cargo test -- --ignored` after setting
//! `SFTPKIT_TEST_HOST`, `SFTPKIT_TEST_USER`, `SFTPKIT_TEST_PASSWORD` and
//! optionally `SFTPKIT_TEST_PORT` and `SFTPKIT_TEST_FINGERPRINT`.

use std::path::{Path, PathBuf};

use sftpkit::config::types::{FileConflictPolicy, MissingDirectory};
use sftpkit::ops::{self, ListOptions, MoveRequest, NamePattern, WriteOptions};
use sftpkit::{AuthMode, ConnectionDescriptor, RemoteFs, SftpError, SftpSession};
use tokio_util::sync::CancellationToken;

fn descriptor() -> ConnectionDescriptor {
    let var = |name: &str| std::env::var(name).unwrap_or_else(|_| panic!("{name} is not set"));
    let mut d = ConnectionDescriptor::new(
        var("SFTPKIT_TEST_HOST"),
        var("SFTPKIT_TEST_USER"),
        AuthMode::Password,
    )
    .with_password(var("SFTPKIT_TEST_PASSWORD"));
    if let Ok(port) = std::env::var("SFTPKIT_TEST_PORT") {
        d.port = port.parse().unwrap();
    }
    if let Ok(fp) = std::env::var("SFTPKIT_TEST_FINGERPRINT") {
        d = d.with_host_fingerprint(fp);
    }
    d
}

fn scratch_dir() -> PathBuf {
    let stamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis();
    PathBuf::from(format!("/tmp/sftpkit-test-{}", stamp))
}

#[test]
#[ignore]
fn write_move_list_delete_round_trip() {
    let cancel = CancellationToken::new();
    let session = SftpSession::connect(&descriptor(), &cancel).unwrap();
    let root = scratch_dir();
    let inbox = root.join("in");
    let outbox = root.join("out");
    ops::create_dir_all(&session, &inbox).unwrap();
    ops::create_dir_all(&session, &outbox).unwrap();

    ops::write_file(&session, &inbox.join("test.txt"), "one", &WriteOptions::default()).unwrap();
    ops::write_file(&session, &outbox.join("test.txt"), "old", &WriteOptions::default()).unwrap();

    let request = MoveRequest {
        pattern: NamePattern::new("*.txt").unwrap(),
        policy: FileConflictPolicy::Rename,
        ..MoveRequest::new(&inbox, &outbox)
    };
    let moved = ops::move_files(&session, &request, &cancel).unwrap();
    assert_eq!(moved[0].destination, Some(outbox.join("test(1).txt")));

    let listing = ops::list_directory(
        &session,
        &root,
        &ListOptions {
            recursive: true,
            ..ListOptions::default()
        },
        MissingDirectory::Throw,
        &cancel,
    )
    .unwrap();
    assert_eq!(listing.count, 4);

    let deleted = ops::delete_files(
        &session,
        &ops::DeleteRequest {
            recursive: true,
            ..ops::DeleteRequest::new(&root, NamePattern::any())
        },
        &cancel,
    )
    .unwrap();
    assert_eq!(deleted.len(), 2);
    session.close().unwrap();
}

#[test]
#[ignore]
fn missing_remote_path_is_path_not_found() {
    let session = SftpSession::connect(&descriptor(), &CancellationToken::new()).unwrap();
    let missing = Path::new("/definitely/not/here");
    assert!(matches!(session.stat(missing), Err(SftpError::PathNotFound { .. })));
    assert!(!session.exists(missing).unwrap());
}

#[test]
#[ignore]
fn wrong_fingerprint_is_rejected() {
    let d = descriptor().with_host_fingerprint("ab".repeat(32));
    match SftpSession::connect(&d, &CancellationToken::new()) {
        Err(SftpError::HostKeyRejected { reason, .. }) => assert!(reason.contains(&"ab".repeat(32))),
        Err(other) => panic!("Expected HostKeyRejected, got {:?}", other),
        Ok(_) => panic!("Expected rejection"),
    }
}
