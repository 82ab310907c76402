//! File operation tests against a local directory through `LocalFs`.
//!
//! These exercise the same code paths the SFTP session uses; only the
//! `RemoteFs` implementation differs.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

use sftpkit::backend::{FileEntry, FileStat};
use sftpkit::config::types::{FileConflictPolicy, IncludeType, MissingDirectory};
use sftpkit::ops::{
    delete_files, list_directory, move_files, DeleteRequest, ListOptions, MoveRequest, NamePattern,
};
use sftpkit::{LocalFs, RemoteFs, SftpError};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Helper: create a file with given content under the temp root.
fn create_file_in(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// `/data` with three files and `subDir` holding three more.
fn scenario_tree() -> (TempDir, LocalFs) {
    let dir = TempDir::new().unwrap();
    for name in ["a.txt", "b.txt", "c.csv"] {
        create_file_in(&dir, &format!("data/{}", name), name);
    }
    for name in ["d.txt", "e.txt", "f.log"] {
        create_file_in(&dir, &format!("data/subDir/{}", name), name);
    }
    let local = LocalFs::new(dir.path());
    (dir, local)
}

fn list(local: &LocalFs, options: &ListOptions) -> Vec<PathBuf> {
    let listing = list_directory(
        local,
        Path::new("/data"),
        options,
        MissingDirectory::Throw,
        &CancellationToken::new(),
    )
    .unwrap();
    assert_eq!(listing.count, listing.entries.len());
    listing.entries.into_iter().map(|e| e.full_path).collect()
}

// ============================================================================
// Listing
// ============================================================================

#[test]
fn non_recursive_listing_reports_files_and_subdirectory() {
    let (_dir, local) = scenario_tree();
    let entries = list(&local, &ListOptions::default());
    assert_eq!(entries.len(), 4);
    assert!(entries.contains(&PathBuf::from("/data/subDir")));
}

#[test]
fn recursive_listing_reports_everything() {
    let (_dir, local) = scenario_tree();
    let options = ListOptions {
        recursive: true,
        ..ListOptions::default()
    };
    let entries = list(&local, &options);
    assert_eq!(entries.len(), 7);
    assert!(entries.contains(&PathBuf::from("/data/subDir/f.log")));
}

#[test]
fn recursive_file_listing_still_descends() {
    let (_dir, local) = scenario_tree();
    let options = ListOptions {
        include_type: IncludeType::File,
        recursive: true,
        ..ListOptions::default()
    };
    assert_eq!(list(&local, &options).len(), 6);
}

#[test]
fn directory_only_listing() {
    let (_dir, local) = scenario_tree();
    let options = ListOptions {
        include_type: IncludeType::Directory,
        recursive: true,
        ..ListOptions::default()
    };
    assert_eq!(list(&local, &options), vec![PathBuf::from("/data/subDir")]);
}

#[test]
fn pattern_filters_by_bare_name_at_every_depth() {
    let (_dir, local) = scenario_tree();
    let options = ListOptions {
        pattern: NamePattern::new("*.TXT").unwrap(),
        include_type: IncludeType::Both,
        recursive: true,
    };
    let entries = list(&local, &options);
    assert_eq!(entries.len(), 4);
    assert!(entries.iter().all(|p| p.extension().unwrap() == "txt"));
}

#[test]
fn listing_missing_directory_is_path_not_found() {
    let dir = TempDir::new().unwrap();
    let local = LocalFs::new(dir.path());
    let err = list_directory(
        &local,
        Path::new("/absent"),
        &ListOptions::default(),
        MissingDirectory::Throw,
        &CancellationToken::new(),
    )
    .unwrap_err();
    match err {
        SftpError::PathNotFound { path } => assert_eq!(path, PathBuf::from("/absent")),
        other => panic!("Expected PathNotFound, got {:?}", other),
    }
}

#[test]
fn cancelled_listing_stops() {
    let (_dir, local) = scenario_tree();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = list_directory(
        &local,
        Path::new("/data"),
        &ListOptions::default(),
        MissingDirectory::Throw,
        &cancel,
    )
    .unwrap_err();
    assert!(matches!(err, SftpError::Cancelled));
}

#[test]
fn listing_entries_carry_metadata() {
    let (_dir, local) = scenario_tree();
    let listing = list_directory(
        &local,
        Path::new("/data"),
        &ListOptions {
            pattern: NamePattern::new("a.txt").unwrap(),
            ..ListOptions::default()
        },
        MissingDirectory::Throw,
        &CancellationToken::new(),
    )
    .unwrap();
    let entry = &listing.entries[0];
    assert_eq!(entry.name, "a.txt");
    assert!(entry.is_file);
    assert!(!entry.is_directory);
    assert_eq!(entry.size, 5);
    assert!(entry.last_write_utc.is_some());
    assert!(entry.last_write_local().is_some());
}

// ============================================================================
// Move
// ============================================================================

fn move_request(pattern: &str, policy: FileConflictPolicy) -> MoveRequest {
    MoveRequest {
        pattern: NamePattern::new(pattern).unwrap(),
        policy,
        ..MoveRequest::new("/in", "/out")
    }
}

#[test]
fn rename_policy_move_picks_increasing_suffixes() {
    let dir = TempDir::new().unwrap();
    create_file_in(&dir, "out/test.txt", "original");
    let local = LocalFs::new(dir.path());
    let cancel = CancellationToken::new();

    create_file_in(&dir, "in/test.txt", "first");
    let first = move_files(&local, &move_request("test.txt", FileConflictPolicy::Rename), &cancel)
        .unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].destination, Some(PathBuf::from("/out/test(1).txt")));

    create_file_in(&dir, "in/test.txt", "second");
    let second = move_files(&local, &move_request("test.txt", FileConflictPolicy::Rename), &cancel)
        .unwrap();
    assert_eq!(second[0].destination, Some(PathBuf::from("/out/test(2).txt")));

    assert_eq!(fs::read_to_string(dir.path().join("out/test.txt")).unwrap(), "original");
    assert_eq!(fs::read_to_string(dir.path().join("out/test(1).txt")).unwrap(), "first");
    assert_eq!(fs::read_to_string(dir.path().join("out/test(2).txt")).unwrap(), "second");
}

#[test]
fn throw_policy_rejects_whole_batch_before_moving() {
    let dir = TempDir::new().unwrap();
    for name in ["a.txt", "b.txt", "c.txt"] {
        create_file_in(&dir, &format!("in/{}", name), name);
    }
    create_file_in(&dir, "out/c.txt", "already there");
    let local = LocalFs::new(dir.path());

    let err = move_files(
        &local,
        &move_request("*.txt", FileConflictPolicy::Throw),
        &CancellationToken::new(),
    )
    .unwrap_err();
    assert!(matches!(err, SftpError::DestinationExists { ref path } if path == Path::new("/out/c.txt")));

    // Nothing moved, including files listed before the conflicting one.
    for name in ["a.txt", "b.txt", "c.txt"] {
        assert!(dir.path().join("in").join(name).exists(), "{name} should stay");
    }
    assert!(!dir.path().join("out/a.txt").exists());
}

#[test]
fn overwrite_policy_replaces_destination() {
    let dir = TempDir::new().unwrap();
    create_file_in(&dir, "in/a.txt", "new");
    create_file_in(&dir, "out/a.txt", "old");
    let local = LocalFs::new(dir.path());

    let moved = move_files(
        &local,
        &move_request("*", FileConflictPolicy::Overwrite),
        &CancellationToken::new(),
    )
    .unwrap();
    assert_eq!(moved.len(), 1);
    assert!(moved[0].success);
    assert_eq!(fs::read_to_string(dir.path().join("out/a.txt")).unwrap(), "new");
    assert!(!dir.path().join("in/a.txt").exists());
}

#[test]
fn move_only_takes_top_level_files() {
    let dir = TempDir::new().unwrap();
    create_file_in(&dir, "in/a.txt", "a");
    create_file_in(&dir, "in/nested/b.txt", "b");
    let local = LocalFs::new(dir.path());

    let request = MoveRequest {
        create_target_dir: true,
        ..MoveRequest::new("/in", "/archive/2024/01")
    };
    let moved = move_files(&local, &request, &CancellationToken::new()).unwrap();
    assert_eq!(moved.len(), 1);
    assert!(dir.path().join("archive/2024/01/a.txt").exists());
    assert!(dir.path().join("in/nested/b.txt").exists());
}

#[test]
fn move_from_missing_source_honours_skip() {
    let dir = TempDir::new().unwrap();
    let local = LocalFs::new(dir.path());
    let request = MoveRequest {
        missing_source: MissingDirectory::Skip,
        ..MoveRequest::new("/in", "/out")
    };
    let moved = move_files(&local, &request, &CancellationToken::new()).unwrap();
    assert!(moved.is_empty());

    let err = move_files(&local, &MoveRequest::new("/in", "/out"), &CancellationToken::new())
        .unwrap_err();
    assert!(err.is_not_found());
}

// ============================================================================
// Delete
// ============================================================================

#[test]
fn delete_matching_files_recursively_keeps_directories() {
    let (dir, local) = scenario_tree();
    let request = DeleteRequest {
        recursive: true,
        ..DeleteRequest::new("/data", NamePattern::new("*.txt").unwrap())
    };
    let deleted = delete_files(&local, &request, &CancellationToken::new()).unwrap();
    assert_eq!(deleted.len(), 4);
    assert!(deleted.iter().all(|o| o.success && o.destination.is_none()));
    assert!(dir.path().join("data/c.csv").exists());
    assert!(dir.path().join("data/subDir/f.log").exists());
    assert!(dir.path().join("data/subDir").is_dir());
}

#[test]
fn delete_in_missing_directory() {
    let dir = TempDir::new().unwrap();
    let local = LocalFs::new(dir.path());
    let skip = DeleteRequest {
        missing: MissingDirectory::Skip,
        ..DeleteRequest::new("/gone", NamePattern::any())
    };
    assert!(delete_files(&local, &skip, &CancellationToken::new())
        .unwrap()
        .is_empty());

    let throw = DeleteRequest::new("/gone", NamePattern::any());
    assert!(delete_files(&local, &throw, &CancellationToken::new())
        .unwrap_err()
        .is_not_found());
}

// ============================================================================
// Batches interrupted partway
// ============================================================================

/// What `Flaky` does on the n-th mutating call (rename or remove_file).
enum Fault {
    /// Fail with an I/O error.
    Error,
    /// Cancel the token, then let the call go through.
    Cancel(CancellationToken),
}

/// `LocalFs` wrapper that injects a fault on one mutating call.
struct Flaky {
    inner: LocalFs,
    fail_on: usize,
    calls: Cell<usize>,
    fault: Fault,
}

impl Flaky {
    fn new(root: &Path, fail_on: usize, fault: Fault) -> Self {
        Self {
            inner: LocalFs::new(root),
            fail_on,
            calls: Cell::new(0),
            fault,
        }
    }

    fn mutate(&self) -> Result<(), SftpError> {
        let n = self.calls.get() + 1;
        self.calls.set(n);
        if n != self.fail_on {
            return Ok(());
        }
        match &self.fault {
            Fault::Error => Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into()),
            Fault::Cancel(token) => {
                token.cancel();
                Ok(())
            }
        }
    }
}

impl RemoteFs for Flaky {
    fn stat(&self, path: &Path) -> Result<FileStat, SftpError> {
        self.inner.stat(path)
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<FileEntry>, SftpError> {
        self.inner.list_dir(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), SftpError> {
        self.mutate()?;
        self.inner.rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> Result<(), SftpError> {
        self.mutate()?;
        self.inner.remove_file(path)
    }

    fn mkdir(&self, path: &Path) -> Result<(), SftpError> {
        self.inner.mkdir(path)
    }

    fn write(&self, path: &Path, data: &[u8], append: bool) -> Result<(), SftpError> {
        self.inner.write(path, data, append)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, SftpError> {
        self.inner.read(path)
    }
}

fn three_inbox_files() -> TempDir {
    let dir = TempDir::new().unwrap();
    for name in ["a.txt", "b.txt", "c.txt"] {
        create_file_in(&dir, &format!("in/{}", name), name);
    }
    fs::create_dir(dir.path().join("out")).unwrap();
    dir
}

#[test]
fn move_failing_on_second_file_reports_first_outcome() {
    let dir = three_inbox_files();
    let flaky = Flaky::new(dir.path(), 2, Fault::Error);

    let err = move_files(&flaky, &MoveRequest::new("/in", "/out"), &CancellationToken::new())
        .unwrap_err();
    match &err {
        SftpError::Batch { source, outcomes } => {
            assert!(matches!(**source, SftpError::Io { .. }));
            assert_eq!(outcomes.len(), 1);
        }
        other => panic!("Expected Batch, got {:?}", other),
    }
    let partial = err.partial_outcomes();
    assert_eq!(partial.len(), 1);
    assert_eq!(partial[0].source, PathBuf::from("/in/a.txt"));
    assert_eq!(partial[0].destination, Some(PathBuf::from("/out/a.txt")));
    assert!(dir.path().join("out/a.txt").exists());
    assert!(dir.path().join("in/b.txt").exists());
}

#[test]
fn delete_failing_on_second_file_reports_first_outcome() {
    let dir = three_inbox_files();
    let flaky = Flaky::new(dir.path(), 2, Fault::Error);

    let err = delete_files(
        &flaky,
        &DeleteRequest::new("/in", NamePattern::any()),
        &CancellationToken::new(),
    )
    .unwrap_err();
    assert!(matches!(err, SftpError::Batch { .. }), "got {:?}", err);
    let partial = err.partial_outcomes();
    assert_eq!(partial.len(), 1);
    assert_eq!(partial[0].source, PathBuf::from("/in/a.txt"));
    assert!(partial[0].success);
    assert!(!dir.path().join("in/a.txt").exists());
    assert!(dir.path().join("in/b.txt").exists());
}

#[test]
fn failure_on_first_file_is_not_wrapped() {
    let dir = three_inbox_files();
    let flaky = Flaky::new(dir.path(), 1, Fault::Error);

    let err = move_files(&flaky, &MoveRequest::new("/in", "/out"), &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, SftpError::Io { .. }), "got {:?}", err);
    assert!(err.partial_outcomes().is_empty());
}

#[test]
fn cancel_after_first_move_reports_batch() {
    let dir = three_inbox_files();
    let cancel = CancellationToken::new();
    let flaky = Flaky::new(dir.path(), 1, Fault::Cancel(cancel.clone()));

    let err = move_files(&flaky, &MoveRequest::new("/in", "/out"), &cancel).unwrap_err();
    match &err {
        SftpError::Batch { source, outcomes } => {
            assert!(matches!(**source, SftpError::Cancelled));
            assert_eq!(outcomes.len(), 1);
        }
        other => panic!("Expected Batch, got {:?}", other),
    }
    assert!(dir.path().join("out/a.txt").exists());
    assert!(dir.path().join("in/b.txt").exists());
    assert!(dir.path().join("in/c.txt").exists());
}

#[test]
fn cancel_after_first_delete_reports_batch() {
    let dir = three_inbox_files();
    let cancel = CancellationToken::new();
    let flaky = Flaky::new(dir.path(), 1, Fault::Cancel(cancel.clone()));

    let err = delete_files(&flaky, &DeleteRequest::new("/in", NamePattern::any()), &cancel)
        .unwrap_err();
    assert!(matches!(err, SftpError::Batch { ref source, .. } if matches!(**source, SftpError::Cancelled)));
    assert_eq!(err.partial_outcomes().len(), 1);
    assert!(dir.path().join("in/b.txt").exists());
}
