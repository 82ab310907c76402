use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::backend::{FileEntry, FileStat, RemoteFs};
use crate::error::SftpError;

/// Local filesystem backend rooted at a directory.
///
/// Remote-style paths such as `/in/a.txt` resolve to `<root>/in/a.txt`;
/// `..` never climbs above the root. Used for tests and for running the
/// file operations against a local mirror.
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalFs { root: root.into() }
    }

    /// Map a remote-style path to a path under the root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        let mut relative = PathBuf::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::ParentDir => {
                    relative.pop();
                }
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            }
        }
        self.root.join(relative)
    }
}

/// Convert std::fs::Metadata to FileStat.
fn metadata_to_stat(meta: &std::fs::Metadata) -> FileStat {
    #[cfg(unix)]
    let permissions = {
        use std::os::unix::fs::PermissionsExt;
        Some(meta.permissions().mode())
    };

    #[cfg(not(unix))]
    let permissions = None;

    FileStat {
        size: meta.len(),
        is_dir: meta.is_dir(),
        is_file: meta.is_file(),
        modified: meta.modified().ok(),
        accessed: meta.accessed().ok(),
        permissions,
    }
}

/// Map an io::Error to an SftpError, reporting the remote-style path.
fn map_io_error(err: std::io::Error, path: &Path) -> SftpError {
    match err.kind() {
        std::io::ErrorKind::NotFound => SftpError::PathNotFound {
            path: path.to_path_buf(),
        },
        _ => SftpError::Io { source: err },
    }
}

impl RemoteFs for LocalFs {
    fn stat(&self, path: &Path) -> Result<FileStat, SftpError> {
        let meta = std::fs::metadata(self.resolve(path)).map_err(|e| map_io_error(e, path))?;
        Ok(metadata_to_stat(&meta))
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<FileEntry>, SftpError> {
        let read_dir = std::fs::read_dir(self.resolve(path)).map_err(|e| map_io_error(e, path))?;

        let mut entries = Vec::new();
        for entry_result in read_dir {
            let entry = entry_result.map_err(|e| map_io_error(e, path))?;
            let entry_path = path.join(entry.file_name());
            let meta = entry
                .metadata()
                .map_err(|e| map_io_error(e, &entry_path))?;

            entries.push(FileEntry {
                path: entry_path,
                stat: metadata_to_stat(&meta),
            });
        }

        // read_dir order is platform-dependent
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), SftpError> {
        let target = self.resolve(to);
        if target.exists() {
            return Err(SftpError::DestinationExists {
                path: to.to_path_buf(),
            });
        }
        std::fs::rename(self.resolve(from), target).map_err(|e| map_io_error(e, from))
    }

    fn remove_file(&self, path: &Path) -> Result<(), SftpError> {
        std::fs::remove_file(self.resolve(path)).map_err(|e| map_io_error(e, path))
    }

    fn mkdir(&self, path: &Path) -> Result<(), SftpError> {
        std::fs::create_dir(self.resolve(path)).map_err(|e| map_io_error(e, path))
    }

    fn write(&self, path: &Path, data: &[u8], append: bool) -> Result<(), SftpError> {
        let mut options = OpenOptions::new();
        options.create(true);
        if append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let mut file = options
            .open(self.resolve(path))
            .map_err(|e| map_io_error(e, path))?;
        file.write_all(data)?;
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, SftpError> {
        std::fs::read(self.resolve(path)).map_err(|e| map_io_error(e, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_stays_under_root() {
        let fs = LocalFs::new("/srv/mirror");
        assert_eq!(fs.resolve(Path::new("/in/a.txt")), PathBuf::from("/srv/mirror/in/a.txt"));
        assert_eq!(fs.resolve(Path::new("in/./a.txt")), PathBuf::from("/srv/mirror/in/a.txt"));
        assert_eq!(fs.resolve(Path::new("/../../etc/passwd")), PathBuf::from("/srv/mirror/etc/passwd"));
        assert_eq!(fs.resolve(Path::new("/")), PathBuf::from("/srv/mirror"));
    }

    #[test]
    fn stat_nonexistent_returns_path_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFs::new(dir.path());
        match fs.stat(Path::new("/missing.txt")) {
            Err(SftpError::PathNotFound { path }) => assert_eq!(path, PathBuf::from("/missing.txt")),
            other => panic!("Expected PathNotFound, got: {:?}", other),
        }
        assert!(!fs.exists(Path::new("/missing.txt")).unwrap());
    }

    #[test]
    fn list_dir_reports_remote_paths_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("in")).unwrap();
        std::fs::write(dir.path().join("in/b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("in/a.txt"), "aa").unwrap();
        let fs = LocalFs::new(dir.path());

        let entries = fs.list_dir(Path::new("/in")).unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("/in/a.txt"), PathBuf::from("/in/b.txt")]);
        assert_eq!(entries[0].stat.size, 2);
        assert!(entries[0].stat.is_file);
    }

    #[test]
    fn rename_refuses_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        let fs = LocalFs::new(dir.path());
        assert!(matches!(
            fs.rename(Path::new("/a.txt"), Path::new("/b.txt")),
            Err(SftpError::DestinationExists { .. })
        ));
        fs.rename(Path::new("/a.txt"), Path::new("/c.txt")).unwrap();
        assert!(dir.path().join("c.txt").exists());
    }

    #[test]
    fn write_truncates_or_appends() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFs::new(dir.path());
        fs.write(Path::new("/log.txt"), b"one", false).unwrap();
        fs.write(Path::new("/log.txt"), b"two", true).unwrap();
        assert_eq!(fs.read(Path::new("/log.txt")).unwrap(), b"onetwo");
        fs.write(Path::new("/log.txt"), b"three", false).unwrap();
        assert_eq!(fs.read(Path::new("/log.txt")).unwrap(), b"three");
    }
}
