pub mod local;
pub mod sftp;

use std::path::{Path, PathBuf};

use crate::error::SftpError;

/// Metadata about a file or directory.
#[derive(Debug, Clone, Default)]
pub struct FileStat {
    pub size: u64,
    pub is_dir: bool,
    pub is_file: bool,
    pub modified: Option<std::time::SystemTime>,
    pub accessed: Option<std::time::SystemTime>,
    pub permissions: Option<u32>,
}

/// Entry in a directory listing.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: PathBuf,
    pub stat: FileStat,
}

/// File system operations the file operations and walker need.
///
/// Paths are remote-style (`/` separated). Implementations map a missing
/// path to [`SftpError::PathNotFound`] so callers can tell it apart from
/// other failures.
///
/// Synchronous trait -- libssh2 is blocking.
pub trait RemoteFs {
    /// Get file/directory metadata.
    fn stat(&self, path: &Path) -> Result<FileStat, SftpError>;

    /// True if `path` exists. Any error other than not-found propagates.
    fn exists(&self, path: &Path) -> Result<bool, SftpError> {
        match self.stat(path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// List directory contents (non-recursive). May include `.` and `..`.
    fn list_dir(&self, path: &Path) -> Result<Vec<FileEntry>, SftpError>;

    /// Rename `from` to `to`. Fails if `to` already exists.
    fn rename(&self, from: &Path, to: &Path) -> Result<(), SftpError>;

    fn remove_file(&self, path: &Path) -> Result<(), SftpError>;

    /// Create a single directory level.
    fn mkdir(&self, path: &Path) -> Result<(), SftpError>;

    /// Write `data` to `path`, truncating unless `append` is set.
    fn write(&self, path: &Path, data: &[u8], append: bool) -> Result<(), SftpError>;

    /// Read the whole file.
    fn read(&self, path: &Path) -> Result<Vec<u8>, SftpError>;
}

/// Every ancestor of `path`, shortest first, ending with `path` itself.
pub(crate) fn path_components(path: &Path) -> Vec<PathBuf> {
    let mut components = Vec::new();
    let mut current = PathBuf::new();
    for component in path.components() {
        current.push(component);
        components.push(current.clone());
    }
    components
}
