//! File operations over a [`RemoteFs`]: list, move, rename, write, read,
//! upload, delete and recursive mkdir.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::backend::{path_components, RemoteFs};
use crate::config::types::{FileConflictPolicy, FileEncoding, IncludeType, MissingDirectory};
use crate::error::SftpError;
use crate::ops::conflict::{plan_batch, resolve};
use crate::ops::outcome::{DirectoryListing, TransferOutcome};
use crate::ops::walker::{DirectoryWalker, ListOptions, NamePattern};

/// List a directory. Under [`MissingDirectory::Skip`] a missing start
/// directory yields an empty listing.
pub fn list_directory<F: RemoteFs + ?Sized>(
    fs: &F,
    path: &Path,
    options: &ListOptions,
    missing: MissingDirectory,
    cancel: &CancellationToken,
) -> Result<DirectoryListing, SftpError> {
    match DirectoryWalker::new(fs, cancel).list(path, options) {
        Ok(entries) => Ok(DirectoryListing::new(entries)),
        Err(SftpError::PathNotFound { path: missing_path })
            if missing == MissingDirectory::Skip && missing_path == path =>
        {
            tracing::debug!("Skipping missing directory {}", path.display());
            Ok(DirectoryListing::empty())
        }
        Err(e) => Err(e),
    }
}

#[derive(Debug, Clone)]
pub struct MoveRequest {
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    pub pattern: NamePattern,
    pub policy: FileConflictPolicy,
    pub create_target_dir: bool,
    pub missing_source: MissingDirectory,
}

impl MoveRequest {
    pub fn new(source_dir: impl Into<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            target_dir: target_dir.into(),
            pattern: NamePattern::any(),
            policy: FileConflictPolicy::default(),
            create_target_dir: false,
            missing_source: MissingDirectory::default(),
        }
    }
}

/// Move the files directly under `source_dir` that match the pattern into
/// `target_dir`.
///
/// Destinations are planned for the whole batch first, so a Throw conflict
/// leaves everything in place. A failure after the first file has moved is
/// reported as [`SftpError::Batch`] with the outcomes so far.
pub fn move_files<F: RemoteFs + ?Sized>(
    fs: &F,
    request: &MoveRequest,
    cancel: &CancellationToken,
) -> Result<Vec<TransferOutcome>, SftpError> {
    let options = ListOptions {
        pattern: request.pattern.clone(),
        include_type: IncludeType::File,
        recursive: false,
    };
    let listing = list_directory(fs, &request.source_dir, &options, request.missing_source, cancel)?;
    if listing.entries.is_empty() {
        tracing::info!(
            "No files in {} match '{}'",
            request.source_dir.display(),
            request.pattern.as_str()
        );
        return Ok(Vec::new());
    }

    if request.create_target_dir {
        create_dir_all(fs, &request.target_dir)?;
    } else if !fs.exists(&request.target_dir)? {
        return Err(SftpError::PathNotFound {
            path: request.target_dir.clone(),
        });
    }

    // A file already at its destination is left alone under every policy;
    // planning it would delete (Overwrite) or rename (Rename) the source.
    let (unchanged, pairs): (Vec<_>, Vec<_>) = listing
        .entries
        .iter()
        .map(|e| (e.full_path.clone(), request.target_dir.join(&e.name)))
        .partition(|(source, dest)| source == dest);
    let plan = plan_batch(request.policy, &pairs, |p: &Path| fs.exists(p))?;

    let mut outcomes = Vec::with_capacity(unchanged.len() + plan.len());
    for (source, dest) in unchanged {
        tracing::debug!("{} is already in {}", source.display(), request.target_dir.display());
        outcomes.push(TransferOutcome::succeeded(source, Some(dest)));
    }
    for planned in plan {
        if cancel.is_cancelled() {
            return Err(interrupted(SftpError::Cancelled, outcomes));
        }
        let dest = planned.resolution.path;
        let step = (|| {
            if planned.resolution.replace_existing {
                fs.remove_file(&dest)?;
            }
            fs.rename(&planned.source, &dest)
        })();
        if let Err(e) = step {
            return Err(interrupted(e, outcomes));
        }
        tracing::debug!("Moved {} -> {}", planned.source.display(), dest.display());
        outcomes.push(TransferOutcome::succeeded(planned.source, Some(dest)));
    }

    tracing::info!(
        "Moved {} file(s) to {}",
        outcomes.len(),
        request.target_dir.display()
    );
    Ok(outcomes)
}

/// Attach partial outcomes once at least one file has been processed.
fn interrupted(err: SftpError, outcomes: Vec<TransferOutcome>) -> SftpError {
    if outcomes.is_empty() {
        err
    } else {
        SftpError::Batch {
            source: Box::new(err),
            outcomes,
        }
    }
}

/// Rename `path` to `new_name` inside the same directory and return the
/// final path.
pub fn rename_file<F: RemoteFs + ?Sized>(
    fs: &F,
    path: &Path,
    new_name: &str,
    policy: FileConflictPolicy,
) -> Result<PathBuf, SftpError> {
    validate_bare_name(new_name)?;
    // Surfaces PathNotFound for a missing source.
    fs.stat(path)?;

    let parent = path.parent().unwrap_or_else(|| Path::new("/"));
    let dest = parent.join(new_name);
    if dest == path {
        return Ok(dest);
    }

    let resolution = resolve(policy, &dest, &dest, |p: &Path| fs.exists(p))?;
    if resolution.replace_existing {
        fs.remove_file(&resolution.path)?;
    }
    fs.rename(path, &resolution.path)?;
    tracing::debug!("Renamed {} -> {}", path.display(), resolution.path.display());
    Ok(resolution.path)
}

fn validate_bare_name(name: &str) -> Result<(), SftpError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(SftpError::Config(format!(
            "'{}' is not a valid file name; give a name without directories",
            name
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub encoding: FileEncoding,
    pub policy: FileConflictPolicy,
    /// Append to an existing file instead of applying the conflict policy.
    pub append: bool,
}

/// Write text to `path` and return the path actually written.
pub fn write_file<F: RemoteFs + ?Sized>(
    fs: &F,
    path: &Path,
    content: &str,
    options: &WriteOptions,
) -> Result<PathBuf, SftpError> {
    if options.append && fs.exists(path)? {
        let bytes = options.encoding.encode_continuation(content)?;
        fs.write(path, &bytes, true)?;
        tracing::debug!("Appended {} bytes to {}", bytes.len(), path.display());
        return Ok(path.to_path_buf());
    }

    let bytes = options.encoding.encode(content)?;
    let resolution = resolve(options.policy, path, path, |p: &Path| fs.exists(p))?;
    fs.write(&resolution.path, &bytes, false)?;
    tracing::debug!(
        "Wrote {} bytes ({}) to {}",
        bytes.len(),
        options.encoding.label(),
        resolution.path.display()
    );
    Ok(resolution.path)
}

/// Read a file and decode it as text.
pub fn read_file<F: RemoteFs + ?Sized>(
    fs: &F,
    path: &Path,
    encoding: &FileEncoding,
) -> Result<String, SftpError> {
    let bytes = fs.read(path)?;
    encoding.decode(&bytes)
}

/// Copy a local file into `remote_dir`, keeping its name.
pub fn upload_file<F: RemoteFs + ?Sized>(
    fs: &F,
    local_path: &Path,
    remote_dir: &Path,
    policy: FileConflictPolicy,
) -> Result<TransferOutcome, SftpError> {
    let name = local_path.file_name().ok_or_else(|| {
        SftpError::Config(format!("'{}' does not name a file", local_path.display()))
    })?;
    let data = std::fs::read(local_path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SftpError::PathNotFound {
            path: local_path.to_path_buf(),
        },
        _ => SftpError::Io { source: e },
    })?;

    let dest = remote_dir.join(name);
    let resolution = resolve(policy, local_path, &dest, |p: &Path| fs.exists(p))?;
    fs.write(&resolution.path, &data, false)?;
    tracing::debug!(
        "Uploaded {} ({} bytes) -> {}",
        local_path.display(),
        data.len(),
        resolution.path.display()
    );
    Ok(TransferOutcome::succeeded(
        local_path.to_path_buf(),
        Some(resolution.path),
    ))
}

#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub dir: PathBuf,
    pub pattern: NamePattern,
    pub recursive: bool,
    pub missing: MissingDirectory,
}

impl DeleteRequest {
    pub fn new(dir: impl Into<PathBuf>, pattern: NamePattern) -> Self {
        Self {
            dir: dir.into(),
            pattern,
            recursive: false,
            missing: MissingDirectory::default(),
        }
    }
}

/// Delete files matching the pattern. Directories are never removed.
///
/// A file that disappears between listing and removal is recorded as a
/// failed outcome; any other error interrupts the batch.
pub fn delete_files<F: RemoteFs + ?Sized>(
    fs: &F,
    request: &DeleteRequest,
    cancel: &CancellationToken,
) -> Result<Vec<TransferOutcome>, SftpError> {
    let options = ListOptions {
        pattern: request.pattern.clone(),
        include_type: IncludeType::File,
        recursive: request.recursive,
    };
    let listing = list_directory(fs, &request.dir, &options, request.missing, cancel)?;

    let mut outcomes = Vec::with_capacity(listing.count);
    for entry in listing.entries {
        if cancel.is_cancelled() {
            return Err(interrupted(SftpError::Cancelled, outcomes));
        }
        match fs.remove_file(&entry.full_path) {
            Ok(()) => {
                tracing::debug!("Deleted {}", entry.full_path.display());
                outcomes.push(TransferOutcome::succeeded(entry.full_path, None));
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("{} vanished before it could be deleted", entry.full_path.display());
                outcomes.push(TransferOutcome::failed(entry.full_path, None, e.to_string()));
            }
            Err(e) => return Err(interrupted(e, outcomes)),
        }
    }
    Ok(outcomes)
}

/// Create `path` and every missing ancestor, shortest first.
pub fn create_dir_all<F: RemoteFs + ?Sized>(fs: &F, path: &Path) -> Result<(), SftpError> {
    for ancestor in path_components(path) {
        match fs.stat(&ancestor) {
            Ok(stat) if stat.is_dir => continue,
            Ok(_) => {
                return Err(SftpError::Config(format!(
                    "'{}' exists and is not a directory",
                    ancestor.display()
                )))
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!("Creating directory {}", ancestor.display());
                fs.mkdir(&ancestor)?;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
