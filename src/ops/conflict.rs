//! Destination conflict resolution for move, rename, write and upload.
//!
//! The resolver is pure: existence is queried through a caller-supplied
//! closure so the same logic runs against a live SFTP session or a local
//! directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::types::FileConflictPolicy;
use crate::error::SftpError;

/// Upper bound on `name(n).ext` candidates tried under the rename policy.
pub const MAX_RENAME_ATTEMPTS: u32 = 10_000;

/// Where a file should be written and whether something must be replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub path: PathBuf,
    /// The resolved path is occupied; the caller deletes or overwrites it.
    pub replace_existing: bool,
}

impl Resolution {
    fn fresh(path: PathBuf) -> Self {
        Self {
            path,
            replace_existing: false,
        }
    }
}

/// A batch entry after planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTransfer {
    pub source: PathBuf,
    pub resolution: Resolution,
}

/// Resolve the destination for a single file.
///
/// - Throw: an existing `dest` is [`SftpError::DestinationExists`].
/// - Overwrite: `dest` is returned unchanged with `replace_existing` set
///   when it exists.
/// - Rename: the first free `{dir(dest)}/{stem(source)}(n){ext(source)}`.
pub fn resolve<F>(
    policy: FileConflictPolicy,
    source: &Path,
    dest: &Path,
    mut exists: F,
) -> Result<Resolution, SftpError>
where
    F: FnMut(&Path) -> Result<bool, SftpError>,
{
    if !exists(dest)? {
        return Ok(Resolution::fresh(dest.to_path_buf()));
    }

    match policy {
        FileConflictPolicy::Throw => Err(SftpError::DestinationExists {
            path: dest.to_path_buf(),
        }),
        FileConflictPolicy::Overwrite => Ok(Resolution {
            path: dest.to_path_buf(),
            replace_existing: true,
        }),
        FileConflictPolicy::Rename => {
            let renamed = find_unique_name(source, dest, exists)?;
            tracing::debug!("Renamed: {} -> {}", dest.display(), renamed.display());
            Ok(Resolution::fresh(renamed))
        }
    }
}

/// Generate `stem(1).ext`, `stem(2).ext`, ... next to `dest` until one is
/// free.
pub fn find_unique_name<F>(source: &Path, dest: &Path, mut exists: F) -> Result<PathBuf, SftpError>
where
    F: FnMut(&Path) -> Result<bool, SftpError>,
{
    let named = if source.file_name().is_some() { source } else { dest };
    let stem = named.file_stem().unwrap_or_default().to_string_lossy();
    let ext = named
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let parent = dest.parent().unwrap_or_else(|| Path::new(""));

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let candidate = parent.join(format!("{}({}){}", stem, i, ext));
        if !exists(&candidate)? {
            return Ok(candidate);
        }
    }

    Err(SftpError::RenameLimitExceeded {
        path: dest.to_path_buf(),
        attempts: MAX_RENAME_ATTEMPTS,
    })
}

/// Resolve every `(source, dest)` pair of a batch before anything is moved.
///
/// Under Throw the first existing or duplicated destination rejects the
/// whole batch. Under Rename, destinations already planned count as taken.
/// Under Overwrite a duplicated destination is replaced by the later entry.
pub fn plan_batch<F>(
    policy: FileConflictPolicy,
    pairs: &[(PathBuf, PathBuf)],
    mut exists: F,
) -> Result<Vec<PlannedTransfer>, SftpError>
where
    F: FnMut(&Path) -> Result<bool, SftpError>,
{
    let mut planned: HashSet<PathBuf> = HashSet::with_capacity(pairs.len());
    let mut plan = Vec::with_capacity(pairs.len());

    for (source, dest) in pairs {
        let resolution = match policy {
            FileConflictPolicy::Throw => {
                if planned.contains(dest) {
                    return Err(SftpError::DuplicateDestination { path: dest.clone() });
                }
                resolve(policy, source, dest, &mut exists)?
            }
            FileConflictPolicy::Overwrite => {
                if planned.contains(dest) {
                    Resolution {
                        path: dest.clone(),
                        replace_existing: true,
                    }
                } else {
                    resolve(policy, source, dest, &mut exists)?
                }
            }
            FileConflictPolicy::Rename => resolve(policy, source, dest, |p: &Path| {
                Ok(planned.contains(p) || exists(p)?)
            })?,
        };

        planned.insert(resolution.path.clone());
        plan.push(PlannedTransfer {
            source: source.clone(),
            resolution,
        });
    }

    Ok(plan)
}
