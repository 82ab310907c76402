//! Directory listing with name patterns and optional recursion.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local, Utc};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::backend::{FileEntry, RemoteFs};
use crate::config::types::IncludeType;
use crate::error::SftpError;

/// Wildcard name filter.
///
/// `*` matches any run of characters (including none) and `?` matches one
/// or more characters. Every other character is literal. Matching is
/// case-insensitive and anchored to the whole name.
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    regex: Option<Regex>,
}

impl NamePattern {
    /// An empty pattern matches everything.
    pub fn new(pattern: &str) -> Result<Self, SftpError> {
        if pattern.is_empty() {
            return Ok(Self::any());
        }
        let regex = RegexBuilder::new(&glob_to_regex(pattern))
            .case_insensitive(true)
            .build()
            .map_err(|e| SftpError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            source: pattern.to_string(),
            regex: Some(regex),
        })
    }

    pub fn any() -> Self {
        Self {
            source: String::new(),
            regex: None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.regex {
            None => true,
            Some(regex) => regex.is_match(name),
        }
    }
}

impl Default for NamePattern {
    fn default() -> Self {
        Self::any()
    }
}

/// Translate a wildcard pattern into an anchored regular expression.
pub fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    let mut buf = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push_str(".+"),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    out.push('$');
    out
}

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub pattern: NamePattern,
    pub include_type: IncludeType,
    pub recursive: bool,
}

/// One reported file or directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub full_path: PathBuf,
    pub is_directory: bool,
    pub is_file: bool,
    pub size: u64,
    pub last_write_utc: Option<DateTime<Utc>>,
    pub last_access_utc: Option<DateTime<Utc>>,
}

impl DirectoryEntry {
    fn from_file_entry(entry: FileEntry, name: String) -> Self {
        Self {
            name,
            full_path: entry.path,
            is_directory: entry.stat.is_dir,
            is_file: entry.stat.is_file,
            size: entry.stat.size,
            last_write_utc: entry.stat.modified.map(to_utc),
            last_access_utc: entry.stat.accessed.map(to_utc),
        }
    }

    pub fn last_write_local(&self) -> Option<DateTime<Local>> {
        self.last_write_utc.map(|t| t.with_timezone(&Local))
    }
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

/// Walks a directory tree through a [`RemoteFs`].
pub struct DirectoryWalker<'a, F: RemoteFs + ?Sized> {
    fs: &'a F,
    cancel: &'a CancellationToken,
}

impl<'a, F: RemoteFs + ?Sized> DirectoryWalker<'a, F> {
    pub fn new(fs: &'a F, cancel: &'a CancellationToken) -> Self {
        Self { fs, cancel }
    }

    /// List `path`, descending into subdirectories when
    /// `options.recursive` is set.
    ///
    /// A start directory that does not exist is
    /// [`SftpError::PathNotFound`].
    pub fn list(&self, path: &Path, options: &ListOptions) -> Result<Vec<DirectoryEntry>, SftpError> {
        let mut found = Vec::new();
        self.walk(path, options, &mut found)?;
        tracing::debug!(
            path = %path.display(),
            pattern = options.pattern.as_str(),
            recursive = options.recursive,
            count = found.len(),
            "Listed directory"
        );
        Ok(found)
    }

    fn walk(
        &self,
        dir: &Path,
        options: &ListOptions,
        found: &mut Vec<DirectoryEntry>,
    ) -> Result<(), SftpError> {
        for entry in self.fs.list_dir(dir)? {
            if self.cancel.is_cancelled() {
                return Err(SftpError::Cancelled);
            }

            let name = match entry.path.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };
            if name == "." || name == ".." {
                continue;
            }

            let descend = options.recursive && entry.stat.is_dir;
            let child = entry.path.clone();

            if options.include_type.accepts(entry.stat.is_dir) && options.pattern.matches(&name) {
                found.push(DirectoryEntry::from_file_entry(entry, name));
            }

            // Subdirectories are walked whether or not they were reported.
            if descend {
                self.walk(&child, options, found)?;
            }
        }
        Ok(())
    }
}
