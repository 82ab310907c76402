//! Result records returned by listing and batch operations.

use std::path::PathBuf;

use serde::Serialize;

use crate::ops::walker::DirectoryEntry;

/// Per-file result of a move, upload or delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferOutcome {
    pub source: PathBuf,
    /// Absent for deletions.
    pub destination: Option<PathBuf>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TransferOutcome {
    pub fn succeeded(source: PathBuf, destination: Option<PathBuf>) -> Self {
        Self {
            source,
            destination,
            success: true,
            error_message: None,
        }
    }

    pub fn failed(source: PathBuf, destination: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            source,
            destination,
            success: false,
            error_message: Some(message.into()),
        }
    }
}

/// Entries reported by `list_directory`.
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryListing {
    pub count: usize,
    pub entries: Vec<DirectoryEntry>,
}

impl DirectoryListing {
    pub fn new(entries: Vec<DirectoryEntry>) -> Self {
        Self {
            count: entries.len(),
            entries,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}
