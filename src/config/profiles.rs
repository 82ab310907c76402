//! Named connection profiles.
//!
//! Profiles live in `connections.toml` within the sftpkit config directory,
//! one `[connections.<name>]` table per server.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::connection::ConnectionDescriptor;
use crate::error::SftpError;

/// Serialized profile file format.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProfileFile {
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionDescriptor>,
}

/// In-memory view of a profile file.
pub struct ProfileStore {
    path: PathBuf,
    data: ProfileFile,
}

impl ProfileStore {
    /// Load profiles from `connections.toml` in the given config directory.
    ///
    /// Returns an empty store if the file does not exist.
    pub fn load(config_dir: &Path) -> Result<Self, SftpError> {
        let path = config_dir.join("connections.toml");
        if !path.exists() {
            return Ok(Self {
                path,
                data: ProfileFile::default(),
            });
        }
        Self::load_file(&path)
    }

    /// Load profiles from an explicit file. A missing file is an error here
    /// because the caller named it.
    pub fn load_file(path: &Path) -> Result<Self, SftpError> {
        if !path.exists() {
            return Err(SftpError::Config(format!(
                "Profile file not found: {}",
                path.display()
            )));
        }
        let contents = std::fs::read_to_string(path)?;
        let data = toml::from_str(&contents)
            .map_err(|e| SftpError::Config(format!("Invalid {}: {}", path.display(), e)))?;
        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    /// Look up a profile by name.
    pub fn get(&self, name: &str) -> Result<&ConnectionDescriptor, SftpError> {
        self.data.connections.get(name).ok_or_else(|| {
            SftpError::Config(format!(
                "No connection profile named '{}' in {}",
                name,
                self.path.display()
            ))
        })
    }

    /// Return all stored profiles, sorted by name.
    pub fn list(&self) -> &BTreeMap<String, ConnectionDescriptor> {
        &self.data.connections
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
