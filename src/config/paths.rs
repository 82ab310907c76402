//! Platform-specific config directory helper.
//!
//! Uses the `dirs` crate to resolve the platform-appropriate directory:
//! - Linux:   `~/.config/sftpkit/`
//! - Windows: `%APPDATA%\sftpkit\`
//! - macOS:   `~/Library/Application Support/sftpkit/`

use std::path::PathBuf;

use crate::error::SftpError;

/// Get the sftpkit config directory, creating it if needed.
pub fn sftpkit_config_dir() -> Result<PathBuf, SftpError> {
    let base = dirs::config_dir()
        .ok_or_else(|| SftpError::Config("Could not determine config directory".into()))?;
    let dir = base.join("sftpkit");
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}
