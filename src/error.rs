use std::path::PathBuf;
use thiserror::Error;

use crate::ops::outcome::TransferOutcome;

/// Which private key source an authentication mode needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    File,
    String,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::File => f.write_str("private key file path"),
            KeySource::String => f.write_str("private key string"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SftpError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported authentication mode '{0}'")]
    UnsupportedAuthMode(String),

    #[error("The {key_source} was not provided for authentication mode '{mode}'")]
    MissingKeyMaterial { mode: String, key_source: KeySource },

    #[error("A password is required for authentication mode '{mode}'")]
    MissingPassword { mode: String },

    #[error("Invalid private key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("Invalid name pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Unsupported encoding '{0}'")]
    UnsupportedEncoding(String),

    #[error("Text contains '{character}', which {encoding} cannot represent")]
    UnmappableCharacter { encoding: String, character: char },

    #[error("Unsupported host fingerprint format: '{0}'")]
    UnsupportedFingerprint(String),

    #[error("Host key verification failed for {host}: {reason}")]
    HostKeyRejected { host: String, reason: String },

    #[error("No response given for server prompt request --> {prompt}")]
    UnansweredPrompt { prompt: String },

    #[error("Path not found: {}", path.display())]
    PathNotFound { path: PathBuf },

    #[error("Destination already exists: {}", path.display())]
    DestinationExists { path: PathBuf },

    #[error("Multiple source files resolve to the same destination: {}", path.display())]
    DuplicateDestination { path: PathBuf },

    #[error("Could not find a free name for {} after {attempts} attempts", path.display())]
    RenameLimitExceeded { path: PathBuf, attempts: u32 },

    #[error("Connection failed to sftp://{host}: {reason}")]
    ConnectionFailed { host: String, reason: String },

    #[error("Authentication failed for user '{user}': {reason}")]
    AuthenticationFailed { user: String, reason: String },

    #[error("SSH error: {source}")]
    Ssh {
        #[from]
        source: ssh2::Error,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{source} ({} file(s) processed before the failure)", outcomes.len())]
    Batch {
        source: Box<SftpError>,
        outcomes: Vec<TransferOutcome>,
    },
}

impl SftpError {
    /// Returns a user-friendly suggestion for how to fix the error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            SftpError::UnsupportedAuthMode(_) => Some(
                "Use one of: password, private-key-file, private-key-string, \
                 password-private-key-file, password-private-key-string.",
            ),
            SftpError::MissingKeyMaterial { .. } => {
                Some("Set private_key_file or private_key_string in the connection profile.")
            }
            SftpError::MissingPassword { .. } => {
                Some("Set password in the connection profile or pass --ask-password.")
            }
            SftpError::InvalidPattern { .. } => {
                Some("Use '*' for any characters and '?' for one or more, e.g. '*.csv'.")
            }
            SftpError::UnmappableCharacter { .. } => {
                Some("Pick an encoding that covers the text, e.g. --encoding utf-8.")
            }
            SftpError::UnsupportedFingerprint(_) => Some(
                "Use an MD5 (aa:bb:.. or 32 hex chars) or SHA-256 (64 hex chars or base64) fingerprint.",
            ),
            SftpError::HostKeyRejected { .. } => Some(
                "The server key does not match the configured fingerprint. \
                 Verify the key with the server administrator before updating the profile.",
            ),
            SftpError::UnansweredPrompt { .. } => {
                Some("Add a prompt_responses entry matching the server prompt.")
            }
            SftpError::PathNotFound { .. } => {
                Some("Check the remote path exists and spelling is correct.")
            }
            SftpError::DestinationExists { .. } | SftpError::DuplicateDestination { .. } => {
                Some("Use --on-conflict overwrite or --on-conflict rename.")
            }
            SftpError::ConnectionFailed { .. } => {
                Some("Check that the host is reachable and the port is correct.")
            }
            SftpError::AuthenticationFailed { .. } => {
                Some("Check the username and credentials in the connection profile.")
            }
            SftpError::Batch { source, .. } => source.suggestion(),
            _ => None,
        }
    }

    /// Outcomes recorded before a batch operation failed, if any.
    pub fn partial_outcomes(&self) -> &[TransferOutcome] {
        match self {
            SftpError::Batch { outcomes, .. } => outcomes,
            _ => &[],
        }
    }

    /// True if this error (or the error that interrupted a batch) is a
    /// missing-path error.
    pub fn is_not_found(&self) -> bool {
        match self {
            SftpError::PathNotFound { .. } => true,
            SftpError::Batch { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for SftpError {
    fn from(err: serde_json::Error) -> Self {
        SftpError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for SftpError {
    fn from(err: toml::de::Error) -> Self {
        SftpError::Config(format!("Invalid connection profile: {}", err))
    }
}
