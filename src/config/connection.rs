//! Declarative connection description for an SFTP session.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::config::types::FileEncoding;
use crate::error::{KeySource, SftpError};

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Connection timeout for the TCP connection and blocking libssh2 calls.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Which credentials authenticate the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AuthMode {
    Password,
    PrivateKeyFile,
    PrivateKeyString,
    PasswordPrivateKeyFile,
    PasswordPrivateKeyString,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Password => "password",
            AuthMode::PrivateKeyFile => "private-key-file",
            AuthMode::PrivateKeyString => "private-key-string",
            AuthMode::PasswordPrivateKeyFile => "password-private-key-file",
            AuthMode::PasswordPrivateKeyString => "password-private-key-string",
        }
    }

    /// The private key source this mode needs, if any.
    pub fn key_source(&self) -> Option<KeySource> {
        match self {
            AuthMode::Password => None,
            AuthMode::PrivateKeyFile | AuthMode::PasswordPrivateKeyFile => Some(KeySource::File),
            AuthMode::PrivateKeyString | AuthMode::PasswordPrivateKeyString => {
                Some(KeySource::String)
            }
        }
    }

    pub fn uses_password(&self) -> bool {
        matches!(
            self,
            AuthMode::Password
                | AuthMode::PasswordPrivateKeyFile
                | AuthMode::PasswordPrivateKeyString
        )
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = SftpError;

    /// Accepts the kebab-case names as well as the PascalCase names used by
    /// older task configurations (`UsernamePasswordPrivateKeyFile`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        let normalized = normalized.strip_prefix("username").unwrap_or(&normalized);
        match normalized {
            "password" => Ok(AuthMode::Password),
            "privatekeyfile" => Ok(AuthMode::PrivateKeyFile),
            "privatekeystring" => Ok(AuthMode::PrivateKeyString),
            "passwordprivatekeyfile" => Ok(AuthMode::PasswordPrivateKeyFile),
            "passwordprivatekeystring" => Ok(AuthMode::PasswordPrivateKeyString),
            _ => Err(SftpError::UnsupportedAuthMode(s.to_string())),
        }
    }
}

impl TryFrom<String> for AuthMode {
    type Error = SftpError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AuthMode> for String {
    fn from(value: AuthMode) -> Self {
        value.as_str().to_string()
    }
}

/// A keyboard-interactive answer: any server prompt containing `prompt`
/// (case-insensitive) is answered with `response`.
#[derive(Clone, Serialize, Deserialize)]
pub struct PromptResponse {
    pub prompt: String,
    pub response: Zeroizing<String>,
}

impl PromptResponse {
    pub fn new(prompt: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            response: Zeroizing::new(response.into()),
        }
    }
}

impl fmt::Debug for PromptResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptResponse")
            .field("prompt", &self.prompt)
            .field("response", &"<redacted>")
            .finish()
    }
}

/// Everything needed to open one session.
///
/// Usually loaded from a connection profile (see
/// [`crate::config::profiles::ProfileStore`]). Secrets are zeroed on drop
/// and never printed by `Debug`.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub auth_mode: AuthMode,
    #[serde(default)]
    pub password: Option<Zeroizing<String>>,
    #[serde(default)]
    pub private_key_file: Option<PathBuf>,
    #[serde(default)]
    pub private_key_string: Option<Zeroizing<String>>,
    #[serde(default)]
    pub passphrase: Option<Zeroizing<String>>,
    #[serde(default)]
    pub keyboard_interactive: bool,
    #[serde(default)]
    pub prompt_responses: Vec<PromptResponse>,
    /// Expected host key fingerprint. Empty or absent skips verification.
    #[serde(default)]
    pub host_fingerprint: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Interval for SSH keep-alive messages; absent disables them.
    #[serde(default)]
    pub keep_alive_interval_secs: Option<u32>,
    #[serde(default)]
    pub encoding: FileEncoding,
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

impl ConnectionDescriptor {
    /// A descriptor with every optional field at its default.
    pub fn new(address: impl Into<String>, username: impl Into<String>, auth_mode: AuthMode) -> Self {
        Self {
            address: address.into(),
            port: DEFAULT_SSH_PORT,
            username: username.into(),
            auth_mode,
            password: None,
            private_key_file: None,
            private_key_string: None,
            passphrase: None,
            keyboard_interactive: false,
            prompt_responses: Vec::new(),
            host_fingerprint: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            keep_alive_interval_secs: None,
            encoding: FileEncoding::Utf8,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Zeroizing::new(password.into()));
        self
    }

    pub fn with_private_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key_file = Some(path.into());
        self
    }

    pub fn with_private_key_string(mut self, key: impl Into<String>) -> Self {
        self.private_key_string = Some(Zeroizing::new(key.into()));
        self
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(Zeroizing::new(passphrase.into()));
        self
    }

    pub fn with_keyboard_interactive(mut self, responses: Vec<PromptResponse>) -> Self {
        self.keyboard_interactive = true;
        self.prompt_responses = responses;
        self
    }

    pub fn with_host_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.host_fingerprint = Some(fingerprint.into());
        self
    }

    /// `host:port`, using the default SSH port when `port` is 0.
    pub fn socket_address(&self) -> String {
        let port = if self.port == 0 { DEFAULT_SSH_PORT } else { self.port };
        format!("{}:{}", self.address, port)
    }

    /// Zero falls back to the default; a zero timeout is rejected by
    /// `TcpStream::connect_timeout`.
    pub fn connect_timeout(&self) -> Duration {
        match self.connect_timeout_secs {
            0 => Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            secs => Duration::from_secs(secs),
        }
    }

    /// Expected fingerprint, treating blank strings as absent.
    pub fn expected_fingerprint(&self) -> Option<&str> {
        self.host_fingerprint
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |present: bool| if present { "<redacted>" } else { "<none>" };
        f.debug_struct("ConnectionDescriptor")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("auth_mode", &self.auth_mode)
            .field("password", &redact(self.password.is_some()))
            .field("private_key_file", &self.private_key_file)
            .field("private_key_string", &redact(self.private_key_string.is_some()))
            .field("passphrase", &redact(self.passphrase.is_some()))
            .field("keyboard_interactive", &self.keyboard_interactive)
            .field("prompt_responses", &self.prompt_responses)
            .field("host_fingerprint", &self.host_fingerprint)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("keep_alive_interval_secs", &self.keep_alive_interval_secs)
            .field("encoding", &self.encoding)
            .finish()
    }
}
