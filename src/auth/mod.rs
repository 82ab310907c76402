//! Authentication method negotiation.
//!
//! [`build_auth_chain`] turns a [`ConnectionDescriptor`] into the ordered
//! list of methods the transport attempts: keyboard-interactive (when
//! enabled), then password, then private key. All validation happens here,
//! before any socket is opened.

pub mod prompt;

use std::fmt;

use zeroize::Zeroizing;

use crate::config::connection::{ConnectionDescriptor, PromptResponse};
use crate::error::{KeySource, SftpError};

pub use prompt::InteractivePromptResolver;

/// Private key bytes plus the passphrase that decrypts them.
#[derive(Clone)]
pub struct PrivateKeyMaterial {
    key: Zeroizing<String>,
    passphrase: Option<Zeroizing<String>>,
}

impl PrivateKeyMaterial {
    /// Wrap raw key bytes. libssh2 takes keys as text, so the bytes must be
    /// valid UTF-8 (PEM and OpenSSH formats always are).
    pub fn from_bytes(
        bytes: Vec<u8>,
        passphrase: Option<Zeroizing<String>>,
    ) -> Result<Self, SftpError> {
        let key = String::from_utf8(bytes).map_err(|_| {
            SftpError::InvalidKeyMaterial("private key is not a text (PEM/OpenSSH) key".into())
        })?;
        let key = Zeroizing::new(key);
        if key.trim().is_empty() {
            return Err(SftpError::InvalidKeyMaterial("private key is empty".into()));
        }
        Ok(Self {
            key,
            passphrase: passphrase.filter(|p| !p.is_empty()),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// `None` means the key is used unencrypted.
    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_deref().map(String::as_str)
    }
}

impl fmt::Debug for PrivateKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeyMaterial")
            .field("key", &"<redacted>")
            .field("encrypted", &self.passphrase.is_some())
            .finish()
    }
}

/// One authentication attempt the transport can make.
#[derive(Clone)]
pub enum AuthMethod {
    KeyboardInteractive {
        password: Option<Zeroizing<String>>,
        responses: Vec<PromptResponse>,
    },
    Password(Zeroizing<String>),
    PrivateKey(PrivateKeyMaterial),
}

impl AuthMethod {
    /// SSH method name as listed by the server.
    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::KeyboardInteractive { .. } => "keyboard-interactive",
            AuthMethod::Password(_) => "password",
            AuthMethod::PrivateKey(_) => "publickey",
        }
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::KeyboardInteractive { responses, .. } => f
                .debug_struct("KeyboardInteractive")
                .field("responses", responses)
                .finish(),
            AuthMethod::Password(_) => f.write_str("Password(<redacted>)"),
            AuthMethod::PrivateKey(key) => f.debug_tuple("PrivateKey").field(key).finish(),
        }
    }
}

/// Ordered, immutable list of methods for one user.
#[derive(Debug, Clone)]
pub struct AuthMethodChain {
    username: String,
    methods: Vec<AuthMethod>,
}

impl AuthMethodChain {
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn methods(&self) -> &[AuthMethod] {
        &self.methods
    }

    pub fn method_names(&self) -> Vec<&'static str> {
        self.methods.iter().map(AuthMethod::name).collect()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Build the authentication chain for `descriptor`.
///
/// Fails with [`SftpError::MissingKeyMaterial`] when the mode needs a key
/// and its source is empty, and with [`SftpError::MissingPassword`] when a
/// password mode has no password. Key files are read from local disk; no
/// network I/O happens.
pub fn build_auth_chain(descriptor: &ConnectionDescriptor) -> Result<AuthMethodChain, SftpError> {
    let mode = descriptor.auth_mode;

    if descriptor.username.trim().is_empty() {
        return Err(SftpError::Config("username is required".into()));
    }

    // Presence checks first, so nothing is read or parsed for an
    // incomplete descriptor.
    if let Some(source) = mode.key_source() {
        if !key_source_present(descriptor, source) {
            return Err(SftpError::MissingKeyMaterial {
                mode: mode.to_string(),
                key_source: source,
            });
        }
    }
    let password = descriptor
        .password
        .clone()
        .filter(|p| !p.is_empty());
    if mode.uses_password() && password.is_none() {
        return Err(SftpError::MissingPassword {
            mode: mode.to_string(),
        });
    }

    let mut methods = Vec::with_capacity(3);

    if descriptor.keyboard_interactive {
        methods.push(AuthMethod::KeyboardInteractive {
            password: password.clone(),
            responses: descriptor.prompt_responses.clone(),
        });
    }

    if mode.uses_password() {
        if let Some(password) = password {
            methods.push(AuthMethod::Password(password));
        }
    }

    if let Some(source) = mode.key_source() {
        methods.push(AuthMethod::PrivateKey(load_private_key(descriptor, source)?));
    }

    tracing::debug!(
        user = %descriptor.username,
        mode = %mode,
        methods = ?methods.iter().map(AuthMethod::name).collect::<Vec<_>>(),
        "Built authentication chain"
    );

    Ok(AuthMethodChain {
        username: descriptor.username.clone(),
        methods,
    })
}

fn key_source_present(descriptor: &ConnectionDescriptor, source: KeySource) -> bool {
    match source {
        KeySource::File => descriptor
            .private_key_file
            .as_ref()
            .is_some_and(|p| !p.as_os_str().is_empty()),
        KeySource::String => descriptor
            .private_key_string
            .as_ref()
            .is_some_and(|k| !k.trim().is_empty()),
    }
}

fn load_private_key(
    descriptor: &ConnectionDescriptor,
    source: KeySource,
) -> Result<PrivateKeyMaterial, SftpError> {
    let bytes = match source {
        KeySource::File => {
            let path = descriptor.private_key_file.as_deref().ok_or_else(|| {
                SftpError::MissingKeyMaterial {
                    mode: descriptor.auth_mode.to_string(),
                    key_source: source,
                }
            })?;
            std::fs::read(path).map_err(|e| {
                SftpError::InvalidKeyMaterial(format!(
                    "cannot read private key file {}: {}",
                    path.display(),
                    e
                ))
            })?
        }
        KeySource::String => descriptor
            .private_key_string
            .as_ref()
            .map(|k| k.as_bytes().to_vec())
            .unwrap_or_default(),
    };
    PrivateKeyMaterial::from_bytes(bytes, descriptor.passphrase.clone())
}
