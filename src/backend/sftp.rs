//! SFTP transport using the ssh2 crate (libssh2 bindings).
//!
//! [`SftpSession::connect`] runs the whole connection sequence:
//!
//! 1. Build the authentication chain and classify the expected host key
//!    fingerprint. Configuration errors surface here, before any socket
//!    is opened.
//! 2. TCP connect with the configured timeout, then the SSH handshake.
//! 3. Host key gate: the raw key is checked by [`TrustVerifier`]. A
//!    rejected key disconnects the session.
//! 4. Authentication methods are tried in chain order until the session
//!    reports success.
//! 5. The SFTP subsystem is opened.
//!
//! # Thread safety
//!
//! `libssh2` is **not** thread-safe. ssh2 serialises access to the raw
//! session internally, but a session is still used from one thread at a
//! time; every operation here is blocking.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

use ssh2::{ErrorCode, OpenFlags, OpenType, RenameFlags, Session, Sftp};
use tokio_util::sync::CancellationToken;

use crate::auth::prompt::PromptAdapter;
use crate::auth::{build_auth_chain, AuthMethod, AuthMethodChain, InteractivePromptResolver};
use crate::backend::{FileEntry, FileStat, RemoteFs};
use crate::config::connection::ConnectionDescriptor;
use crate::error::SftpError;
use crate::trust::{ExpectedFingerprint, HostKeyEvent, TrustVerifier};

/// SFTP status code for a missing file.
const SSH_FX_NO_SUCH_FILE: i32 = 2;
/// SFTP status code for a missing path component.
const SSH_FX_NO_SUCH_PATH: i32 = 10;

const FILE_MODE: i32 = 0o644;
const DIR_MODE: i32 = 0o755;

/// An authenticated SSH session with its SFTP channel.
pub struct SftpSession {
    session: Session,
    sftp: Sftp,
    host: String,
}

impl SftpSession {
    /// Connect, verify the host key and authenticate.
    pub fn connect(
        descriptor: &ConnectionDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Self, SftpError> {
        let host = descriptor.address.clone();

        let chain = build_auth_chain(descriptor)?;
        if let Some(expected) = descriptor.expected_fingerprint() {
            ExpectedFingerprint::parse(expected)?;
        }
        let verifier = TrustVerifier::new(descriptor.expected_fingerprint());

        if cancel.is_cancelled() {
            return Err(SftpError::Cancelled);
        }

        let tcp = open_tcp(descriptor)?;

        let mut session = Session::new().map_err(|e| SftpError::ConnectionFailed {
            host: host.clone(),
            reason: format!("Failed to create SSH session: {}", e),
        })?;
        session.set_timeout(millis(descriptor.connect_timeout()));
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| SftpError::ConnectionFailed {
            host: host.clone(),
            reason: format!("SSH handshake failed: {}", e),
        })?;

        check_host_key(&session, &verifier, &host)?;

        if let Some(interval) = descriptor.keep_alive_interval_secs.filter(|s| *s > 0) {
            session.set_keepalive(false, interval);
            tracing::debug!("SFTP: keep-alive every {}s", interval);
        }

        authenticate(&session, &chain, cancel, &host)?;

        let sftp = session.sftp().map_err(|e| SftpError::ConnectionFailed {
            host: host.clone(),
            reason: format!("Failed to open SFTP channel: {}", e),
        })?;

        tracing::info!("Connected to sftp://{}@{}", chain.username(), descriptor.socket_address());
        Ok(SftpSession {
            session,
            sftp,
            host,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Close the SSH connection.
    pub fn close(self) -> Result<(), SftpError> {
        let SftpSession { session, sftp, .. } = self;
        drop(sftp);
        session.disconnect(None, "Closed by client", None)?;
        Ok(())
    }
}

fn millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

fn open_tcp(descriptor: &ConnectionDescriptor) -> Result<TcpStream, SftpError> {
    let addr = descriptor.socket_address();
    let timeout = descriptor.connect_timeout();
    let candidates = addr
        .to_socket_addrs()
        .map_err(|e| SftpError::ConnectionFailed {
            host: descriptor.address.clone(),
            reason: format!("Could not resolve '{}': {}", addr, e),
        })?;

    let mut last_error = None;
    for candidate in candidates {
        match TcpStream::connect_timeout(&candidate, timeout) {
            Ok(stream) => {
                tracing::debug!("SFTP: TCP connected to {}", candidate);
                return Ok(stream);
            }
            Err(e) => {
                tracing::debug!("SFTP: TCP connect to {} failed: {}", candidate, e);
                last_error = Some(e);
            }
        }
    }

    Err(SftpError::ConnectionFailed {
        host: descriptor.address.clone(),
        reason: match last_error {
            Some(e) => format!("TCP connection failed: {}", e),
            None => format!("'{}' did not resolve to any address", addr),
        },
    })
}

/// Host key gate, run after the handshake and before authentication.
fn check_host_key(session: &Session, verifier: &TrustVerifier, host: &str) -> Result<(), SftpError> {
    let event = match session.host_key() {
        Some((key, _)) => HostKeyEvent::from_host_key(key),
        None => {
            return Err(SftpError::ConnectionFailed {
                host: host.to_string(),
                reason: "Server did not provide a host key during handshake.".to_string(),
            })
        }
    };

    if !verifier.is_enabled() {
        tracing::warn!(
            "SFTP: host key verification is disabled for '{}'; server key is SHA256:{}",
            host,
            event.sha256_base64().trim_end_matches('=')
        );
    }

    match verifier.check(&event).into_result(host) {
        Ok(()) => {
            tracing::debug!("SFTP: host key accepted for {}", host);
            Ok(())
        }
        Err(e) => {
            if let Err(disconnect_err) =
                session.disconnect(None, "Host key verification failed", None)
            {
                tracing::debug!("SFTP: disconnect after rejection failed: {}", disconnect_err);
            }
            Err(e)
        }
    }
}

/// Try each method in order until the session is authenticated.
///
/// Servers that require several methods report partial success, so the
/// loop continues after a method that succeeded without completing
/// authentication.
fn authenticate(
    session: &Session,
    chain: &AuthMethodChain,
    cancel: &CancellationToken,
    host: &str,
) -> Result<(), SftpError> {
    let user = chain.username();
    let mut failures = Vec::new();

    for method in chain.methods() {
        if cancel.is_cancelled() {
            return Err(SftpError::Cancelled);
        }

        let attempt = match method {
            AuthMethod::KeyboardInteractive { password, responses } => {
                let resolver =
                    InteractivePromptResolver::new(password.clone(), responses.clone(), cancel.clone());
                let mut adapter = PromptAdapter::new(&resolver);
                let result = session.userauth_keyboard_interactive(user, &mut adapter);
                if let Some(failure) = adapter.take_failure() {
                    return Err(failure);
                }
                result
            }
            AuthMethod::Password(password) => session.userauth_password(user, password),
            AuthMethod::PrivateKey(key) => {
                session.userauth_pubkey_memory(user, None, key.key(), key.passphrase())
            }
        };

        match attempt {
            Ok(()) => tracing::debug!("SFTP: {} accepted for {}@{}", method.name(), user, host),
            Err(e) => {
                tracing::debug!("SFTP: {} rejected for {}@{}: {}", method.name(), user, host, e);
                failures.push(format!("{}: {}", method.name(), e.message()));
            }
        }

        if session.authenticated() {
            return Ok(());
        }
    }

    Err(SftpError::AuthenticationFailed {
        user: user.to_string(),
        reason: if failures.is_empty() {
            format!("tried {}", chain.method_names().join(", "))
        } else {
            failures.join("; ")
        },
    })
}

/// Map an ssh2 error, turning SFTP no-such-file/path into PathNotFound.
fn sftp_err(e: ssh2::Error, path: &Path) -> SftpError {
    match e.code() {
        ErrorCode::SFTP(SSH_FX_NO_SUCH_FILE) | ErrorCode::SFTP(SSH_FX_NO_SUCH_PATH) => {
            SftpError::PathNotFound {
                path: path.to_path_buf(),
            }
        }
        _ => SftpError::Ssh { source: e },
    }
}

fn to_file_stat(stat: &ssh2::FileStat) -> FileStat {
    FileStat {
        size: stat.size.unwrap_or(0),
        is_dir: stat.is_dir(),
        is_file: stat.is_file(),
        modified: stat.mtime.map(|t| UNIX_EPOCH + Duration::from_secs(t)),
        accessed: stat.atime.map(|t| UNIX_EPOCH + Duration::from_secs(t)),
        permissions: stat.perm,
    }
}

impl RemoteFs for SftpSession {
    fn stat(&self, path: &Path) -> Result<FileStat, SftpError> {
        let stat = self.sftp.stat(path).map_err(|e| sftp_err(e, path))?;
        Ok(to_file_stat(&stat))
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<FileEntry>, SftpError> {
        let entries = self.sftp.readdir(path).map_err(|e| sftp_err(e, path))?;
        Ok(entries
            .into_iter()
            .map(|(entry_path, stat)| FileEntry {
                path: entry_path,
                stat: to_file_stat(&stat),
            })
            .collect())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), SftpError> {
        // No OVERWRITE flag: an existing target is an error, as on SFTP v3.
        self.sftp
            .rename(from, to, Some(RenameFlags::ATOMIC))
            .map_err(|e| sftp_err(e, from))
    }

    fn remove_file(&self, path: &Path) -> Result<(), SftpError> {
        self.sftp.unlink(path).map_err(|e| sftp_err(e, path))
    }

    fn mkdir(&self, path: &Path) -> Result<(), SftpError> {
        self.sftp.mkdir(path, DIR_MODE).map_err(|e| sftp_err(e, path))
    }

    fn write(&self, path: &Path, data: &[u8], append: bool) -> Result<(), SftpError> {
        let mode = if append {
            OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::APPEND
        } else {
            OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE
        };
        let mut file = self
            .sftp
            .open_mode(path, mode, FILE_MODE, OpenType::File)
            .map_err(|e| sftp_err(e, path))?;
        file.write_all(data)?;
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, SftpError> {
        let mut file = self.sftp.open(path).map_err(|e| sftp_err(e, path))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::connection::AuthMode;
    use crate::error::KeySource;
    use std::path::PathBuf;

    #[test]
    fn sftp_not_found_codes_map_to_path_not_found() {
        for code in [SSH_FX_NO_SUCH_FILE, SSH_FX_NO_SUCH_PATH] {
            let err = sftp_err(
                ssh2::Error::new(ErrorCode::SFTP(code), "no such file"),
                Path::new("/in/a.txt"),
            );
            match err {
                SftpError::PathNotFound { path } => assert_eq!(path, PathBuf::from("/in/a.txt")),
                other => panic!("Expected PathNotFound, got {:?}", other),
            }
        }
    }

    #[test]
    fn other_sftp_errors_stay_ssh_errors() {
        // SSH_FX_PERMISSION_DENIED
        let err = sftp_err(
            ssh2::Error::new(ErrorCode::SFTP(3), "permission denied"),
            Path::new("/in/a.txt"),
        );
        assert!(matches!(err, SftpError::Ssh { .. }));
        assert!(!err.is_not_found());
    }

    #[test]
    fn timeout_millis_saturates() {
        assert_eq!(millis(Duration::from_secs(30)), 30_000);
        assert_eq!(millis(Duration::from_secs(u64::MAX)), u32::MAX);
    }

    #[test]
    fn missing_key_fails_before_any_network_io() {
        // .invalid never resolves, so reaching the network would be a
        // ConnectionFailed error instead.
        let descriptor = ConnectionDescriptor::new(
            "nonexistent.invalid",
            "deploy",
            AuthMode::PasswordPrivateKeyFile,
        )
        .with_password("secret")
        .with_private_key_file("");
        match SftpSession::connect(&descriptor, &CancellationToken::new()) {
            Err(SftpError::MissingKeyMaterial { key_source, .. }) => {
                assert_eq!(key_source, KeySource::File)
            }
            Err(other) => panic!("Expected MissingKeyMaterial, got {:?}", other),
            Ok(_) => panic!("Expected an error"),
        }
    }

    #[test]
    fn malformed_fingerprint_fails_before_any_network_io() {
        let descriptor = ConnectionDescriptor::new("nonexistent.invalid", "deploy", AuthMode::Password)
            .with_password("secret")
            .with_host_fingerprint("not-a-fingerprint");
        assert!(matches!(
            SftpSession::connect(&descriptor, &CancellationToken::new()),
            Err(SftpError::UnsupportedFingerprint(_))
        ));
    }

    #[test]
    fn cancelled_token_stops_before_connecting() {
        let descriptor = ConnectionDescriptor::new("nonexistent.invalid", "deploy", AuthMode::Password)
            .with_password("secret");
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            SftpSession::connect(&descriptor, &cancel),
            Err(SftpError::Cancelled)
        ));
    }
}
