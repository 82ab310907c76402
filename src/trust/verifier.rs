//! Host key gate run once per handshake.
//!
//! The transport hands the raw server host key to [`TrustVerifier::check`]
//! after key exchange and before authentication. Anything other than
//! [`TrustDecision::Trusted`] or an explicit opt-out must abort the
//! connection.

use md5::{Digest as _, Md5};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::SftpError;
use crate::trust::fingerprint::{
    to_base64, to_colon_hex, to_hex, ExpectedFingerprint, MD5_LEN, SHA256_LEN,
};

/// The server's host key with both digests precomputed.
#[derive(Debug, Clone)]
pub struct HostKeyEvent {
    md5: [u8; MD5_LEN],
    sha256: [u8; SHA256_LEN],
}

impl HostKeyEvent {
    pub fn from_host_key(host_key: &[u8]) -> Self {
        let md5: [u8; MD5_LEN] = Md5::digest(host_key).into();
        let sha256: [u8; SHA256_LEN] = Sha256::digest(host_key).into();
        Self { md5, sha256 }
    }

    pub fn md5(&self) -> &[u8; MD5_LEN] {
        &self.md5
    }

    pub fn sha256(&self) -> &[u8; SHA256_LEN] {
        &self.sha256
    }

    pub fn md5_colon_hex(&self) -> String {
        to_colon_hex(&self.md5)
    }

    pub fn md5_hex(&self) -> String {
        to_hex(&self.md5)
    }

    pub fn sha256_hex(&self) -> String {
        to_hex(&self.sha256)
    }

    /// Padded base64, e.g. `2Fo8c/96zv17xy1Zj6iWR+6dD3PLx0YBErT1DAn0bo8=`.
    pub fn sha256_base64(&self) -> String {
        to_base64(&self.sha256)
    }
}

/// Why a host key was not trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustFailure {
    Mismatch { expected: String, actual: String },
    UnsupportedFormat { value: String },
}

impl std::fmt::Display for TrustFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrustFailure::Mismatch { expected, actual } => write!(
                f,
                "expected fingerprint '{}' but the server presented '{}'",
                expected, actual
            ),
            TrustFailure::UnsupportedFormat { value } => write!(
                f,
                "fingerprint '{}' is not a supported MD5 or SHA-256 format",
                value
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustDecision {
    Trusted,
    /// No fingerprint was configured.
    Skipped,
    Rejected(TrustFailure),
}

impl TrustDecision {
    pub fn is_trusted(&self) -> bool {
        !matches!(self, TrustDecision::Rejected(_))
    }

    pub fn into_result(self, host: &str) -> Result<(), SftpError> {
        match self {
            TrustDecision::Trusted | TrustDecision::Skipped => Ok(()),
            TrustDecision::Rejected(failure) => Err(SftpError::HostKeyRejected {
                host: host.to_string(),
                reason: failure.to_string(),
            }),
        }
    }
}

enum Expectation {
    None,
    Fingerprint(ExpectedFingerprint),
    Unsupported(String),
}

/// Holds the classified expected fingerprint for one connection.
pub struct TrustVerifier {
    expectation: Expectation,
}

impl TrustVerifier {
    /// `None` or a blank string disables verification.
    pub fn new(expected: Option<&str>) -> Self {
        let expectation = match expected.map(str::trim).filter(|s| !s.is_empty()) {
            None => Expectation::None,
            Some(value) => match ExpectedFingerprint::parse(value) {
                Ok(fp) => Expectation::Fingerprint(fp),
                Err(_) => Expectation::Unsupported(value.to_string()),
            },
        };
        Self { expectation }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.expectation, Expectation::None)
    }

    pub fn check(&self, event: &HostKeyEvent) -> TrustDecision {
        match &self.expectation {
            Expectation::None => TrustDecision::Skipped,
            Expectation::Unsupported(value) => {
                TrustDecision::Rejected(TrustFailure::UnsupportedFormat {
                    value: value.clone(),
                })
            }
            Expectation::Fingerprint(fp) => compare(fp, event),
        }
    }
}

/// One-shot verification of `event` against an expected fingerprint string.
pub fn verify(event: &HostKeyEvent, expected: &str) -> TrustDecision {
    TrustVerifier::new(Some(expected)).check(event)
}

fn compare(expected: &ExpectedFingerprint, event: &HostKeyEvent) -> TrustDecision {
    let (matched, expected_text, actual_text) = match expected {
        ExpectedFingerprint::Md5Colon { bytes, text } => (
            bool::from(bytes[..].ct_eq(&event.md5()[..])),
            text.clone(),
            event.md5_colon_hex(),
        ),
        ExpectedFingerprint::Md5Hex(hex) => {
            let actual = event.md5_hex();
            (ct_str_eq(hex, &actual), hex.clone(), actual)
        }
        ExpectedFingerprint::Sha256Hex(hex) => {
            let actual = event.sha256_hex();
            (ct_str_eq(hex, &actual), hex.clone(), actual)
        }
        ExpectedFingerprint::Sha256Base64(b64) => {
            let padded = event.sha256_base64();
            let unpadded = padded.trim_end_matches('=');
            let matched = ct_str_eq(b64, &padded) || ct_str_eq(b64, unpadded);
            (matched, b64.clone(), unpadded.to_string())
        }
    };

    if matched {
        TrustDecision::Trusted
    } else {
        TrustDecision::Rejected(TrustFailure::Mismatch {
            expected: expected_text,
            actual: actual_text,
        })
    }
}

fn ct_str_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}
