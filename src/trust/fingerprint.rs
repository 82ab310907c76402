//! Host key fingerprint parsing and canonical encodings.
//!
//! Accepted forms for an expected fingerprint:
//!
//! | Form                 | Example                                  |
//! |----------------------|------------------------------------------|
//! | MD5 colon-hex        | `16:27:ac:a5:76:28:2d:36:63:1b:56:4d:eb:df:a6:48` |
//! | MD5 plain hex        | `1627aca576282d36631b564debdfa648`       |
//! | SHA-256 hex          | 64 hex characters                        |
//! | SHA-256 base64       | 43 characters, optionally `=`-padded     |
//!
//! The OpenSSH display prefixes `MD5:` and `SHA256:` are stripped first.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;

use crate::error::SftpError;

pub const MD5_LEN: usize = 16;
pub const SHA256_LEN: usize = 32;

/// An expected fingerprint, classified once from its string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedFingerprint {
    /// `aa:bb:..` form; compared byte for byte with the MD5 digest.
    Md5Colon { bytes: [u8; MD5_LEN], text: String },
    /// Lowercase hex without separators.
    Md5Hex(String),
    /// Lowercase hex.
    Sha256Hex(String),
    /// Base64 with trailing padding removed.
    Sha256Base64(String),
}

impl ExpectedFingerprint {
    pub fn parse(input: &str) -> Result<Self, SftpError> {
        let value = strip_display_prefix(input.trim());

        if is_md5(value) {
            if value.contains(':') {
                let bytes = parse_colon_hex(value)
                    .ok_or_else(|| SftpError::UnsupportedFingerprint(input.to_string()))?;
                return Ok(ExpectedFingerprint::Md5Colon {
                    bytes,
                    text: value.to_string(),
                });
            }
            let plain: String = value
                .chars()
                .filter(|c| *c != '-')
                .collect::<String>()
                .to_ascii_lowercase();
            return Ok(ExpectedFingerprint::Md5Hex(plain));
        }

        if is_sha256(value) {
            if is_hex_of_len(value, SHA256_LEN * 2) {
                return Ok(ExpectedFingerprint::Sha256Hex(value.to_ascii_lowercase()));
            }
            return Ok(ExpectedFingerprint::Sha256Base64(
                value.trim_end_matches('=').to_string(),
            ));
        }

        Err(SftpError::UnsupportedFingerprint(input.to_string()))
    }

    /// Short name of the format, as shown by `sftpkit fingerprint`.
    pub fn format_name(&self) -> &'static str {
        match self {
            ExpectedFingerprint::Md5Colon { .. } => "md5-colon-hex",
            ExpectedFingerprint::Md5Hex(_) => "md5-hex",
            ExpectedFingerprint::Sha256Hex(_) => "sha256-hex",
            ExpectedFingerprint::Sha256Base64(_) => "sha256-base64",
        }
    }
}

fn strip_display_prefix(value: &str) -> &str {
    for prefix in ["SHA256:", "sha256:", "MD5:", "md5:"] {
        if let Some(rest) = value.strip_prefix(prefix) {
            return rest;
        }
    }
    value
}

fn is_hex_of_len(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// True if `s` is 32 hex characters once `:` and `-` separators are removed.
pub fn is_md5(s: &str) -> bool {
    let stripped: String = s.chars().filter(|c| !matches!(c, ':' | '-')).collect();
    is_hex_of_len(&stripped, MD5_LEN * 2)
}

/// True if `s` is 64 hex characters, or base64 (padding optional) of a
/// 32-byte digest.
pub fn is_sha256(s: &str) -> bool {
    if is_hex_of_len(s, SHA256_LEN * 2) {
        return true;
    }
    STANDARD_NO_PAD
        .decode(s.trim_end_matches('='))
        .map(|bytes| bytes.len() == SHA256_LEN)
        .unwrap_or(false)
}

/// Lowercase hex pairs joined with `:`.
pub fn to_colon_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Lowercase hex without separators.
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Standard padded base64.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

fn parse_colon_hex(value: &str) -> Option<[u8; MD5_LEN]> {
    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() != MD5_LEN {
        return None;
    }
    let mut out = [0u8; MD5_LEN];
    for (slot, part) in out.iter_mut().zip(parts) {
        if part.len() != 2 {
            return None;
        }
        *slot = u8::from_str_radix(part, 16).ok()?;
    }
    Some(out)
}
