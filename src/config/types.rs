use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SftpError;

/// Verbosity level controlling tracing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Suppress all output except errors
    Quiet,
    /// Normal output (info level)
    Normal,
    /// Verbose output (debug level)
    Verbose,
    /// Maximum output (trace level)
    Trace,
}

impl From<(bool, u8)> for Verbosity {
    /// Convert from (quiet_flag, verbose_count) to Verbosity.
    ///
    /// - quiet=true -> Quiet (regardless of verbose count)
    /// - verbose=0  -> Normal
    /// - verbose=1  -> Verbose
    /// - verbose=2+ -> Trace
    fn from((quiet, verbose_count): (bool, u8)) -> Self {
        if quiet {
            Verbosity::Quiet
        } else {
            match verbose_count {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }
}

impl Verbosity {
    /// Return the tracing filter string for this verbosity level.
    pub fn as_tracing_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
            Verbosity::Trace => "trace",
        }
    }
}

/// What to do when the destination of a move, rename, write or upload
/// already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FileConflictPolicy {
    /// Fail without touching anything.
    #[default]
    Throw,
    /// Replace the existing destination.
    Overwrite,
    /// Pick a free name of the form `name(n).ext`.
    Rename,
}

/// Which kinds of entries a listing reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IncludeType {
    File,
    Directory,
    #[default]
    Both,
}

impl IncludeType {
    pub fn accepts(&self, is_dir: bool) -> bool {
        match self {
            IncludeType::File => !is_dir,
            IncludeType::Directory => is_dir,
            IncludeType::Both => true,
        }
    }
}

/// Behaviour when the directory an operation starts from does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MissingDirectory {
    #[default]
    Throw,
    Skip,
}

/// Text encoding applied to file content.
///
/// Parsed from a label: `utf-8`, `utf-8-bom`, `ascii`, `ansi`,
/// `windows-1252`, or any other WHATWG label known to `encoding_rs`
/// (for example `iso-8859-2` or `shift_jis`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FileEncoding {
    #[default]
    Utf8,
    Utf8Bom,
    Ascii,
    /// The platform's legacy code page.
    Ansi,
    Windows1252,
    Named(String),
}

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

impl FileEncoding {
    pub fn label(&self) -> &str {
        match self {
            FileEncoding::Utf8 => "utf-8",
            FileEncoding::Utf8Bom => "utf-8-bom",
            FileEncoding::Ascii => "ascii",
            FileEncoding::Ansi => "ansi",
            FileEncoding::Windows1252 => "windows-1252",
            FileEncoding::Named(label) => label,
        }
    }

    /// Encode text for writing to a remote file.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, SftpError> {
        Ok(match self {
            FileEncoding::Utf8 => text.as_bytes().to_vec(),
            FileEncoding::Utf8Bom => {
                let mut out = Vec::with_capacity(UTF8_BOM.len() + text.len());
                out.extend_from_slice(UTF8_BOM);
                out.extend_from_slice(text.as_bytes());
                out
            }
            FileEncoding::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
            FileEncoding::Ansi | FileEncoding::Windows1252 | FileEncoding::Named(_) => {
                let encoding = self.codec()?;
                // encoding_rs writes UTF-16 and replacement labels out as UTF-8.
                if encoding.output_encoding() != encoding {
                    return Err(SftpError::UnsupportedEncoding(format!(
                        "{} (only supported for reading)",
                        self.label()
                    )));
                }
                let (bytes, _, had_errors) = encoding.encode(text);
                if had_errors {
                    return Err(SftpError::UnmappableCharacter {
                        encoding: self.label().to_string(),
                        character: first_unmappable(encoding, text),
                    });
                }
                bytes.into_owned()
            }
        })
    }

    /// Like [`encode`](Self::encode) but never emits a BOM, for content
    /// appended to an existing file.
    pub fn encode_continuation(&self, text: &str) -> Result<Vec<u8>, SftpError> {
        match self {
            FileEncoding::Utf8Bom => Ok(text.as_bytes().to_vec()),
            _ => self.encode(text),
        }
    }

    /// Decode bytes read from a remote file. A leading BOM is dropped.
    pub fn decode(&self, bytes: &[u8]) -> Result<String, SftpError> {
        Ok(match self {
            FileEncoding::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { '?' })
                .collect(),
            _ => {
                let encoding = self.codec()?;
                let (text, _) = encoding.decode_with_bom_removal(bytes);
                text.into_owned()
            }
        })
    }

    fn codec(&self) -> Result<&'static encoding_rs::Encoding, SftpError> {
        match self {
            FileEncoding::Utf8 | FileEncoding::Utf8Bom | FileEncoding::Ascii => {
                Ok(encoding_rs::UTF_8)
            }
            FileEncoding::Ansi => Ok(ansi_encoding()),
            FileEncoding::Windows1252 => Ok(encoding_rs::WINDOWS_1252),
            FileEncoding::Named(label) => encoding_rs::Encoding::for_label(label.as_bytes())
                .ok_or_else(|| SftpError::UnsupportedEncoding(label.clone())),
        }
    }
}

fn first_unmappable(encoding: &'static encoding_rs::Encoding, text: &str) -> char {
    let mut buf = [0u8; 4];
    text.chars()
        .find(|c| encoding.encode(c.encode_utf8(&mut buf)).2)
        .unwrap_or(char::REPLACEMENT_CHARACTER)
}

#[cfg(windows)]
fn ansi_encoding() -> &'static encoding_rs::Encoding {
    encoding_rs::WINDOWS_1252
}

#[cfg(not(windows))]
fn ansi_encoding() -> &'static encoding_rs::Encoding {
    encoding_rs::UTF_8
}

impl FromStr for FileEncoding {
    type Err = SftpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "utf-8" | "utf8" => Ok(FileEncoding::Utf8),
            "utf-8-bom" | "utf8bom" | "utf-8-with-bom" => Ok(FileEncoding::Utf8Bom),
            "ascii" | "us-ascii" => Ok(FileEncoding::Ascii),
            "ansi" | "default" => Ok(FileEncoding::Ansi),
            "windows-1252" | "cp1252" => Ok(FileEncoding::Windows1252),
            other => {
                if encoding_rs::Encoding::for_label(other.as_bytes()).is_some() {
                    Ok(FileEncoding::Named(other.to_string()))
                } else {
                    Err(SftpError::UnsupportedEncoding(s.to_string()))
                }
            }
        }
    }
}

impl TryFrom<String> for FileEncoding {
    type Error = SftpError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FileEncoding> for String {
    fn from(value: FileEncoding) -> Self {
        value.label().to_string()
    }
}
