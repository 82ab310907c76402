//! Command dispatch for the `sftpkit` binary.

use std::io::Read;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

use sftpkit::config::connection::ConnectionDescriptor;
use sftpkit::config::paths::sftpkit_config_dir;
use sftpkit::config::profiles::ProfileStore;
use sftpkit::config::types::FileEncoding;
use sftpkit::ops::{self, DeleteRequest, ListOptions, MoveRequest, NamePattern, TransferOutcome};
use sftpkit::trust::{self, ExpectedFingerprint, HostKeyEvent, TrustDecision};
use sftpkit::{SftpError, SftpSession};

use crate::cli::args::{Cli, Commands, FingerprintArgs, RemoteArgs};

/// Execute the dispatched command.
pub fn run(cli: &Cli) -> Result<(), SftpError> {
    let cancel = CancellationToken::new();
    let out = Output { json: cli.json };

    match &cli.command {
        Commands::Profiles => {
            let store = load_profiles(cli)?;
            show_profiles(&store, &out)
        }
        Commands::Fingerprint(args) => fingerprint(args, &out),
        Commands::Ls(args) => with_session(cli, &args.remote, &cancel, |session, _| {
            let options = ListOptions {
                pattern: NamePattern::new(&args.pattern)?,
                include_type: args.include_type,
                recursive: args.recursive,
            };
            let listing =
                ops::list_directory(session, &args.path, &options, args.on_missing, &cancel)?;
            out.emit(&listing, || {
                for entry in &listing.entries {
                    let modified = entry
                        .last_write_local()
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "-".repeat(16));
                    println!(
                        "{} {:>12} {} {}",
                        if entry.is_directory { 'd' } else { '-' },
                        entry.size,
                        modified,
                        entry.full_path.display()
                    );
                }
            })
        }),
        Commands::Mv(args) => with_session(cli, &args.remote, &cancel, |session, _| {
            let request = MoveRequest {
                source_dir: args.source_dir.clone(),
                target_dir: args.target_dir.clone(),
                pattern: NamePattern::new(&args.pattern)?,
                policy: args.on_conflict,
                create_target_dir: args.create_target,
                missing_source: args.on_missing,
            };
            let outcomes = ops::move_files(session, &request, &cancel)?;
            show_outcomes(&outcomes, &out)
        }),
        Commands::Rename(args) => with_session(cli, &args.remote, &cancel, |session, _| {
            let renamed = ops::rename_file(session, &args.path, &args.new_name, args.on_conflict)?;
            show_path(&renamed, &out)
        }),
        Commands::Write(args) => with_session(cli, &args.remote, &cancel, |session, descriptor| {
            let content = match &args.content {
                Some(text) => text.clone(),
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let options = ops::WriteOptions {
                encoding: encoding_for(args.encoding.as_deref(), descriptor)?,
                policy: args.on_conflict,
                append: args.append,
            };
            let written = ops::write_file(session, &args.path, &content, &options)?;
            show_path(&written, &out)
        }),
        Commands::Cat(args) => with_session(cli, &args.remote, &cancel, |session, descriptor| {
            let encoding = encoding_for(args.encoding.as_deref(), descriptor)?;
            let text = ops::read_file(session, &args.path, &encoding)?;
            out.emit(&serde_json::json!({ "path": args.path, "content": text }), || {
                print!("{}", text)
            })
        }),
        Commands::Rm(args) => with_session(cli, &args.remote, &cancel, |session, _| {
            let request = DeleteRequest {
                dir: args.dir.clone(),
                pattern: NamePattern::new(&args.pattern)?,
                recursive: args.recursive,
                missing: args.on_missing,
            };
            let outcomes = ops::delete_files(session, &request, &cancel)?;
            show_outcomes(&outcomes, &out)
        }),
        Commands::Mkdir(args) => with_session(cli, &args.remote, &cancel, |session, _| {
            ops::create_dir_all(session, &args.path)?;
            show_path(&args.path, &out)
        }),
        Commands::Upload(args) => with_session(cli, &args.remote, &cancel, |session, _| {
            let outcome = ops::upload_file(session, &args.local, &args.remote_dir, args.on_conflict)?;
            show_outcomes(std::slice::from_ref(&outcome), &out)
        }),
    }
}

fn load_profiles(cli: &Cli) -> Result<ProfileStore, SftpError> {
    match &cli.config {
        Some(path) => ProfileStore::load_file(path),
        None => ProfileStore::load(&sftpkit_config_dir()?),
    }
}

/// Resolve the profile, connect, run `op`, then close the session.
fn with_session<F>(
    cli: &Cli,
    remote: &RemoteArgs,
    cancel: &CancellationToken,
    op: F,
) -> Result<(), SftpError>
where
    F: FnOnce(&SftpSession, &ConnectionDescriptor) -> Result<(), SftpError>,
{
    let store = load_profiles(cli)?;
    let mut descriptor = store.get(&remote.profile)?.clone();

    if remote.ask_password {
        let prompt = format!("Password for {}@{}: ", descriptor.username, descriptor.address);
        let password = rpassword::prompt_password(prompt)?;
        descriptor.password = Some(Zeroizing::new(password));
    }

    tracing::debug!(profile = %remote.profile, "Connecting");
    let session = SftpSession::connect(&descriptor, cancel)?;
    let result = op(&session, &descriptor);
    let session_host = session.host().to_string();
    if let Err(e) = session.close() {
        tracing::debug!(host = %session_host, "Disconnect failed: {}", e);
    }
    result
}

fn encoding_for(
    requested: Option<&str>,
    descriptor: &ConnectionDescriptor,
) -> Result<FileEncoding, SftpError> {
    match requested {
        Some(label) => label.parse(),
        None => Ok(descriptor.encoding.clone()),
    }
}

fn show_profiles(store: &ProfileStore, out: &Output) -> Result<(), SftpError> {
    #[derive(Serialize)]
    struct ProfileSummary<'a> {
        name: &'a str,
        address: &'a str,
        port: u16,
        username: &'a str,
        auth_mode: &'a str,
        host_fingerprint: bool,
    }

    let summaries: Vec<ProfileSummary<'_>> = store
        .list()
        .iter()
        .map(|(name, d)| ProfileSummary {
            name,
            address: &d.address,
            port: d.port,
            username: &d.username,
            auth_mode: d.auth_mode.as_str(),
            host_fingerprint: d.expected_fingerprint().is_some(),
        })
        .collect();

    out.emit(&summaries, || {
        if summaries.is_empty() {
            eprintln!("No connection profiles in {}", store.path().display());
            return;
        }
        for s in &summaries {
            println!(
                "{:<16} {}@{}:{} ({}{})",
                s.name,
                s.username,
                s.address,
                s.port,
                s.auth_mode,
                if s.host_fingerprint { ", pinned" } else { "" }
            );
        }
    })
}

fn fingerprint(args: &FingerprintArgs, out: &Output) -> Result<(), SftpError> {
    let event = match &args.public_key {
        Some(path) => Some(HostKeyEvent::from_host_key(&read_public_key(path)?)),
        None => None,
    };

    match (&args.value, event) {
        (Some(value), None) => {
            let parsed = ExpectedFingerprint::parse(value)?;
            out.emit(
                &serde_json::json!({ "value": value, "format": parsed.format_name() }),
                || println!("{}", parsed.format_name()),
            )
        }
        (None, Some(event)) => out.emit(
            &serde_json::json!({
                "md5": event.md5_colon_hex(),
                "sha256_hex": event.sha256_hex(),
                "sha256_base64": event.sha256_base64(),
            }),
            || {
                println!("MD5:{}", event.md5_colon_hex());
                println!("SHA256:{}", event.sha256_base64().trim_end_matches('='));
                println!("{}", event.sha256_hex());
            },
        ),
        (Some(value), Some(event)) => {
            let decision = trust::verify(&event, value);
            let trusted = decision == TrustDecision::Trusted;
            out.emit(
                &serde_json::json!({ "value": value, "trusted": trusted }),
                || {
                    if trusted {
                        println!("match");
                    }
                },
            )?;
            decision.into_result("public key")
        }
        (None, None) => Err(SftpError::Config(
            "Give a fingerprint, --public-key, or both".into(),
        )),
    }
}

/// Decode the key blob of an OpenSSH `.pub` line.
fn read_public_key(path: &Path) -> Result<Vec<u8>, SftpError> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SftpError::PathNotFound {
            path: path.to_path_buf(),
        },
        _ => SftpError::Io { source: e },
    })?;
    let blob = text
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| SftpError::Config(format!("{} is not an OpenSSH public key", path.display())))?;
    STANDARD
        .decode(blob)
        .map_err(|e| SftpError::Config(format!("{}: invalid key data: {}", path.display(), e)))
}

fn show_outcomes(outcomes: &[TransferOutcome], out: &Output) -> Result<(), SftpError> {
    out.emit(&outcomes, || {
        for o in outcomes {
            match (&o.destination, o.success) {
                (Some(dest), true) => println!("{} -> {}", o.source.display(), dest.display()),
                (None, true) => println!("deleted {}", o.source.display()),
                (_, false) => println!(
                    "failed {}: {}",
                    o.source.display(),
                    o.error_message.as_deref().unwrap_or("unknown error")
                ),
            }
        }
    })
}

fn show_path(path: &Path, out: &Output) -> Result<(), SftpError> {
    out.emit(&serde_json::json!({ "path": path }), || println!("{}", path.display()))
}

/// Chooses between JSON and human-readable stdout.
struct Output {
    json: bool,
}

impl Output {
    fn emit<T: Serialize + ?Sized>(&self, value: &T, text: impl FnOnce()) -> Result<(), SftpError> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            text();
        }
        Ok(())
    }
}

/// JSON body printed for `--soft-fail`.
#[derive(Serialize)]
pub struct FailureReport<'a> {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'a str>,
    #[serde(skip_serializing_if = "<[TransferOutcome]>::is_empty")]
    pub outcomes: &'a [TransferOutcome],
}

impl<'a> FailureReport<'a> {
    pub fn new(err: &'a SftpError) -> Self {
        Self {
            success: false,
            error: err.to_string(),
            hint: err.suggestion(),
            outcomes: err.partial_outcomes(),
        }
    }
}
