use std::path::PathBuf;

use clap::{Parser, Subcommand};

use sftpkit::config::types::{FileConflictPolicy, IncludeType, MissingDirectory};

#[derive(Parser, Debug)]
#[command(
    name = "sftpkit",
    version,
    about = "SFTP file operations with host key pinning"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v for verbose, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode: suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Connection profile file (default: connections.toml in the config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// On failure print a JSON failure result on stdout and exit 0
    #[arg(long, global = true)]
    pub soft_fail: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List a remote directory
    Ls(LsArgs),

    /// Move files matching a pattern into another remote directory
    Mv(MvArgs),

    /// Rename a remote file within its directory
    Rename(RenameArgs),

    /// Write text to a remote file
    Write(WriteArgs),

    /// Print a remote text file
    Cat(CatArgs),

    /// Delete remote files matching a pattern
    Rm(RmArgs),

    /// Create a remote directory and any missing parents
    Mkdir(MkdirArgs),

    /// Upload a local file into a remote directory
    Upload(UploadArgs),

    /// List saved connection profiles
    Profiles,

    /// Classify a fingerprint string, or check it against a public key
    Fingerprint(FingerprintArgs),
}

/// Connection selection shared by every remote command.
#[derive(clap::Args, Debug)]
pub struct RemoteArgs {
    /// Connection profile name from the profile file
    #[arg(short, long)]
    pub profile: String,

    /// Prompt for the password instead of reading it from the profile
    #[arg(long)]
    pub ask_password: bool,
}

#[derive(clap::Args, Debug)]
pub struct LsArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Remote directory
    pub path: PathBuf,

    /// Name pattern: '*' any characters, '?' one or more
    #[arg(long, default_value = "")]
    pub pattern: String,

    /// Which entries to report
    #[arg(long = "type", value_enum, default_value_t = IncludeType::Both)]
    pub include_type: IncludeType,

    /// Descend into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// What to do when the directory does not exist
    #[arg(long, value_enum, default_value_t = MissingDirectory::Throw)]
    pub on_missing: MissingDirectory,
}

#[derive(clap::Args, Debug)]
pub struct MvArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Directory to move files from (not recursive)
    pub source_dir: PathBuf,

    /// Directory to move files into
    pub target_dir: PathBuf,

    /// Name pattern: '*' any characters, '?' one or more
    #[arg(long, default_value = "")]
    pub pattern: String,

    /// Handling when a destination file exists
    #[arg(long, value_enum, default_value_t = FileConflictPolicy::Throw)]
    pub on_conflict: FileConflictPolicy,

    /// Create the target directory if it does not exist
    #[arg(long)]
    pub create_target: bool,

    /// What to do when the source directory does not exist
    #[arg(long, value_enum, default_value_t = MissingDirectory::Throw)]
    pub on_missing: MissingDirectory,
}

#[derive(clap::Args, Debug)]
pub struct RenameArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Remote file to rename
    pub path: PathBuf,

    /// New file name (no directories)
    pub new_name: String,

    /// Handling when a file with the new name exists
    #[arg(long, value_enum, default_value_t = FileConflictPolicy::Throw)]
    pub on_conflict: FileConflictPolicy,
}

#[derive(clap::Args, Debug)]
pub struct WriteArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Remote file to write
    pub path: PathBuf,

    /// Text to write; read from stdin when omitted
    #[arg(long)]
    pub content: Option<String>,

    /// Append to the file if it exists
    #[arg(long)]
    pub append: bool,

    /// Handling when the file exists and --append is not set
    #[arg(long, value_enum, default_value_t = FileConflictPolicy::Throw)]
    pub on_conflict: FileConflictPolicy,

    /// Content encoding (default: the profile's encoding)
    #[arg(long)]
    pub encoding: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct CatArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Remote file to read
    pub path: PathBuf,

    /// Content encoding (default: the profile's encoding)
    #[arg(long)]
    pub encoding: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct RmArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Directory to delete files from
    pub dir: PathBuf,

    /// Name pattern of files to delete
    #[arg(long)]
    pub pattern: String,

    /// Also delete matching files in subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// What to do when the directory does not exist
    #[arg(long, value_enum, default_value_t = MissingDirectory::Throw)]
    pub on_missing: MissingDirectory,
}

#[derive(clap::Args, Debug)]
pub struct MkdirArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Remote directory to create
    pub path: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct UploadArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Local file to upload
    pub local: PathBuf,

    /// Remote directory to upload into
    pub remote_dir: PathBuf,

    /// Handling when the remote file exists
    #[arg(long, value_enum, default_value_t = FileConflictPolicy::Throw)]
    pub on_conflict: FileConflictPolicy,
}

#[derive(clap::Args, Debug)]
pub struct FingerprintArgs {
    /// Expected fingerprint (MD5 or SHA-256, any supported encoding)
    pub value: Option<String>,

    /// OpenSSH public key file (`<type> <base64> [comment]`) to fingerprint
    #[arg(long)]
    pub public_key: Option<PathBuf>,
}
