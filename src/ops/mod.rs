//! File operations built on the [`RemoteFs`](crate::backend::RemoteFs) seam.

pub mod conflict;
pub mod files;
pub mod outcome;
pub mod walker;

pub use conflict::{plan_batch, resolve, PlannedTransfer, Resolution, MAX_RENAME_ATTEMPTS};
pub use files::{
    create_dir_all, delete_files, list_directory, move_files, read_file, rename_file,
    upload_file, write_file, DeleteRequest, MoveRequest, WriteOptions,
};
pub use outcome::{DirectoryListing, TransferOutcome};
pub use walker::{DirectoryEntry, DirectoryWalker, ListOptions, NamePattern};
