//! SFTP connector core: authentication negotiation, host key trust,
//! destination conflict handling and directory walking, plus the file
//! operations built on them.

pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod ops;
pub mod trust;

pub use backend::local::LocalFs;
pub use backend::sftp::SftpSession;
pub use backend::RemoteFs;
pub use config::connection::{AuthMode, ConnectionDescriptor};
pub use error::SftpError;
