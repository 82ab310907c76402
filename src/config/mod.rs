pub mod connection;
pub mod paths;
pub mod profiles;
pub mod types;
