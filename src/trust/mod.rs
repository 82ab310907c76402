//! Host identity verification.

pub mod fingerprint;
pub mod verifier;

pub use fingerprint::ExpectedFingerprint;
pub use verifier::{verify, HostKeyEvent, TrustDecision, TrustFailure, TrustVerifier};
