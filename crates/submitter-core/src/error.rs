//! # Error Types
//!
//! Errors raised by the core primitives. Higher layers wrap these in their own
//! `thiserror` enums rather than stringly re-reporting them.

use thiserror::Error;

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// A string that is not a 64-character lowercase or uppercase hex digest.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FingerprintParseError {
    #[error("fingerprint must be 64 hex characters, got {0}")]
    Length(usize),

    #[error("fingerprint contains non-hex characters: {0}")]
    NotHex(String),
}
