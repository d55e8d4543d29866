//! # submitter-core -- Foundational Types for the Submitter
//!
//! Every other crate in the workspace depends on `submitter-core`; it depends
//! on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** Envelope fingerprints flow through
//!    `CanonicalBytes::new()`. No raw `serde_json::to_vec()` for digests, so two
//!    semantically equal documents always hash identically.
//!
//! 2. **`Fingerprint` newtype.** A 32-byte SHA-256 digest that renders (and
//!    serializes) as lowercase hex, the form the content service expects on the
//!    wire.
//!
//! 3. **Two digest paths, both explicit.** [`sha256_digest()`] accepts only
//!    `&CanonicalBytes`; [`Fingerprint::from_reader()`] streams raw asset bytes.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `submitter-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;

pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, sha256_hex, Fingerprint};
pub use error::{CanonicalizationError, FingerprintParseError};
