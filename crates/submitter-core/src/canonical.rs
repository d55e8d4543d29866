//! # Canonical Serialization -- JCS-Compatible Byte Production
//!
//! This module defines `CanonicalBytes`, the sole construction path for bytes
//! used in envelope fingerprint computation.
//!
//! ## Invariant
//!
//! The `CanonicalBytes` newtype has a private inner field. The only way to
//! construct it is through `CanonicalBytes::new()`, which serializes via
//! `serde_jcs` (RFC 8785): sorted keys, compact separators, deterministic
//! number formatting. Any function requiring canonical bytes must accept
//! `&CanonicalBytes`, so a document can never be fingerprinted over its
//! source formatting.
//!
//! The same bytes are what gets uploaded for an envelope, so the fingerprint
//! the content service stores always describes the exact payload it received.

use serde::Serialize;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization.
///
/// # Invariants
///
/// - The only constructor is `CanonicalBytes::new()`.
/// - Object keys are sorted, separators are compact, and no insignificant
///   whitespace is emitted.
/// - The bytes are valid UTF-8 JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::SerializationFailed` if the value cannot
    /// be represented as JSON (e.g. a map with non-string keys).
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let s = serde_jcs::to_string(obj)?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes for digest computation or upload.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
