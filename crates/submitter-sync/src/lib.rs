//! # submitter-sync -- Reconciliation Engine
//!
//! Synchronizes a local tree of binary assets and JSON metadata envelopes
//! with the content service in a single sequential pass:
//!
//! 1. **Assets** ([`asset`], [`asset_sync`]): discover and fingerprint every
//!    asset, ask the service which it already holds, and upload the rest in
//!    size-bounded gzip tar batches until every asset has a public URL.
//! 2. **Envelopes** ([`envelope`], [`envelope_sync`]): discover envelopes,
//!    splice resolved asset URLs into their bodies, fingerprint the result,
//!    and upload every changed envelope in one archive together with the
//!    retention (keep) list.
//! 3. **Coordination** ([`submit`]): run both stages in order and derive an
//!    overall [`SubmitState`].
//!
//! Everything is owned by the single pass that created it; no state survives
//! between runs.

pub mod archive;
pub mod asset;
pub mod asset_sync;
pub mod config;
pub mod envelope;
pub mod envelope_sync;
pub mod error;
pub mod submit;

pub use asset::{Asset, AssetSet};
pub use asset_sync::{reconcile_assets, AssetSyncResult};
pub use config::{ConfigError, SubmitConfig};
pub use envelope::{Envelope, EnvelopeSet};
pub use envelope_sync::{reconcile_envelopes, EnvelopeSyncResult};
pub use error::SyncError;
pub use submit::{submit, SubmitResult, SubmitState};

/// Whether an item still has to be sent to the content service.
///
/// An asset needs upload until it has a public URL; an envelope needs upload
/// unless the service reported it present with a matching fingerprint.
pub trait NeedsUpload {
    fn needs_upload(&self) -> bool;
}
