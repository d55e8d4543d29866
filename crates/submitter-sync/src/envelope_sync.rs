//! # Envelope Reconciliation
//!
//! Envelopes go up in a single `bulk_content` archive holding:
//!
//! - `metadata/config.json`: `{"contentIDBase": "<base>"}`
//! - `metadata/keep.json`: `{"keep": [<content IDs already present>]}`. This
//!   is the authoritative retention list; the service may delete any content
//!   under the base that is neither uploaded nor kept.
//! - one entry per changed envelope, named by its file name, holding the
//!   canonical document.
//!
//! Asset offsets must already have been applied; fingerprints are taken over
//! the rewritten documents.

use serde::Serialize;
use submitter_client::ContentService;
use submitter_core::CanonicalBytes;
use tracing::{info, warn};

use crate::archive::ArchiveBuilder;
use crate::envelope::{Envelope, EnvelopeSet};
use crate::error::SyncError;

/// Archive entry carrying the content-ID base.
pub const CONFIG_ENTRY: &str = "metadata/config.json";

/// Archive entry carrying the keep list.
pub const KEEP_ENTRY: &str = "metadata/keep.json";

#[derive(Serialize)]
struct ArchiveConfig<'a> {
    #[serde(rename = "contentIDBase")]
    content_id_base: &'a str,
}

#[derive(Serialize)]
struct KeepList<'a> {
    keep: Vec<&'a str>,
}

/// Outcome of one envelope reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvelopeSyncResult {
    /// Envelopes the service accepted from the archive.
    pub uploaded: u64,
    /// Envelopes already present, sent on the keep list.
    pub present: usize,
    /// Remote envelopes the service deleted.
    pub deleted: u64,
    /// Envelopes the service rejected. Reported, never raised.
    pub failed: u64,
    /// Envelopes discovered locally.
    pub total: usize,
}

/// Upload every changed envelope along with the keep list.
///
/// # Errors
///
/// Fails on content service errors or if a document cannot be serialized.
/// Rejected envelopes are reported through `EnvelopeSyncResult::failed`.
pub async fn reconcile_envelopes<C: ContentService>(
    envelopes: &mut EnvelopeSet,
    content_id_base: &str,
    service: &C,
) -> Result<EnvelopeSyncResult, SyncError> {
    let presence = service
        .check_content(&envelopes.fingerprint_query()?)
        .await?;
    envelopes.accept_presence(&presence);

    let archive = build_content_archive(envelopes, content_id_base)?;
    let present = envelopes.to_keep().count();
    info!(
        total = envelopes.len(),
        upload = envelopes.len() - present,
        keep = present,
        bytes = archive.len(),
        "uploading envelopes"
    );

    let response = service.bulk_content(archive).await?;
    if response.failed > 0 {
        warn!(failed = response.failed, "content service rejected envelopes");
    }
    info!(
        accepted = response.accepted,
        deleted = response.deleted,
        failed = response.failed,
        "envelope upload complete"
    );

    Ok(EnvelopeSyncResult {
        uploaded: response.accepted,
        present,
        deleted: response.deleted,
        failed: response.failed,
        total: envelopes.len(),
    })
}

fn build_content_archive(
    envelopes: &EnvelopeSet,
    content_id_base: &str,
) -> Result<Vec<u8>, SyncError> {
    let config = CanonicalBytes::new(&ArchiveConfig { content_id_base })?;
    let keep = CanonicalBytes::new(&KeepList {
        keep: envelopes.to_keep().map(Envelope::content_id).collect(),
    })?;

    let mut archive = ArchiveBuilder::new();
    archive
        .append_bytes(CONFIG_ENTRY, config.as_bytes())
        .map_err(SyncError::Archive)?;
    archive
        .append_bytes(KEEP_ENTRY, keep.as_bytes())
        .map_err(SyncError::Archive)?;
    for envelope in envelopes.to_upload() {
        archive
            .append_bytes(envelope.file_name(), envelope.serialize()?.as_bytes())
            .map_err(SyncError::Archive)?;
    }
    archive.finish().map_err(SyncError::Archive)
}
