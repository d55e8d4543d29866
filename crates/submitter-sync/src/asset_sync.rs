//! # Asset Reconciliation
//!
//! Brings the content service up to date with the local asset catalog:
//!
//! 1. One `check_assets` call resolves every asset the service already holds.
//! 2. While any asset is unresolved, the pending assets are packed into a
//!    gzip tar in catalog order until the compressed archive reaches the batch
//!    size (checked after each entry, so a batch may end one entry over
//!    budget), then uploaded with `bulk_asset`.
//!
//! Batches are strictly sequential: batch *n + 1* is built only after batch
//! *n*'s URLs have been applied, so nothing resolved is offered twice. A batch
//! that resolves nothing aborts the run instead of looping forever.

use submitter_client::ContentService;
use tracing::{debug, info};

use crate::archive::ArchiveBuilder;
use crate::asset::AssetSet;
use crate::error::SyncError;

/// Outcome of one asset reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetSyncResult {
    /// Assets packed into upload batches, summed over all batches.
    pub uploaded: usize,
    /// Assets the service already held.
    pub present: usize,
    /// `bulk_asset` round trips performed.
    pub batches: usize,
}

impl AssetSyncResult {
    /// Number of assets in the catalog.
    pub fn total(&self) -> usize {
        self.uploaded + self.present
    }
}

/// Resolve a public URL for every asset in `assets`, uploading as needed.
///
/// # Errors
///
/// - `SyncError::Service` if any content service call fails.
/// - `SyncError::UrlConflict` if the service contradicts an earlier URL.
/// - `SyncError::BatchStalled` if an upload batch resolves no pending asset.
/// - `SyncError::Io` / `SyncError::Archive` if a batch cannot be built.
pub async fn reconcile_assets<C: ContentService>(
    assets: &mut AssetSet,
    batch_size: u64,
    service: &C,
) -> Result<AssetSyncResult, SyncError> {
    let total = assets.len();
    let known = service.check_assets(&assets.fingerprint_query()).await?;
    assets.accept_urls(&known)?;
    info!(
        total,
        pending = assets.pending().count(),
        "checked asset presence"
    );

    let mut uploaded = 0;
    let mut batches = 0;
    while !assets.all_resolved() {
        batches += 1;
        let pending_before = assets.pending().count();

        let (archive, offered) = build_batch(assets, batch_size)?;
        uploaded += offered;
        info!(
            batch = batches,
            assets = offered,
            bytes = archive.len(),
            "uploading asset batch"
        );

        let urls = service.bulk_asset(archive).await?;
        assets.accept_urls(&urls)?;

        let pending_after = assets.pending().count();
        if pending_after >= pending_before {
            return Err(SyncError::BatchStalled {
                batch: batches,
                offered,
            });
        }
        debug!(
            batch = batches,
            resolved = pending_before - pending_after,
            remaining = pending_after,
            "asset batch accepted"
        );
    }

    Ok(AssetSyncResult {
        uploaded,
        present: total.saturating_sub(uploaded),
        batches,
    })
}

/// Pack pending assets until the compressed archive reaches `batch_size`.
/// Returns the archive bytes and the number of assets in it.
fn build_batch(assets: &AssetSet, batch_size: u64) -> Result<(Vec<u8>, usize), SyncError> {
    let mut archive = ArchiveBuilder::new();
    for asset in assets.pending() {
        archive
            .append_file(asset.local_path(), asset.path())
            .map_err(|e| SyncError::io(asset.path(), e))?;
        debug!(local_path = %asset.local_path(), "added asset to batch");

        let compressed = archive.compressed_len().map_err(SyncError::Archive)?;
        if compressed as u64 >= batch_size {
            break;
        }
    }

    let offered = archive.entry_count();
    let bytes = archive.finish().map_err(SyncError::Archive)?;
    Ok((bytes, offered))
}
