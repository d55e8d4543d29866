//! # Submission
//!
//! Runs asset reconciliation, then envelope reconciliation. Envelopes depend
//! on the public URLs the asset stage resolves, so the order is fixed.

use std::fmt;

use submitter_client::ContentService;
use tracing::info;

use crate::asset::AssetSet;
use crate::asset_sync::{reconcile_assets, AssetSyncResult};
use crate::config::SubmitConfig;
use crate::envelope::EnvelopeSet;
use crate::envelope_sync::{reconcile_envelopes, EnvelopeSyncResult};
use crate::error::SyncError;

/// Overall outcome of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmitState {
    /// New or changed envelopes were published.
    Success,
    /// Nothing new was pushed.
    Noop,
    /// The service rejected at least one envelope.
    Failure,
}

impl SubmitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Noop => "noop",
            Self::Failure => "failure",
        }
    }
}

impl From<&EnvelopeSyncResult> for SubmitState {
    fn from(result: &EnvelopeSyncResult) -> Self {
        if result.failed > 0 {
            Self::Failure
        } else if result.uploaded == 0 {
            Self::Noop
        } else {
            Self::Success
        }
    }
}

impl fmt::Display for SubmitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`submit()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitResult {
    pub assets: AssetSyncResult,
    pub envelopes: EnvelopeSyncResult,
    pub state: SubmitState,
}

/// Synchronize the configured asset and envelope directories with `service`.
///
/// # Errors
///
/// Any fatal [`SyncError`] aborts the run at the point it occurs. Envelope
/// rejections are not errors; they yield [`SubmitState::Failure`].
pub async fn submit<C: ContentService>(
    config: &SubmitConfig,
    service: &C,
) -> Result<SubmitResult, SyncError> {
    let mut assets = AssetSet::discover(&config.asset_dir)?;
    let asset_result = reconcile_assets(&mut assets, config.batch_size, service).await?;

    let mut envelopes = EnvelopeSet::discover(&config.envelope_dir)?;
    envelopes.apply_asset_offsets(&assets)?;
    let envelope_result =
        reconcile_envelopes(&mut envelopes, &config.content_id_base, service).await?;

    let state = SubmitState::from(&envelope_result);
    info!(%state, "submission finished");

    Ok(SubmitResult {
        assets: asset_result,
        envelopes: envelope_result,
        state,
    })
}
