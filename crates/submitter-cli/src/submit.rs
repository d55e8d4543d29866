//! # Submit
//!
//! Builds the HTTP client and a single-threaded runtime, drives one
//! submission to completion, and logs the summary line.

use std::time::Instant;

use anyhow::{Context, Result};
use submitter_client::ContentServiceClient;
use submitter_sync::{submit, SubmitConfig, SubmitState};

use crate::EXIT_REJECTED;

/// Run one submission and return the process exit status.
pub fn run_submit(config: &SubmitConfig) -> Result<u8> {
    let client = ContentServiceClient::new(config.service.clone())
        .context("failed to build content service client")?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    tracing::debug!(
        envelope_dir = %config.envelope_dir.display(),
        asset_dir = %config.asset_dir.display(),
        content_id_base = %config.content_id_base,
        batch_size = config.batch_size,
        "starting submission"
    );

    let started = Instant::now();
    let result = runtime
        .block_on(submit(config, &client))
        .context("submission failed")?;

    tracing::info!(
        state = %result.state,
        "Submitted {} / {} assets and {} / {} envelopes in {:.2?}.",
        result.assets.uploaded,
        result.assets.total(),
        result.envelopes.uploaded,
        result.envelopes.total,
        started.elapsed()
    );
    if result.envelopes.deleted > 0 {
        tracing::info!(deleted = result.envelopes.deleted, "removed stale envelopes");
    }

    Ok(exit_code(result.state))
}

/// Process exit status for a completed run.
pub fn exit_code(state: SubmitState) -> u8 {
    match state {
        SubmitState::Success | SubmitState::Noop => 0,
        SubmitState::Failure => EXIT_REJECTED,
    }
}
