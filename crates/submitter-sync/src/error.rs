//! # Error Hierarchy
//!
//! Every variant here is fatal: it aborts the run and propagates to the
//! caller of [`submit()`](crate::submit::submit). Partial content rejection
//! by the service is not an error; it is reported as
//! [`SubmitState::Failure`](crate::submit::SubmitState::Failure).

use std::path::PathBuf;

use submitter_client::ContentServiceError;
use submitter_core::CanonicalizationError;
use thiserror::Error;

/// Errors raised while discovering or reconciling assets and envelopes.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A file or directory could not be opened or read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The recursive asset walk failed (permission denied, symlink loop).
    #[error("failed to walk {}: {source}", .root.display())]
    Walk {
        root: PathBuf,
        source: walkdir::Error,
    },

    /// An envelope file is not valid JSON.
    #[error("malformed envelope {}: {source}", .path.display())]
    MalformedEnvelope {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// An envelope file parsed, but its top level is not a JSON object.
    #[error("envelope {} is not a JSON object", .path.display())]
    NotAnObject { path: PathBuf },

    /// Two envelope files decode to the same content ID.
    #[error("duplicate content ID {content_id}: {first} and {second}")]
    DuplicateContentId {
        content_id: String,
        first: String,
        second: String,
    },

    /// The service offered a second, different public URL for an asset.
    #[error("asset {local_path} is already published at {existing}, refusing conflicting URL {offered}")]
    UrlConflict {
        local_path: String,
        existing: String,
        offered: String,
    },

    /// An envelope's `asset_offsets` names an asset that was never discovered.
    #[error("envelope {content_id} references unknown asset {local_path}")]
    UnknownAsset {
        content_id: String,
        local_path: String,
    },

    /// An envelope references an asset whose public URL is still unknown.
    #[error("envelope {content_id} references asset {local_path}, which has no public URL")]
    UnresolvedAsset {
        content_id: String,
        local_path: String,
    },

    /// `asset_offsets` is malformed or points outside the body.
    #[error("envelope {content_id} has invalid asset offsets: {reason}")]
    InvalidOffsets { content_id: String, reason: String },

    /// A bulk asset batch resolved none of the assets it carried.
    #[error("asset batch {batch} uploaded {offered} assets but resolved none of them")]
    BatchStalled { batch: usize, offered: usize },

    /// Building a gzip tar archive failed.
    #[error("failed to build archive: {0}")]
    Archive(#[source] std::io::Error),

    /// Canonical serialization of an envelope or metadata entry failed.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    /// A content service call failed.
    #[error(transparent)]
    Service(#[from] ContentServiceError),
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
