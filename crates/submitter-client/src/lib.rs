//! # submitter-client -- Typed Rust client for the content service
//!
//! The content service is a content-addressed store for rendered envelopes and
//! their binary assets. The submitter talks to it through exactly four
//! operations, modelled by the [`ContentService`] trait:
//!
//! | Operation | Method | Path | Request | Response |
//! |-----------|--------|------|---------|----------|
//! | `check_assets` | GET | `/checkassets` | `{localPath: sha256}` | `{localPath: url \| null}` |
//! | `bulk_asset` | POST | `/bulkasset` | gzip tar of asset files | `{localPath: url}` |
//! | `check_content` | GET | `/checkcontent` | `{contentID: sha256}` | `{contentID: bool}` |
//! | `bulk_content` | POST | `/bulkcontent` | gzip tar of envelopes + metadata | `{accepted, deleted, failed}` |
//!
//! ## Architecture
//!
//! The reconciliation engine is generic over [`ContentService`], so it can be
//! driven by the reqwest-backed [`ContentServiceClient`] in production and by an
//! in-memory fake in tests. Every call fails the caller on a non-2xx status;
//! there is no retry layer.

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::ContentServiceClient;
pub use config::{ConfigError, ContentServiceConfig};
pub use error::ContentServiceError;
pub use types::{
    AssetFingerprints, AssetUrls, BulkContentResponse, ContentFingerprints, ContentPresence,
    UploadedAssetUrls,
};

use std::future::Future;

/// The remote operations the reconciliation engine depends on.
///
/// Calls are issued strictly one at a time: every caller awaits the returned
/// future before constructing the next request.
pub trait ContentService {
    /// Ask which assets are already stored, keyed by local path.
    /// A `None` URL means the asset still needs uploading.
    fn check_assets(
        &self,
        query: &AssetFingerprints,
    ) -> impl Future<Output = Result<AssetUrls, ContentServiceError>> + Send;

    /// Upload a gzip-compressed tar of asset files. Returns the public URL
    /// assigned to every asset accepted from the archive.
    fn bulk_asset(
        &self,
        archive: Vec<u8>,
    ) -> impl Future<Output = Result<UploadedAssetUrls, ContentServiceError>> + Send;

    /// Ask which envelopes are already stored with a matching fingerprint.
    fn check_content(
        &self,
        query: &ContentFingerprints,
    ) -> impl Future<Output = Result<ContentPresence, ContentServiceError>> + Send;

    /// Upload a gzip-compressed tar of envelopes plus the `metadata/` entries.
    fn bulk_content(
        &self,
        archive: Vec<u8>,
    ) -> impl Future<Output = Result<BulkContentResponse, ContentServiceError>> + Send;
}
