//! Request/response types for the content service API.
//!
//! Maps are `BTreeMap`s so request bodies serialize in a stable key order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use submitter_core::Fingerprint;

/// `GET /checkassets` request: asset local path to content fingerprint.
pub type AssetFingerprints = BTreeMap<String, Fingerprint>;

/// `GET /checkassets` response: local path to public URL, `None` when the
/// service does not hold the asset yet.
pub type AssetUrls = BTreeMap<String, Option<String>>;

/// `POST /bulkasset` response: local path to the public URL just assigned.
pub type UploadedAssetUrls = BTreeMap<String, String>;

/// `GET /checkcontent` request: content ID to envelope fingerprint.
pub type ContentFingerprints = BTreeMap<String, Fingerprint>;

/// `GET /checkcontent` response: content ID to "present with this fingerprint".
pub type ContentPresence = BTreeMap<String, bool>;

/// `POST /bulkcontent` response counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkContentResponse {
    /// Envelopes stored from the archive.
    #[serde(default)]
    pub accepted: u64,
    /// Remote envelopes removed because they were neither uploaded nor kept.
    #[serde(default)]
    pub deleted: u64,
    /// Envelopes from the archive the service rejected.
    #[serde(default)]
    pub failed: u64,
}
