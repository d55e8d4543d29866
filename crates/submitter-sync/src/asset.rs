//! # Asset Catalog
//!
//! Discovers every regular file beneath the asset root, fingerprints it, and
//! tracks the public URL the content service assigns to it.
//!
//! ## Invariants
//!
//! - An asset's identity is its `local_path`: the path relative to the asset
//!   root, `/`-separated on every platform.
//! - The fingerprint is the SHA-256 of the raw file bytes, computed once at
//!   discovery.
//! - A public URL, once set, is never replaced by a different URL. Repeating
//!   the same URL, or answering `null` for an already-resolved asset, is
//!   accepted.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Component, Path, PathBuf};

use submitter_client::AssetFingerprints;
use submitter_core::Fingerprint;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::SyncError;
use crate::NeedsUpload;

/// A binary file discovered beneath the asset root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    local_path: String,
    path: PathBuf,
    fingerprint: Fingerprint,
    public_url: Option<String>,
}

impl Asset {
    /// An unresolved asset. `path` is where its bytes live on disk.
    pub fn new(
        local_path: impl Into<String>,
        path: impl Into<PathBuf>,
        fingerprint: Fingerprint,
    ) -> Self {
        Self {
            local_path: local_path.into(),
            path: path.into(),
            fingerprint,
            public_url: None,
        }
    }

    pub fn local_path(&self) -> &str {
        &self.local_path
    }

    /// On-disk location of the asset's bytes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn public_url(&self) -> Option<&str> {
        self.public_url.as_deref()
    }

    /// Record the URL the service reported for this asset.
    ///
    /// `None` leaves an unresolved asset unresolved and a resolved one untouched.
    ///
    /// # Errors
    ///
    /// `SyncError::UrlConflict` if the asset already has a different URL.
    pub fn accept_url(&mut self, offered: Option<&str>) -> Result<(), SyncError> {
        if let (Some(existing), Some(offered)) = (self.public_url.as_deref(), offered) {
            if existing != offered {
                return Err(SyncError::UrlConflict {
                    local_path: self.local_path.clone(),
                    existing: existing.to_string(),
                    offered: offered.to_string(),
                });
            }
        }
        if self.public_url.is_none() {
            self.public_url = offered.map(str::to_owned);
        }
        Ok(())
    }
}

impl NeedsUpload for Asset {
    fn needs_upload(&self) -> bool {
        self.public_url.is_none()
    }
}

/// Every asset discovered in one run, keyed by local path.
#[derive(Debug, Clone, Default)]
pub struct AssetSet {
    assets: BTreeMap<String, Asset>,
}

impl AssetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recursively discover and fingerprint every regular file beneath `root`.
    ///
    /// Entries are visited in file-name order so catalog order (and therefore
    /// batch composition) is reproducible. Symlinks are followed.
    ///
    /// # Errors
    ///
    /// Any unreadable directory or file aborts the whole discovery.
    pub fn discover(root: impl AsRef<Path>) -> Result<Self, SyncError> {
        let root = root.as_ref();
        let mut set = Self::new();

        for entry in WalkDir::new(root)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|source| SyncError::Walk {
                root: root.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let local_path = relative_local_path(root, path);
            let file = File::open(path).map_err(|e| SyncError::io(path, e))?;
            let fingerprint = Fingerprint::from_reader(file).map_err(|e| SyncError::io(path, e))?;

            debug!(%local_path, %fingerprint, "discovered asset");
            set.insert(Asset::new(local_path, path, fingerprint));
        }

        info!(root = %root.display(), assets = set.len(), "asset discovery complete");
        Ok(set)
    }

    /// Add an asset, replacing any previous asset with the same local path.
    pub fn insert(&mut self, asset: Asset) {
        self.assets.insert(asset.local_path.clone(), asset);
    }

    pub fn get(&self, local_path: &str) -> Option<&Asset> {
        self.assets.get(local_path)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// All assets in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values()
    }

    /// Request payload for `check_assets`.
    pub fn fingerprint_query(&self) -> AssetFingerprints {
        self.assets
            .iter()
            .map(|(local_path, asset)| (local_path.clone(), asset.fingerprint))
            .collect()
    }

    /// Apply a `check_assets` or `bulk_asset` response.
    ///
    /// Accepts both `&AssetUrls` (nullable URLs) and `&UploadedAssetUrls`.
    /// Response keys that name no discovered asset are ignored with a warning.
    ///
    /// # Errors
    ///
    /// `SyncError::UrlConflict` if any asset is offered a second, different URL.
    /// Entries before the conflicting one have already been applied.
    pub fn accept_urls<'a, I, U>(&mut self, response: I) -> Result<(), SyncError>
    where
        I: IntoIterator<Item = (&'a String, U)>,
        U: Into<Option<&'a String>>,
    {
        for (local_path, offered) in response {
            let Some(asset) = self.assets.get_mut(local_path) else {
                warn!(%local_path, "content service returned a URL for an unknown asset");
                continue;
            };
            let offered: Option<&String> = offered.into();
            asset.accept_url(offered.map(String::as_str))?;
        }
        Ok(())
    }

    /// Assets still lacking a public URL, in catalog order.
    pub fn pending(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values().filter(|asset| asset.needs_upload())
    }

    /// True once every asset has a public URL.
    pub fn all_resolved(&self) -> bool {
        self.pending().next().is_none()
    }
}

/// `path` relative to `root`, joined with `/` regardless of platform.
fn relative_local_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
