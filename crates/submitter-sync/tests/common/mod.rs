//! In-memory content service shared by the integration tests.
//!
//! Stores assets by fingerprint and envelopes by content ID, reading the
//! uploaded gzip tar archives the same way the real service does.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;
use std::sync::Mutex;

use flate2::read::GzDecoder;
use percent_encoding::percent_decode_str;
use serde_json::Value;
use submitter_client::{
    AssetFingerprints, AssetUrls, BulkContentResponse, ContentFingerprints, ContentPresence,
    ContentService, ContentServiceError, UploadedAssetUrls,
};
use submitter_core::Fingerprint;

pub const ASSET_HOST: &str = "https://assets.example.com";
pub const CONTENT_ID_BASE: &str = "https://github.com/org/repo/";

/// What the fake received in one `bulk_content` call.
#[derive(Debug, Clone)]
pub struct ContentUpload {
    pub content_id_base: String,
    pub keep: Vec<String>,
    pub envelopes: BTreeMap<String, Value>,
}

#[derive(Default)]
struct State {
    assets: BTreeMap<Fingerprint, String>,
    content: BTreeMap<String, Fingerprint>,
    asset_batches: Vec<Vec<String>>,
    content_uploads: Vec<ContentUpload>,
    calls: Vec<&'static str>,
}

#[derive(Default)]
pub struct FakeContentService {
    state: Mutex<State>,
    ignore_asset_uploads: bool,
    reject_envelopes: bool,
}

impl FakeContentService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every `bulk_asset` call with an empty map.
    pub fn ignoring_asset_uploads(mut self) -> Self {
        self.ignore_asset_uploads = true;
        self
    }

    /// Report every uploaded envelope as failed instead of storing it.
    pub fn rejecting_envelopes(mut self) -> Self {
        self.reject_envelopes = true;
        self
    }

    /// Store an asset as if it had been uploaded earlier.
    pub fn seed_asset(&self, local_path: &str, bytes: &[u8]) -> String {
        let fingerprint = Fingerprint::of(bytes);
        let url = asset_url(local_path, &fingerprint);
        self.state
            .lock()
            .unwrap()
            .assets
            .insert(fingerprint, url.clone());
        url
    }

    /// Store an envelope fingerprint under a content ID.
    pub fn seed_content(&self, content_id: &str, fingerprint: Fingerprint) {
        self.state
            .lock()
            .unwrap()
            .content
            .insert(content_id.to_string(), fingerprint);
    }

    pub fn asset_batches(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().asset_batches.clone()
    }

    pub fn content_uploads(&self) -> Vec<ContentUpload> {
        self.state.lock().unwrap().content_uploads.clone()
    }

    pub fn stored_content_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().content.keys().cloned().collect()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }
}

fn asset_url(local_path: &str, fingerprint: &Fingerprint) -> String {
    let name = Path::new(local_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{ASSET_HOST}/{}-{name}", &fingerprint.to_hex()[..12])
}

pub fn read_archive(archive: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut tar = tar::Archive::new(GzDecoder::new(archive));
    let mut entries = Vec::new();
    for entry in tar.entries().unwrap() {
        let mut entry = entry.unwrap();
        let name = entry.path().unwrap().to_string_lossy().into_owned();
        let mut body = Vec::new();
        entry.read_to_end(&mut body).unwrap();
        entries.push((name, body));
    }
    entries
}

impl ContentService for FakeContentService {
    async fn check_assets(&self, query: &AssetFingerprints) -> Result<AssetUrls, ContentServiceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("check_assets");
        Ok(query
            .iter()
            .map(|(local_path, fingerprint)| {
                (local_path.clone(), state.assets.get(fingerprint).cloned())
            })
            .collect())
    }

    async fn bulk_asset(&self, archive: Vec<u8>) -> Result<UploadedAssetUrls, ContentServiceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("bulk_asset");
        let entries = read_archive(&archive);
        state
            .asset_batches
            .push(entries.iter().map(|(name, _)| name.clone()).collect());
        if self.ignore_asset_uploads {
            return Ok(UploadedAssetUrls::new());
        }

        let mut urls = UploadedAssetUrls::new();
        for (name, body) in entries {
            let fingerprint = Fingerprint::of(&body);
            let url = asset_url(&name, &fingerprint);
            state.assets.insert(fingerprint, url.clone());
            urls.insert(name, url);
        }
        Ok(urls)
    }

    async fn check_content(
        &self,
        query: &ContentFingerprints,
    ) -> Result<ContentPresence, ContentServiceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("check_content");
        Ok(query
            .iter()
            .map(|(content_id, fingerprint)| {
                let present = state.content.get(content_id) == Some(fingerprint);
                (content_id.clone(), present)
            })
            .collect())
    }

    async fn bulk_content(&self, archive: Vec<u8>) -> Result<BulkContentResponse, ContentServiceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("bulk_content");

        let mut upload = ContentUpload {
            content_id_base: String::new(),
            keep: Vec::new(),
            envelopes: BTreeMap::new(),
        };
        let mut stored = BTreeMap::new();
        for (name, body) in read_archive(&archive) {
            match name.as_str() {
                "metadata/config.json" => {
                    let config: Value = serde_json::from_slice(&body).unwrap();
                    upload.content_id_base = config["contentIDBase"].as_str().unwrap().to_string();
                }
                "metadata/keep.json" => {
                    let keep: Value = serde_json::from_slice(&body).unwrap();
                    upload.keep = keep["keep"]
                        .as_array()
                        .unwrap()
                        .iter()
                        .map(|id| id.as_str().unwrap().to_string())
                        .collect();
                }
                _ => {
                    let stem = name.strip_suffix(".json").unwrap_or(&name);
                    let content_id = percent_decode_str(stem).decode_utf8_lossy().into_owned();
                    stored.insert(content_id, Fingerprint::of(&body));
                    upload
                        .envelopes
                        .insert(name.clone(), serde_json::from_slice(&body).unwrap());
                }
            }
        }

        let mut response = BulkContentResponse::default();
        if self.reject_envelopes {
            response.failed = stored.len() as u64;
        } else {
            let retained: BTreeSet<&String> = upload.keep.iter().chain(stored.keys()).collect();
            let stale: Vec<String> = state
                .content
                .keys()
                .filter(|id| id.starts_with(&upload.content_id_base) && !retained.contains(id))
                .cloned()
                .collect();
            for id in &stale {
                state.content.remove(id);
            }
            response.deleted = stale.len() as u64;
            response.accepted = stored.len() as u64;
            state.content.extend(stored);
        }

        state.content_uploads.push(upload);
        Ok(response)
    }
}

/// Write `contents` at `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, contents: impl AsRef<[u8]>) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

/// File name for an envelope whose content ID is `CONTENT_ID_BASE + name`.
pub fn envelope_file_name(name: &str) -> String {
    let content_id = format!("{CONTENT_ID_BASE}{name}");
    format!(
        "{}.json",
        percent_encoding::utf8_percent_encode(&content_id, percent_encoding::NON_ALPHANUMERIC)
    )
}
