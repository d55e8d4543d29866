//! # Envelope Catalog
//!
//! Metadata envelopes are the JSON documents that describe one page of
//! content each. They live at the top level of the envelope root, one file per
//! envelope, named after their percent-encoded content ID:
//! `https%3A%2F%2Fgithub.com%2Forg%2Frepo%2Fpage.json` holds the envelope for
//! `https://github.com/org/repo/page`.
//!
//! ## Asset offsets
//!
//! An envelope may carry an `asset_offsets` attribute mapping asset local
//! paths to the positions in `body` where a single placeholder character
//! stands in for that asset's public URL. [`Envelope::apply_asset_offsets()`]
//! splices the URLs in and drops the attribute. It must run before the
//! envelope is fingerprinted, since the fingerprint covers the rewritten body.
//!
//! Offsets count characters (Unicode scalar values), not UTF-8 bytes, so a
//! placeholder is always replaced whole. For ASCII bodies the two coincide.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};
use submitter_client::{ContentFingerprints, ContentPresence};
use submitter_core::{sha256_digest, CanonicalBytes, Fingerprint};
use tracing::{debug, info, warn};

use crate::asset::AssetSet;
use crate::error::SyncError;
use crate::NeedsUpload;

/// Attribute holding placeholder positions, keyed by asset local path.
pub const ASSET_OFFSETS_KEY: &str = "asset_offsets";

/// Attribute holding the rendered HTML the placeholders live in.
pub const BODY_KEY: &str = "body";

const ENVELOPE_SUFFIX: &str = ".json";

/// A metadata envelope read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    file_name: String,
    content_id: String,
    document: Map<String, Value>,
    upload_needed: bool,
}

impl Envelope {
    /// Wrap a parsed document. The content ID is derived from `file_name`.
    pub fn new(file_name: impl Into<String>, document: Map<String, Value>) -> Self {
        let file_name = file_name.into();
        let content_id = percent_decode_str(encoded_stem(&file_name))
            .decode_utf8_lossy()
            .into_owned();
        Self {
            file_name,
            content_id,
            document,
            upload_needed: true,
        }
    }

    /// Read and parse one envelope file.
    fn read(path: &Path, file_name: String) -> Result<Self, SyncError> {
        let file = File::open(path).map_err(|e| SyncError::io(path, e))?;
        let value: Value = serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            SyncError::MalformedEnvelope {
                path: path.to_path_buf(),
                source,
            }
        })?;
        match value {
            Value::Object(document) => Ok(Self::new(file_name, document)),
            _ => Err(SyncError::NotAnObject {
                path: path.to_path_buf(),
            }),
        }
    }

    /// File name relative to the envelope root; also the archive entry name.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The file name without `.json`, still percent-encoded.
    pub fn encoded_content_id(&self) -> &str {
        encoded_stem(&self.file_name)
    }

    /// The percent-decoded content ID, typically a URL.
    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }

    /// Replace each asset placeholder in `body` with the asset's public URL
    /// and remove the `asset_offsets` attribute. A no-op for envelopes
    /// without offsets.
    ///
    /// When two assets claim the same offset, the one listed later in the
    /// document's `asset_offsets` wins and a warning is logged.
    ///
    /// # Errors
    ///
    /// - `InvalidOffsets` if the attribute is not a map of integer arrays or
    ///   the body is not a string.
    /// - `UnknownAsset` / `UnresolvedAsset` if a referenced asset was not
    ///   discovered or has no public URL.
    pub fn apply_asset_offsets(&mut self, assets: &AssetSet) -> Result<(), SyncError> {
        let Some(raw_offsets) = self.document.get(ASSET_OFFSETS_KEY) else {
            return Ok(());
        };
        let paths_by_offset = self.paths_by_offset(raw_offsets)?;

        let body = match self.document.get(BODY_KEY) {
            Some(Value::String(body)) => body,
            _ if paths_by_offset.is_empty() => {
                self.document.remove(ASSET_OFFSETS_KEY);
                return Ok(());
            }
            _ => return Err(self.invalid_offsets("body is missing or not a string")),
        };

        let char_starts: Vec<usize> = body.char_indices().map(|(i, _)| i).collect();
        let mut rebuilt = String::with_capacity(body.len());
        let mut last = 0;
        for (&offset, local_path) in &paths_by_offset {
            // Offsets at or past the end append the URL to the body.
            let start = char_starts.get(offset).copied().unwrap_or(body.len());
            rebuilt.push_str(&body[last..start]);
            rebuilt.push_str(self.resolve(assets, local_path)?);
            last = char_starts
                .get(offset.saturating_add(1))
                .copied()
                .unwrap_or(body.len());
        }
        rebuilt.push_str(&body[last..]);

        debug!(
            content_id = %self.content_id,
            placeholders = paths_by_offset.len(),
            "applied asset offsets"
        );
        self.document
            .insert(BODY_KEY.to_string(), Value::String(rebuilt));
        self.document.remove(ASSET_OFFSETS_KEY);
        Ok(())
    }

    /// Flatten `asset_offsets` into offset -> local path, last claim winning.
    fn paths_by_offset(&self, raw_offsets: &Value) -> Result<BTreeMap<usize, String>, SyncError> {
        let Value::Object(by_path) = raw_offsets else {
            return Err(self.invalid_offsets("asset_offsets is not an object"));
        };

        let mut paths_by_offset = BTreeMap::new();
        for (local_path, offsets) in by_path {
            let Value::Array(offsets) = offsets else {
                return Err(self.invalid_offsets(format!("offsets for {local_path} are not an array")));
            };
            for offset in offsets {
                let offset = offset
                    .as_u64()
                    .and_then(|o| usize::try_from(o).ok())
                    .ok_or_else(|| {
                        self.invalid_offsets(format!(
                            "offset {offset} for {local_path} is not a non-negative integer"
                        ))
                    })?;
                if let Some(previous) = paths_by_offset.insert(offset, local_path.clone()) {
                    warn!(
                        content_id = %self.content_id,
                        offset,
                        previous = %previous,
                        winner = %local_path,
                        "two assets claim the same offset"
                    );
                }
            }
        }
        Ok(paths_by_offset)
    }

    fn resolve<'a>(&self, assets: &'a AssetSet, local_path: &str) -> Result<&'a str, SyncError> {
        let asset = assets
            .get(local_path)
            .ok_or_else(|| SyncError::UnknownAsset {
                content_id: self.content_id.clone(),
                local_path: local_path.to_string(),
            })?;
        asset.public_url().ok_or_else(|| SyncError::UnresolvedAsset {
            content_id: self.content_id.clone(),
            local_path: local_path.to_string(),
        })
    }

    fn invalid_offsets(&self, reason: impl Into<String>) -> SyncError {
        SyncError::InvalidOffsets {
            content_id: self.content_id.clone(),
            reason: reason.into(),
        }
    }

    /// Canonical form of the document: the upload payload and fingerprint input.
    pub fn serialize(&self) -> Result<CanonicalBytes, SyncError> {
        Ok(CanonicalBytes::new(&self.document)?)
    }

    /// SHA-256 of the canonical document.
    pub fn fingerprint(&self) -> Result<Fingerprint, SyncError> {
        Ok(sha256_digest(&self.serialize()?))
    }

    /// Apply this envelope's entry of a `check_content` response. An absent
    /// entry leaves the envelope marked for upload.
    pub fn accept_presence(&mut self, response: &ContentPresence) {
        match response.get(&self.content_id) {
            Some(present) => self.upload_needed = !present,
            None => debug!(content_id = %self.content_id, "no presence reported; will upload"),
        }
    }
}

impl NeedsUpload for Envelope {
    fn needs_upload(&self) -> bool {
        self.upload_needed
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let upload_mark = if self.needs_upload() { ": *" } else { "" };
        write!(f, "Envelope({}{upload_mark})", self.content_id)
    }
}

fn encoded_stem(file_name: &str) -> &str {
    file_name.strip_suffix(ENVELOPE_SUFFIX).unwrap_or(file_name)
}

/// All envelopes discovered in one run, in file-name order.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeSet {
    envelopes: Vec<Envelope>,
    by_content_id: HashMap<String, usize>,
}

impl EnvelopeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every `*.json` file at the top level of `root`.
    ///
    /// Subdirectories are skipped with a warning; other files are ignored.
    ///
    /// # Errors
    ///
    /// Unreadable or malformed envelopes and duplicate content IDs abort
    /// discovery.
    pub fn discover(root: impl AsRef<Path>) -> Result<Self, SyncError> {
        let root = root.as_ref();
        let mut entries: Vec<(String, PathBuf)> = Vec::new();
        for entry in fs::read_dir(root).map_err(|e| SyncError::io(root, e))? {
            let entry = entry.map_err(|e| SyncError::io(root, e))?;
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if path.is_dir() {
                warn!(path = %path.display(), "skipping subdirectory of the envelope directory");
                continue;
            }
            if !file_name.ends_with(ENVELOPE_SUFFIX) {
                debug!(%file_name, "skipping non-envelope file");
                continue;
            }
            entries.push((file_name, path));
        }
        entries.sort();

        let mut set = Self::new();
        for (file_name, path) in entries {
            set.push(Envelope::read(&path, file_name)?)?;
        }

        info!(root = %root.display(), envelopes = set.len(), "envelope discovery complete");
        Ok(set)
    }

    /// Append an envelope.
    ///
    /// # Errors
    ///
    /// `SyncError::DuplicateContentId` if another envelope already has the
    /// same content ID.
    pub fn push(&mut self, envelope: Envelope) -> Result<(), SyncError> {
        if let Some(&existing) = self.by_content_id.get(envelope.content_id()) {
            return Err(SyncError::DuplicateContentId {
                content_id: envelope.content_id().to_string(),
                first: self.envelopes[existing].file_name.clone(),
                second: envelope.file_name,
            });
        }
        self.by_content_id
            .insert(envelope.content_id.clone(), self.envelopes.len());
        self.envelopes.push(envelope);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }

    pub fn get(&self, content_id: &str) -> Option<&Envelope> {
        self.by_content_id
            .get(content_id)
            .map(|&i| &self.envelopes[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Envelope> {
        self.envelopes.iter()
    }

    /// Substitute asset URLs into every envelope. Must run exactly once,
    /// after every referenced asset has a public URL.
    pub fn apply_asset_offsets(&mut self, assets: &AssetSet) -> Result<(), SyncError> {
        for envelope in &mut self.envelopes {
            envelope.apply_asset_offsets(assets)?;
        }
        Ok(())
    }

    /// Request payload for `check_content`, over the rewritten documents.
    pub fn fingerprint_query(&self) -> Result<ContentFingerprints, SyncError> {
        self.envelopes
            .iter()
            .map(|e| Ok((e.content_id.clone(), e.fingerprint()?)))
            .collect()
    }

    /// Apply a `check_content` response to every envelope.
    pub fn accept_presence(&mut self, response: &ContentPresence) {
        for envelope in &mut self.envelopes {
            envelope.accept_presence(response);
        }
    }

    /// Envelopes that are new or changed and must be uploaded.
    pub fn to_upload(&self) -> impl Iterator<Item = &Envelope> {
        self.envelopes.iter().filter(|e| e.needs_upload())
    }

    /// Envelopes already present remotely that must be retained.
    pub fn to_keep(&self) -> impl Iterator<Item = &Envelope> {
        self.envelopes.iter().filter(|e| !e.needs_upload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use serde_json::json;

    fn envelope(file_name: &str, document: Value) -> Envelope {
        match document {
            Value::Object(map) => Envelope::new(file_name, map),
            other => panic!("test envelope must be an object, got {other}"),
        }
    }

    fn resolved_assets(entries: &[(&str, &str)]) -> AssetSet {
        let mut set = AssetSet::new();
        for (local_path, url) in entries {
            let mut asset = Asset::new(*local_path, *local_path, Fingerprint::of(local_path.as_bytes()));
            asset.accept_url(Some(url)).unwrap();
            set.insert(asset);
        }
        set
    }

    #[test]
    fn content_id_is_decoded_file_stem() {
        let e = envelope(
            "https%3A%2F%2Fgithub.com%2Forg%2Frepo%2Fpage.json",
            json!({"title": "aaa", "body": "<p>This is an envelope</p>"}),
        );
        assert_eq!(e.encoded_content_id(), "https%3A%2F%2Fgithub.com%2Forg%2Frepo%2Fpage");
        assert_eq!(e.content_id(), "https://github.com/org/repo/page");
        assert_eq!(e.document()["title"], "aaa");
        assert!(e.needs_upload());
    }

    #[test]
    fn content_id_keeps_plus_signs() {
        let e = envelope("a+b%20c.json", json!({}));
        assert_eq!(e.content_id(), "a+b c");
    }

    #[test]
    fn apply_asset_offsets_splices_urls() {
        let mut e = envelope(
            "page.json",
            json!({
                "body": "<p>Hey everyone here X are X some assets X</p>",
                "asset_offsets": {
                    "local/one.jpg": [21, 41],
                    "local/three.png": [27]
                }
            }),
        );
        let assets = resolved_assets(&[
            ("local/one.jpg", "https://assets.horse/one-111.jpg"),
            ("local/three.png", "https://assets.horse/three-333.png"),
        ]);

        e.apply_asset_offsets(&assets).unwrap();

        assert_eq!(
            e.document()["body"],
            "<p>Hey everyone here https://assets.horse/one-111.jpg are \
             https://assets.horse/three-333.png some assets \
             https://assets.horse/one-111.jpg</p>"
        );
        assert!(!e.document().contains_key("asset_offsets"));
    }

    #[test]
    fn apply_asset_offsets_without_attribute_is_noop() {
        let mut e = envelope("page.json", json!({"body": "<p>X</p>"}));
        let before = e.clone();
        e.apply_asset_offsets(&AssetSet::new()).unwrap();
        assert_eq!(e, before);
    }

    #[test]
    fn apply_asset_offsets_counts_characters() {
        let mut e = envelope(
            "page.json",
            json!({
                "body": "caf\u{e9} \u{2603} end",
                "asset_offsets": {"snow.png": [5]}
            }),
        );
        let assets = resolved_assets(&[("snow.png", "https://cdn/snow.png")]);
        e.apply_asset_offsets(&assets).unwrap();
        assert_eq!(e.document()["body"], "caf\u{e9} https://cdn/snow.png end");
    }

    #[test]
    fn apply_asset_offsets_placeholder_at_edges() {
        let mut e = envelope(
            "page.json",
            json!({"body": "XmiddleX", "asset_offsets": {"a.png": [0, 7]}}),
        );
        let assets = resolved_assets(&[("a.png", "A")]);
        e.apply_asset_offsets(&assets).unwrap();
        assert_eq!(e.document()["body"], "AmiddleA");
    }

    #[test]
    fn apply_asset_offsets_collision_last_key_wins() {
        let mut e = envelope(
            "page.json",
            json!({"body": "[X]", "asset_offsets": {"a.png": [1], "b.png": [1]}}),
        );
        let assets = resolved_assets(&[("a.png", "A"), ("b.png", "B")]);
        e.apply_asset_offsets(&assets).unwrap();
        assert_eq!(e.document()["body"], "[B]");
    }

    #[test]
    fn apply_asset_offsets_collision_follows_document_order() {
        let document: Value = serde_json::from_str(
            r#"{"body": "[X]", "asset_offsets": {"b.png": [1], "a.png": [1]}}"#,
        )
        .unwrap();
        let mut e = envelope("page.json", document);
        let assets = resolved_assets(&[("a.png", "A"), ("b.png", "B")]);
        e.apply_asset_offsets(&assets).unwrap();
        assert_eq!(e.document()["body"], "[A]");
    }

    #[test]
    fn apply_asset_offsets_at_body_length_appends() {
        let mut e = envelope(
            "page.json",
            json!({"body": "abc", "asset_offsets": {"a.png": [3]}}),
        );
        e.apply_asset_offsets(&resolved_assets(&[("a.png", "A")]))
            .unwrap();
        assert_eq!(e.document()["body"], "abcA");
        assert!(e.document().get(ASSET_OFFSETS_KEY).is_none());
    }

    #[test]
    fn apply_asset_offsets_past_body_end_appends_in_order() {
        let mut e = envelope(
            "page.json",
            json!({"body": "aXc", "asset_offsets": {"a.png": [1, 9], "b.png": [5]}}),
        );
        e.apply_asset_offsets(&resolved_assets(&[("a.png", "A"), ("b.png", "B")]))
            .unwrap();
        assert_eq!(e.document()["body"], "aAcBA");
    }

    #[test]
    fn apply_asset_offsets_rejects_negative_offsets() {
        let mut e = envelope(
            "page.json",
            json!({"body": "abc", "asset_offsets": {"a.png": [-1]}}),
        );
        let err = e
            .apply_asset_offsets(&resolved_assets(&[("a.png", "A")]))
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidOffsets { .. }), "got {err:?}");
    }

    #[test]
    fn apply_asset_offsets_requires_known_resolved_assets() {
        let mut unknown = envelope(
            "page.json",
            json!({"body": "X", "asset_offsets": {"ghost.png": [0]}}),
        );
        assert!(matches!(
            unknown.apply_asset_offsets(&AssetSet::new()).unwrap_err(),
            SyncError::UnknownAsset { .. }
        ));

        let mut unresolved = envelope(
            "page.json",
            json!({"body": "X", "asset_offsets": {"a.png": [0]}}),
        );
        let mut assets = AssetSet::new();
        assets.insert(Asset::new("a.png", "a.png", Fingerprint::of(b"a")));
        assert!(matches!(
            unresolved.apply_asset_offsets(&assets).unwrap_err(),
            SyncError::UnresolvedAsset { .. }
        ));
    }

    #[test]
    fn fingerprint_covers_substituted_body() {
        let mut e = envelope(
            "page.json",
            json!({"body": "X", "asset_offsets": {"a.png": [0]}}),
        );
        e.apply_asset_offsets(&resolved_assets(&[("a.png", "https://cdn/a.png")]))
            .unwrap();

        let expected = envelope("other.json", json!({"body": "https://cdn/a.png"}));
        assert_eq!(e.fingerprint().unwrap(), expected.fingerprint().unwrap());
    }

    #[test]
    fn fingerprint_ignores_key_order_and_whitespace() {
        let a: Map<String, Value> =
            serde_json::from_str(r#"{"title":"t","body":"b","tags":["x"]}"#).unwrap();
        let b: Map<String, Value> = serde_json::from_str(
            "{\n  \"tags\" : [ \"x\" ],\n  \"body\": \"b\",\n\t\"title\": \"t\"\n}\n",
        )
        .unwrap();
        assert_eq!(
            Envelope::new("a.json", a).fingerprint().unwrap(),
            Envelope::new("b.json", b).fingerprint().unwrap()
        );
    }

    #[test]
    fn accept_presence_flags_and_defaults() {
        let mut set = EnvelopeSet::new();
        set.push(envelope("one.json", json!({}))).unwrap();
        set.push(envelope("two.json", json!({}))).unwrap();
        set.push(envelope("three.json", json!({}))).unwrap();

        let mut response = ContentPresence::new();
        response.insert("one".into(), true);
        response.insert("two".into(), false);
        set.accept_presence(&response);

        let keep: Vec<&str> = set.to_keep().map(Envelope::content_id).collect();
        let upload: Vec<&str> = set.to_upload().map(Envelope::content_id).collect();
        assert_eq!(keep, vec!["one"]);
        assert_eq!(upload, vec!["two", "three"]);
        assert_eq!(set.get("one").unwrap().to_string(), "Envelope(one)");
        assert_eq!(set.get("three").unwrap().to_string(), "Envelope(three: *)");
    }

    #[test]
    fn push_rejects_duplicate_content_ids() {
        let mut set = EnvelopeSet::new();
        set.push(envelope("a%2Fb.json", json!({}))).unwrap();
        match set.push(envelope("a%2fb.json", json!({}))).unwrap_err() {
            SyncError::DuplicateContentId {
                content_id,
                first,
                second,
            } => {
                assert_eq!(content_id, "a/b");
                assert_eq!(first, "a%2Fb.json");
                assert_eq!(second, "a%2fb.json");
            }
            other => panic!("expected DuplicateContentId, got {other:?}"),
        }
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn discover_reads_top_level_json_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), r#"{"body": "two"}"#).unwrap();
        std::fs::write(dir.path().join("a.json"), r#"{"body": "one"}"#).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/c.json"), r#"{"body": "three"}"#).unwrap();

        let set = EnvelopeSet::discover(dir.path()).unwrap();
        let ids: Vec<&str> = set.iter().map(Envelope::content_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn discover_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        let err = EnvelopeSet::discover(dir.path()).unwrap_err();
        assert!(matches!(err, SyncError::MalformedEnvelope { .. }), "got {err:?}");
    }

    #[test]
    fn discover_rejects_non_object_documents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("list.json"), "[1, 2, 3]").unwrap();
        let err = EnvelopeSet::discover(dir.path()).unwrap_err();
        assert!(matches!(err, SyncError::NotAnObject { .. }), "got {err:?}");
    }

    #[test]
    fn discover_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = EnvelopeSet::discover(dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }), "got {err:?}");
    }
}
