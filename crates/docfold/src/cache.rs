// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The document-level incremental build cache.
//!
//! [`BuildCache`] decides, per source document, whether the previous
//! build output can be kept. Three keys guard the decision:
//!
//! - a **global fingerprint** hashed over the core template tree and the
//!   config entry points (any change rebuilds everything);
//! - an optional **upstream tag** (a remote template-library commit id;
//!   a changed tag wipes the whole document map);
//! - the per-document **content hash** supplied by the caller.
//!
//! The manifest (`docs-cache.json`) is loaded once at startup, mutated in
//! memory, and flushed once at the end of the build if dirty. A corrupt or
//! schema-mismatched manifest loads as empty, forcing a full rebuild; that
//! is a cache miss, never an error.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::rules::unix_now;

/// Manifest schema version; any other value discards the manifest.
pub const MANIFEST_VERSION: u32 = 1;

/// File name of the persisted manifest inside the cache directory.
const MANIFEST_FILE: &str = "docs-cache.json";

/// Per-document cache record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Content hash of the source document at the last build.
    pub hash: String,
    /// Unix timestamp of the last build.
    pub updated_at: u64,
    /// Output location, relative to the output root, without extension.
    pub output: String,
}

/// The persisted build-cache manifest.
#[derive(Debug, Serialize, Deserialize)]
pub struct BuildCacheManifest {
    /// Schema version; must equal [`MANIFEST_VERSION`].
    pub version: u32,
    /// Global fingerprint recorded at the last build.
    pub global: Option<String>,
    /// Upstream tag recorded at the last build.
    pub sha: Option<String>,
    /// Per-document records keyed by repo-relative source path.
    pub docs: BTreeMap<String, DocumentRecord>,
}

impl Default for BuildCacheManifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            global: None,
            sha: None,
            docs: BTreeMap::new(),
        }
    }
}

/// Owns the skip/rebuild decision for every source document.
#[derive(Debug)]
pub struct BuildCache {
    cache_dir: PathBuf,
    output_root: PathBuf,
    tracked: Vec<PathBuf>,
    enabled: bool,
    pretty: bool,
    manifest: BuildCacheManifest,
    global_hash: Option<String>,
    upstream_tag: Option<String>,
    dirty: bool,
}

impl BuildCache {
    /// Opens the cache, loading any persisted manifest from `cache_dir`.
    ///
    /// `tracked` lists the fingerprint inputs: files are hashed directly,
    /// directories recursively. `pretty` selects `dir/index.html` output
    /// naming over flat `.html` files.
    pub fn new(
        cache_dir: impl AsRef<Path>,
        output_root: impl AsRef<Path>,
        tracked: Vec<PathBuf>,
        enabled: bool,
        pretty: bool,
    ) -> Self {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        let manifest = load_manifest(&cache_dir.join(MANIFEST_FILE));
        Self {
            cache_dir,
            output_root: output_root.as_ref().to_path_buf(),
            tracked,
            enabled,
            pretty,
            manifest,
            global_hash: None,
            upstream_tag: None,
            dirty: false,
        }
    }

    /// Whether caching is enabled at all.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// The global fingerprint over the tracked core/config files.
    ///
    /// Computed lazily, once per process. Deterministic regardless of
    /// filesystem iteration order because paths are sorted before hashing.
    pub fn global_fingerprint(&mut self) -> String {
        match &self.global_hash {
            Some(hash) => hash.clone(),
            None => {
                let hash = compute_global_hash(&self.tracked);
                self.global_hash = Some(hash.clone());
                hash
            }
        }
    }

    /// The upstream tag recorded by the last persisted build, if any.
    pub fn recorded_upstream_tag(&self) -> Option<&str> {
        self.manifest.sha.as_deref()
    }

    /// Sets the upstream version tag for this run.
    ///
    /// A non-null tag differing from the recorded one clears every
    /// document record and the recorded global hash: any upstream change
    /// forces a full rebuild, even for byte-identical documents.
    pub fn set_upstream_tag(&mut self, tag: Option<String>) {
        if let Some(tag) = &tag {
            if self
                .manifest
                .sha
                .as_ref()
                .is_some_and(|recorded| recorded != tag)
            {
                tracing::info!(%tag, "upstream tag changed, invalidating document cache");
                self.manifest.docs.clear();
                self.manifest.global = None;
                self.manifest.sha = None;
                self.dirty = true;
            }
        }
        self.upstream_tag = tag;
    }

    /// Returns true when the document's previous output can be kept.
    ///
    /// All of the following must hold: a record exists, the recorded
    /// global hash matches the current fingerprint, the configured
    /// upstream tag matches the recorded one, the previous output file
    /// still exists on disk, and the content hash is unchanged. This
    /// method never mutates cache state.
    pub fn should_skip(&mut self, rel_path: &str, content_hash: &str) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(doc) = self.manifest.docs.get(rel_path).cloned() else {
            return false;
        };
        let global = self.global_fingerprint();
        if self.manifest.global.as_deref() != Some(global.as_str()) {
            return false;
        }
        if self.upstream_tag.is_some() && self.manifest.sha != self.upstream_tag {
            return false;
        }
        if doc.output.is_empty() {
            return false;
        }
        let output = output_file_path(&self.output_root, &doc.output, self.pretty);
        if !output.is_file() {
            return false;
        }
        doc.hash == content_hash
    }

    /// Records a completed document build.
    ///
    /// Refreshes the manifest's global hash and upstream tag to the
    /// current values and marks the manifest dirty. Nothing is persisted
    /// until [`flush`](Self::flush).
    pub fn store(&mut self, rel_path: &str, content_hash: &str, output: &str) {
        if !self.enabled {
            return;
        }
        let global = self.global_fingerprint();
        self.manifest.docs.insert(
            rel_path.to_string(),
            DocumentRecord {
                hash: content_hash.to_string(),
                updated_at: unix_now(),
                output: output.to_string(),
            },
        );
        self.manifest.global = Some(global);
        self.manifest.sha = self.upstream_tag.clone();
        self.dirty = true;
    }

    /// Writes the manifest to disk if dirty. Idempotent.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty || !self.enabled {
            return Ok(());
        }
        fs::create_dir_all(&self.cache_dir)?;
        let json = serde_json::to_string_pretty(&self.manifest)?;
        fs::write(self.cache_dir.join(MANIFEST_FILE), json)?;
        self.dirty = false;
        Ok(())
    }
}

impl Drop for BuildCache {
    // Best-effort persistence on every exit path; the driver still calls
    // flush() explicitly to surface IO errors.
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "failed to flush build-cache manifest");
        }
    }
}

/// Resolves a recorded output location to the physical output file.
///
/// Locations not already ending in `index.html` gain `/index.html` under
/// pretty naming or a flat `.html` suffix otherwise.
pub fn output_file_path(output_root: &Path, output: &str, pretty: bool) -> PathBuf {
    let relative = output.replace('\\', "/");
    let relative = relative.trim_start_matches('/');
    let path = output_root.join(relative);
    if relative.ends_with("index.html") {
        return path;
    }
    if pretty {
        path.join("index.html")
    } else {
        let mut flat = path.into_os_string();
        flat.push(".html");
        PathBuf::from(flat)
    }
}

/// Hashes a document's raw source together with the global fingerprint.
pub fn content_hash(source: &str, global_fingerprint: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(global_fingerprint.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn load_manifest(path: &Path) -> BuildCacheManifest {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return BuildCacheManifest::default(),
    };
    let manifest: BuildCacheManifest = match serde_json::from_str(&raw) {
        Ok(manifest) => manifest,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "discarding unreadable manifest");
            return BuildCacheManifest::default();
        }
    };
    if manifest.version != MANIFEST_VERSION {
        tracing::debug!(
            found = manifest.version,
            expected = MANIFEST_VERSION,
            "discarding manifest with mismatched schema version"
        );
        return BuildCacheManifest::default();
    }
    manifest
}

fn compute_global_hash(tracked: &[PathBuf]) -> String {
    let mut files = Vec::new();
    for target in tracked {
        if target.is_dir() {
            collect_files(target, &mut files);
        } else if target.is_file() {
            files.push(target.clone());
        }
    }
    files.sort();

    let mut hasher = Sha256::new();
    for file in &files {
        hasher.update(file.to_string_lossy().as_bytes());
        let mtime = fs::metadata(file)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        hasher.update(mtime.to_string().as_bytes());
        hasher.update(&fs::read(file).unwrap_or_default());
    }
    format!("{:x}", hasher.finalize())
}

fn collect_files(root: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out);
        } else {
            out.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct Fixture {
        cache_dir: PathBuf,
        output_root: PathBuf,
        core_dir: PathBuf,
        _tmp: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let tmp = tempdir().unwrap();
        let cache_dir = tmp.path().join("cache");
        let output_root = tmp.path().join("out");
        let core_dir = tmp.path().join("core");
        fs::create_dir_all(&output_root).unwrap();
        fs::create_dir_all(&core_dir).unwrap();
        fs::write(core_dir.join("layout.html"), "<html></html>").unwrap();
        Fixture {
            cache_dir,
            output_root,
            core_dir,
            _tmp: tmp,
        }
    }

    fn open(f: &Fixture, pretty: bool) -> BuildCache {
        BuildCache::new(
            &f.cache_dir,
            &f.output_root,
            vec![f.core_dir.clone()],
            true,
            pretty,
        )
    }

    fn write_output(f: &Fixture, output: &str, pretty: bool) {
        let path = output_file_path(&f.output_root, output, pretty);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "<html></html>").unwrap();
    }

    #[test]
    fn store_then_skip_is_coherent() {
        let f = fixture();
        let mut cache = open(&f, false);
        write_output(&f, "guide/intro", false);

        cache.store("docs/intro.html", "h1", "guide/intro");
        assert!(cache.should_skip("docs/intro.html", "h1"));
        assert!(!cache.should_skip("docs/intro.html", "h2"));
        assert!(!cache.should_skip("docs/other.html", "h1"));
    }

    #[test]
    fn pretty_output_naming_is_checked() {
        let f = fixture();
        let mut cache = open(&f, true);
        write_output(&f, "guide/intro", true);

        cache.store("docs/intro.html", "h1", "guide/intro");
        assert!(cache.should_skip("docs/intro.html", "h1"));
        assert!(f
            .output_root
            .join("guide")
            .join("intro")
            .join("index.html")
            .is_file());
    }

    #[test]
    fn missing_output_file_forces_rebuild() {
        let f = fixture();
        let mut cache = open(&f, false);
        cache.store("docs/intro.html", "h1", "guide/intro");
        // No output file was ever written.
        assert!(!cache.should_skip("docs/intro.html", "h1"));
    }

    #[test]
    fn global_fingerprint_change_invalidates_everything() {
        let f = fixture();
        write_output(&f, "guide/intro", false);
        {
            let mut cache = open(&f, false);
            cache.store("docs/intro.html", "h1", "guide/intro");
            cache.flush().unwrap();
        }

        fs::write(f.core_dir.join("layout.html"), "<html>changed</html>").unwrap();
        let mut cache = open(&f, false);
        assert!(!cache.should_skip("docs/intro.html", "h1"));
    }

    #[test]
    fn persisted_manifest_survives_reopen() {
        let f = fixture();
        write_output(&f, "guide/intro", false);
        {
            let mut cache = open(&f, false);
            cache.store("docs/intro.html", "h1", "guide/intro");
            cache.flush().unwrap();
        }
        let mut cache = open(&f, false);
        assert!(cache.should_skip("docs/intro.html", "h1"));
    }

    #[test]
    fn upstream_tag_change_clears_documents() {
        let f = fixture();
        write_output(&f, "guide/intro", false);
        {
            let mut cache = open(&f, false);
            cache.set_upstream_tag(Some("v1".to_string()));
            cache.store("docs/intro.html", "h1", "guide/intro");
            cache.flush().unwrap();
        }

        let mut cache = open(&f, false);
        assert_eq!(cache.recorded_upstream_tag(), Some("v1"));
        cache.set_upstream_tag(Some("v2".to_string()));
        assert!(!cache.should_skip("docs/intro.html", "h1"));
    }

    #[test]
    fn same_upstream_tag_keeps_documents() {
        let f = fixture();
        write_output(&f, "guide/intro", false);
        {
            let mut cache = open(&f, false);
            cache.set_upstream_tag(Some("v1".to_string()));
            cache.store("docs/intro.html", "h1", "guide/intro");
            cache.flush().unwrap();
        }

        let mut cache = open(&f, false);
        cache.set_upstream_tag(Some("v1".to_string()));
        assert!(cache.should_skip("docs/intro.html", "h1"));
    }

    #[test]
    fn null_upstream_tag_never_invalidates() {
        let f = fixture();
        write_output(&f, "guide/intro", false);
        {
            let mut cache = open(&f, false);
            cache.set_upstream_tag(Some("v1".to_string()));
            cache.store("docs/intro.html", "h1", "guide/intro");
            cache.flush().unwrap();
        }

        let mut cache = open(&f, false);
        cache.set_upstream_tag(None);
        assert!(cache.should_skip("docs/intro.html", "h1"));
    }

    #[test]
    fn version_mismatch_discards_manifest() {
        let f = fixture();
        write_output(&f, "guide/intro", false);
        {
            let mut cache = open(&f, false);
            cache.store("docs/intro.html", "h1", "guide/intro");
            cache.flush().unwrap();
        }

        // Bump the persisted schema version.
        let manifest_path = f.cache_dir.join("docs-cache.json");
        let raw = fs::read_to_string(&manifest_path).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        value["version"] = serde_json::json!(2);
        fs::write(&manifest_path, value.to_string()).unwrap();

        let mut cache = open(&f, false);
        assert!(!cache.should_skip("docs/intro.html", "h1"));
    }

    #[test]
    fn corrupt_manifest_loads_as_empty() {
        let f = fixture();
        fs::create_dir_all(&f.cache_dir).unwrap();
        fs::write(f.cache_dir.join("docs-cache.json"), "{ nope").unwrap();
        let mut cache = open(&f, false);
        assert!(!cache.should_skip("docs/intro.html", "h1"));
    }

    #[test]
    fn flush_is_idempotent_and_lazy() {
        let f = fixture();
        let mut cache = open(&f, false);

        // Nothing dirty: no manifest file is written.
        cache.flush().unwrap();
        assert!(!f.cache_dir.join("docs-cache.json").exists());

        cache.store("docs/intro.html", "h1", "guide/intro");
        cache.flush().unwrap();
        assert!(f.cache_dir.join("docs-cache.json").is_file());

        // Second flush is a no-op even if the directory disappears.
        fs::remove_dir_all(&f.cache_dir).unwrap();
        cache.flush().unwrap();
        assert!(!f.cache_dir.join("docs-cache.json").exists());
    }

    #[test]
    fn drop_flushes_dirty_manifest() {
        let f = fixture();
        {
            let mut cache = open(&f, false);
            cache.store("docs/intro.html", "h1", "guide/intro");
        }
        assert!(f.cache_dir.join("docs-cache.json").is_file());
    }

    #[test]
    fn disabled_cache_is_inert() {
        let f = fixture();
        write_output(&f, "guide/intro", false);
        let mut cache = BuildCache::new(
            &f.cache_dir,
            &f.output_root,
            vec![f.core_dir.clone()],
            false,
            false,
        );
        cache.store("docs/intro.html", "h1", "guide/intro");
        assert!(!cache.should_skip("docs/intro.html", "h1"));
        cache.flush().unwrap();
        assert!(!f.cache_dir.join("docs-cache.json").exists());
    }

    #[test]
    fn output_paths_follow_naming_conventions() {
        let root = Path::new("/site/out");
        assert_eq!(
            output_file_path(root, "guide/intro", false),
            PathBuf::from("/site/out/guide/intro.html")
        );
        assert_eq!(
            output_file_path(root, "guide/intro", true),
            PathBuf::from("/site/out/guide/intro/index.html")
        );
        assert_eq!(
            output_file_path(root, "guide/index.html", true),
            PathBuf::from("/site/out/guide/index.html")
        );
    }

    #[test]
    fn content_hash_depends_on_fingerprint() {
        let a = content_hash("body", "fp1");
        let b = content_hash("body", "fp2");
        let c = content_hash("body", "fp1");
        assert_ne!(a, b);
        assert_eq!(a, c);
    }
}
