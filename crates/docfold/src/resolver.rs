// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Content-addressed module resolution.
//!
//! Given one rendered page's HTML, the resolver determines which
//! presentation modules the markup uses, hashes the resulting module set,
//! and either reuses a previously built bundle (manifest hit) or fetches
//! the member assets and concatenates them into `{hash}.css` /
//! `{hash}.js` bundle files.
//!
//! # Pipeline
//!
//! 1. Strip `<code>`, `<pre>` and embedded-viewer blocks so example
//!    markup never counts as live usage.
//! 2. Collect every attribute `name="value"` pair into one blob; rule
//!    patterns target attribute content, not tag structure.
//! 3. Match rules, grouping hits into a [`ModuleSet`] (flat groups and
//!    `group/variant` nests coexist via [`GroupEntry`]).
//! 4. Hash the canonical serialization of the set, salted with the rule
//!    table fingerprint.
//! 5. On a manifest hit, return bundle references from the stored flags;
//!    no network, no writes.
//! 6. On a miss, order modules (components first, then utilities by
//!    breakpoint weight), fetch each required asset (per-run cache,
//!    silent skip on failure), append to the bundle files, and record a
//!    manifest entry.
//!
//! Output order is a correctness requirement: later stylesheet fragments
//! must be able to override earlier ones in the cascade.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::registry::{AssetExt, RegistrySource};
use crate::rules::{Rule, RuleKind, RuleTable};
use crate::session::BuildSession;
use crate::store::ContentStore;

/// File name of the persisted module manifest inside the cache directory.
const MANIFEST_FILE: &str = "page-manifest.json";

/// The set of modules detected as used by one page (or one run).
///
/// Keyed by group name; both flat and nested entries coexist in a single
/// resolution pass.
pub type ModuleSet = BTreeMap<String, GroupEntry>;

/// One group's worth of matched rules.
///
/// A rule named `accordion/accordion` denotes the whole group and is
/// stored flat; `accordion/panel` denotes a variant and nests under its
/// group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GroupEntry {
    /// The whole group matched as one module.
    Flat(Rule),
    /// Individual variants matched, keyed by variant name.
    Nested(BTreeMap<String, Rule>),
}

/// Per-module asset availability, exposed to pages for client preloading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFlags {
    /// Whether a JS asset should be preloaded. Always false for utilities.
    pub js: bool,
    /// Whether a CSS asset should be preloaded.
    pub css: bool,
}

/// Manifest record for one module-set hash.
///
/// Presence of an entry means a bundle build (successful or partial) has
/// completed for that exact hash; it is purely a do-not-rebuild signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Whether the JS bundle file received content.
    pub js: bool,
    /// Whether the CSS bundle file received content.
    pub css: bool,
    /// Names of the matched modules, in match order.
    pub modules: Vec<String>,
}

/// Resolution result for one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageAssets {
    /// Path of the CSS bundle, when one has content.
    pub css_bundle: Option<PathBuf>,
    /// Path of the JS bundle, when one has content.
    pub js_bundle: Option<PathBuf>,
    /// Preload flags per matched module name.
    pub modules: BTreeMap<String, ModuleFlags>,
}

impl PageAssets {
    /// True when the page references no bundles and no modules.
    pub fn is_empty(&self) -> bool {
        self.css_bundle.is_none() && self.js_bundle.is_none() && self.modules.is_empty()
    }
}

/// Resolves pages against a rule table and a module registry.
pub struct ModuleResolver<'a> {
    table: &'a RuleTable,
    registry: &'a dyn RegistrySource,
    manifest: ContentStore<ManifestEntry>,
    cache_dir: PathBuf,
    table_fingerprint: String,
}

struct LoadItem {
    key: String,
    file: String,
    rule: Rule,
}

impl<'a> ModuleResolver<'a> {
    /// Creates a resolver writing bundles and its manifest under `cache_dir`.
    pub fn new(
        table: &'a RuleTable,
        registry: &'a dyn RegistrySource,
        cache_dir: impl AsRef<Path>,
    ) -> Self {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        Self {
            table,
            registry,
            manifest: ContentStore::new(cache_dir.join(MANIFEST_FILE)),
            cache_dir,
            table_fingerprint: table.fingerprint(),
        }
    }

    /// Resolves one rendered page body into bundle references and
    /// per-module preload flags.
    ///
    /// # Errors
    ///
    /// Only filesystem failures writing the bundle files or the manifest
    /// surface as errors; fetch failures degrade to skipped assets.
    pub fn resolve(&mut self, html: &str, session: &mut BuildSession) -> Result<PageAssets> {
        if self.table.is_empty() {
            return Ok(PageAssets::default());
        }

        let sanitized = strip_ignored_blocks(html);
        let blob = collect_attribute_blob(&sanitized);

        let mut page_set = ModuleSet::new();
        let mut matched_names = Vec::new();
        for rule in self.table.matches(&blob) {
            let Some((first, last)) = self.table.name_parts(&rule.name) else {
                continue;
            };
            if first == last {
                insert_flat(&mut page_set, &first, rule.clone());
                session.index_flat(&first, rule.clone());
            } else {
                insert_nested(&mut page_set, &first, &last, rule.clone());
                session.index_nested(&first, &last, rule.clone());
            }
            matched_names.push(rule.name.clone());
        }
        if page_set.is_empty() {
            return Ok(PageAssets::default());
        }

        let hash = self.module_set_hash(&page_set)?;
        if let Some(entry) = self.manifest.get(&hash) {
            tracing::debug!(%hash, "module cache hit");
            return Ok(self.assets_from_entry(&hash, &entry));
        }
        tracing::debug!(%hash, "module cache miss, building bundles");

        let ordered = order_for_loading(flatten(&page_set, self.table.delimiter()));
        let mut produced_css = false;
        let mut produced_js = false;
        for item in &ordered {
            for ext in required_exts(&item.rule) {
                if self.fetch_and_append(item, ext, &hash, session)? {
                    match ext {
                        AssetExt::Css => produced_css = true,
                        AssetExt::Js => produced_js = true,
                    }
                }
            }
        }

        let entry = ManifestEntry {
            js: produced_js,
            css: produced_css,
            modules: matched_names,
        };
        self.manifest.put(&hash, entry.clone())?;
        tracing::info!(%hash, css = produced_css, js = produced_js, "modules built");
        Ok(self.assets_from_entry(&hash, &entry))
    }

    /// Computes preload flags for a list of module names.
    ///
    /// Utilities never preload JS, even when their rule declares a JS
    /// asset by mistake. Names no longer present in the table are skipped.
    pub fn flags_for(&self, modules: &[String]) -> BTreeMap<String, ModuleFlags> {
        let mut flags = BTreeMap::new();
        for name in modules {
            let Some(rule) = self.table.get(name) else {
                continue;
            };
            let entry = match rule.kind {
                RuleKind::Utility => ModuleFlags {
                    js: false,
                    css: rule.css,
                },
                RuleKind::Component => ModuleFlags {
                    js: rule.js,
                    css: rule.css,
                },
            };
            flags.insert(name.clone(), entry);
        }
        flags
    }

    fn module_set_hash(&self, set: &ModuleSet) -> Result<String> {
        let canonical = serde_json::to_string(set)?;
        let mut hasher = Sha256::new();
        hasher.update(self.table_fingerprint.as_bytes());
        hasher.update(canonical.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }

    fn assets_from_entry(&self, hash: &str, entry: &ManifestEntry) -> PageAssets {
        let mut assets = PageAssets::default();
        if entry.css {
            assets.css_bundle = Some(self.cache_dir.join(format!("{hash}.css")));
        }
        if entry.js {
            assets.js_bundle = Some(self.cache_dir.join(format!("{hash}.js")));
        }
        assets.modules = self.flags_for(&entry.modules);
        assets
    }

    // Returns true when bytes were appended to the bundle file.
    fn fetch_and_append(
        &mut self,
        item: &LoadItem,
        ext: AssetExt,
        hash: &str,
        session: &mut BuildSession,
    ) -> Result<bool> {
        let body = match session.cached_asset(&item.key, ext) {
            Some(body) => {
                tracing::debug!(module = %item.key, ext = ext.as_str(), "reusing fetched asset");
                body.clone()
            }
            None => {
                match self
                    .registry
                    .fetch_asset(item.rule.kind, &item.key, &item.file, ext)
                {
                    Ok(body) => {
                        session.cache_asset(&item.key, ext, body.clone());
                        body
                    }
                    Err(e) => {
                        // The one place where a failed asset fetch is
                        // downgraded to a skip.
                        tracing::warn!(
                            module = %item.key,
                            ext = ext.as_str(),
                            error = %e,
                            "asset fetch failed, skipping"
                        );
                        return Ok(false);
                    }
                }
            }
        };

        fs::create_dir_all(&self.cache_dir)?;
        let bundle = self.cache_dir.join(format!("{hash}.{}", ext.as_str()));
        let mut file = OpenOptions::new().create(true).append(true).open(&bundle)?;
        file.write_all(body.as_bytes())?;
        Ok(true)
    }
}

pub(crate) fn insert_flat(set: &mut ModuleSet, group: &str, rule: Rule) {
    set.insert(group.to_string(), GroupEntry::Flat(rule));
}

pub(crate) fn insert_nested(set: &mut ModuleSet, group: &str, variant: &str, rule: Rule) {
    match set.entry(group.to_string()) {
        Entry::Occupied(mut occupied) => match occupied.get_mut() {
            GroupEntry::Nested(variants) => {
                variants.insert(variant.to_string(), rule);
            }
            flat @ GroupEntry::Flat(_) => {
                let mut variants = BTreeMap::new();
                variants.insert(variant.to_string(), rule);
                *flat = GroupEntry::Nested(variants);
            }
        },
        Entry::Vacant(vacant) => {
            let mut variants = BTreeMap::new();
            variants.insert(variant.to_string(), rule);
            vacant.insert(GroupEntry::Nested(variants));
        }
    }
}

fn flatten(set: &ModuleSet, delimiter: char) -> Vec<LoadItem> {
    let mut items = Vec::new();
    for (group, entry) in set {
        match entry {
            GroupEntry::Flat(rule) => items.push(LoadItem {
                key: group.clone(),
                file: group.clone(),
                rule: rule.clone(),
            }),
            GroupEntry::Nested(variants) => {
                for (variant, rule) in variants {
                    items.push(LoadItem {
                        key: format!("{group}{delimiter}{variant}"),
                        file: variant.clone(),
                        rule: rule.clone(),
                    });
                }
            }
        }
    }
    items
}

// Components first (lexicographic), then utilities by breakpoint weight.
fn order_for_loading(items: Vec<LoadItem>) -> Vec<LoadItem> {
    let (mut utilities, mut components): (Vec<_>, Vec<_>) = items
        .into_iter()
        .partition(|item| item.rule.kind == RuleKind::Utility);

    components.sort_by(|a, b| a.key.cmp(&b.key));
    utilities.sort_by(|a, b| {
        breakpoint_weight(&a.rule.name, &a.file)
            .cmp(&breakpoint_weight(&b.rule.name, &b.file))
            .then_with(|| a.key.cmp(&b.key))
    });

    components.into_iter().chain(utilities).collect()
}

fn required_exts(rule: &Rule) -> Vec<AssetExt> {
    match rule.kind {
        // Utilities only ever ship CSS; a stray js flag is ignored.
        RuleKind::Utility => vec![AssetExt::Css],
        RuleKind::Component => {
            let mut exts = Vec::new();
            if rule.css {
                exts.push(AssetExt::Css);
            }
            if rule.js {
                exts.push(AssetExt::Js);
            }
            exts
        }
    }
}

/// Breakpoint ordering for utilities: default < sm < md < lg < xl < 2xl.
/// Higher weight means later insertion into the bundle.
fn breakpoint_weight(name: &str, file: &str) -> u32 {
    fn weight_of(segment: &str) -> Option<u32> {
        match segment {
            "default" | "base" => Some(0),
            "sm" => Some(10),
            "md" => Some(20),
            "lg" => Some(30),
            "xl" => Some(40),
            "2xl" => Some(50),
            _ => None,
        }
    }

    if let Some(weight) = weight_of(&file.to_lowercase()) {
        return weight;
    }
    let lower = name.to_lowercase();
    for bp in ["2xl", "xl", "lg", "md", "sm"] {
        if lower.contains(&format!("{bp}:"))
            || lower.contains(&format!("{bp}/"))
            || lower.contains(&format!("{bp}\\:"))
        {
            return weight_of(bp).unwrap_or(0);
        }
    }
    0
}

lazy_static! {
    static ref IGNORED_BLOCKS: Vec<Regex> = vec![
        Regex::new(r"(?is)<code\b[^>]*>.*?</code>").unwrap(),
        Regex::new(r"(?is)<pre\b[^>]*>.*?</pre>").unwrap(),
        Regex::new(r#"(?is)<div\b[^>]*class=["'][^"'>]*monaco[^"'>]*["'][^>]*>.*?</div>"#).unwrap(),
        Regex::new(r#"(?is)<section\b[^>]*class=["'][^"'>]*monaco[^"'>]*["'][^>]*>.*?</section>"#)
            .unwrap(),
    ];
}

// Example markup inside code blocks and embedded editors must never be
// mistaken for live module usage.
fn strip_ignored_blocks(html: &str) -> String {
    let mut out = html.to_string();
    for re in IGNORED_BLOCKS.iter() {
        out = re.replace_all(&out, "").into_owned();
    }
    out
}

// Rule patterns target attribute content, not tag structure.
fn collect_attribute_blob(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let document = scraper::Html::parse_fragment(html);
    let mut parts = Vec::new();
    for node in document.tree.nodes() {
        if let Some(element) = node.value().as_element() {
            for (name, value) in element.attrs() {
                parts.push(format!("{name}=\"{value}\""));
            }
        }
    }
    parts.join(" ")
}
