// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! # Docfold
//!
//! Incremental build cache and content-addressed CSS/JS module resolver
//! for documentation sites.
//!
//! Docfold is the part of a documentation-site generator that decides
//! whether a page needs rebuilding at all, detects which presentation
//! modules (utility classes and components) a rendered page actually
//! uses, fetches their assets from a remote registry on first sight, and
//! deduplicates that work across every page of every build through a
//! persistent, hash-keyed manifest.
//!
//! ## Features
//!
//! - Per-document skip/rebuild decisions keyed by content hash, a global
//!   core-template fingerprint, and an optional upstream version tag
//! - Rule-based module detection against a page's attribute blob
//! - Content-addressed `{hash}.css` / `{hash}.js` bundles, built once per
//!   distinct module set
//! - TTL-cached remote rule registry with stale-cache fallback
//! - Silent degradation on network failure; a missing asset never fails
//!   a build
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docfold::{BuildCache, BuildSession, HttpRegistry, ModuleResolver, RuleTable};
//!
//! let registry = HttpRegistry::new("https://registry.example.com")?;
//! let table = RuleTable::load(&registry, cache_dir.join("rules.json").as_path(), ttl, '/');
//! let mut resolver = ModuleResolver::new(&table, &registry, &cache_dir);
//! let mut session = BuildSession::new();
//!
//! let assets = resolver.resolve(&rendered_html, &mut session)?;
//! let page = docfold::inject(&rendered_html, &assets, "assets/");
//! ```

/// The document-level incremental build cache.
pub mod cache;
/// Error types and reporting.
pub mod error;
/// Asset reference injection into rendered pages.
pub mod inject;
/// Module registry access (HTTP and in-memory).
pub mod registry;
/// Page renderer seam.
pub mod render;
/// Content-addressed module resolution.
pub mod resolver;
/// The module rule table.
pub mod rules;
/// Per-run build session state.
pub mod session;
/// Persisted key/value content store.
pub mod store;
/// Upstream version tag resolution.
pub mod upstream;

pub use cache::{content_hash, output_file_path, BuildCache, BuildCacheManifest, DocumentRecord};
pub use error::{DocfoldError, Result};
pub use inject::{inject, preload_script, script_tag, stylesheet_tag};
pub use registry::{AssetExt, HttpRegistry, MemoryRegistry, RegistrySource};
pub use render::{IdentityRenderer, PageRenderer};
pub use resolver::{GroupEntry, ManifestEntry, ModuleFlags, ModuleResolver, ModuleSet, PageAssets};
pub use rules::{RawRule, Rule, RuleKind, RuleTable};
pub use session::BuildSession;
pub use store::ContentStore;
pub use upstream::UpstreamResolver;
