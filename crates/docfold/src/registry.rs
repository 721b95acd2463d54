// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Module registry access.
//!
//! This module provides the [`RegistrySource`] trait and implementations
//! for fetching rule definitions and module assets.
//!
//! # Implementations
//!
//! - [`HttpRegistry`]: fetches from a remote CDN (production)
//! - [`MemoryRegistry`]: serves from in-memory tables (tests, offline use)
//!
//! Fetches are idempotent: the same asset URL always yields the same bytes,
//! so callers are free to cache responses for the lifetime of a run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{DocfoldError, Result};
use crate::rules::{RawRule, RuleKind};

/// Timeout applied to every registry request.
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Asset file extension served by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetExt {
    /// A stylesheet fragment.
    Css,
    /// A script fragment.
    Js,
}

impl AssetExt {
    /// File extension string, without the dot.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetExt::Css => "css",
            AssetExt::Js => "js",
        }
    }
}

/// Trait for fetching rules and module assets.
///
/// Implementations must be thread-safe; fetches may be issued from
/// parallel build drivers.
pub trait RegistrySource: Send + Sync {
    /// Fetches the full rule list.
    fn fetch_rules(&self) -> Result<Vec<RawRule>>;

    /// Fetches one asset file for a module.
    ///
    /// # Arguments
    ///
    /// * `kind` - utility or component (registry path segment)
    /// * `key` - the module key, e.g. `accordion` or `accordion/panel`
    /// * `file` - the file stem, the group name for flat modules and the
    ///   variant name for nested ones
    /// * `ext` - which asset flavor to fetch
    fn fetch_asset(&self, kind: RuleKind, key: &str, file: &str, ext: AssetExt) -> Result<String>;
}

/// Registry client backed by a remote CDN.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpRegistry {
    /// Creates a client for the given registry base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent("docfold")
            .build()
            .map_err(|e| DocfoldError::Registry(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| DocfoldError::Fetch(format!("{url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(DocfoldError::Fetch(format!("{url}: HTTP {status}")));
        }
        response
            .text()
            .map_err(|e| DocfoldError::Fetch(format!("{url}: {e}")))
    }
}

impl RegistrySource for HttpRegistry {
    fn fetch_rules(&self) -> Result<Vec<RawRule>> {
        let url = format!("{}/rule/rule.json", self.base_url);
        let body = self.get_text(&url)?;
        serde_json::from_str(&body).map_err(|e| DocfoldError::Fetch(format!("{url}: {e}")))
    }

    fn fetch_asset(&self, kind: RuleKind, key: &str, file: &str, ext: AssetExt) -> Result<String> {
        let url = format!(
            "{}/{}/{}/{}/{}.{}",
            self.base_url,
            kind.as_str(),
            key,
            ext.as_str(),
            file,
            ext.as_str()
        );
        self.get_text(&url)
    }
}

/// In-memory registry for tests and offline builds.
///
/// Counts fetches so tests can assert that cache hits perform no
/// registry access.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    rules: Vec<RawRule>,
    assets: HashMap<(String, AssetExt), String>,
    fail: bool,
    rule_fetches: AtomicUsize,
    asset_fetches: AtomicUsize,
}

impl MemoryRegistry {
    /// Creates a registry serving the given rules.
    pub fn new(rules: Vec<RawRule>) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    /// Creates a registry whose every fetch fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Registers an asset body for a module key and extension.
    pub fn with_asset(mut self, key: &str, ext: AssetExt, body: &str) -> Self {
        self.assets.insert((key.to_string(), ext), body.to_string());
        self
    }

    /// Total number of fetches issued against this registry.
    pub fn fetch_count(&self) -> usize {
        self.rule_fetch_count() + self.asset_fetch_count()
    }

    /// Number of rule-list fetches.
    pub fn rule_fetch_count(&self) -> usize {
        self.rule_fetches.load(Ordering::SeqCst)
    }

    /// Number of asset fetches.
    pub fn asset_fetch_count(&self) -> usize {
        self.asset_fetches.load(Ordering::SeqCst)
    }
}

impl RegistrySource for MemoryRegistry {
    fn fetch_rules(&self) -> Result<Vec<RawRule>> {
        self.rule_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DocfoldError::Fetch("memory registry offline".to_string()));
        }
        Ok(self.rules.clone())
    }

    fn fetch_asset(&self, _kind: RuleKind, key: &str, _file: &str, ext: AssetExt) -> Result<String> {
        self.asset_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DocfoldError::Fetch("memory registry offline".to_string()));
        }
        self.assets
            .get(&(key.to_string(), ext))
            .cloned()
            .ok_or_else(|| {
                DocfoldError::Fetch(format!("no asset for {key}.{}", ext.as_str()))
            })
    }
}
