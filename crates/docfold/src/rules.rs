// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The module rule table.
//!
//! Rules are definitions from a remote registry that map a detection
//! pattern (a regex run against a page's attribute blob) to a module name
//! and its asset availability. The table is loaded once per process: a
//! local cache file younger than the configured TTL is preferred, then a
//! remote fetch, then the stale cache as a fallback. With neither, the
//! table is empty and resolution short-circuits.
//!
//! Normalization policy:
//!
//! - rules without a `name` are dropped;
//! - a missing `type` defaults to utility, any non-`utility` value is a
//!   component;
//! - utilities default to `css: true`, components to whatever they declare;
//! - duplicate names overwrite (last rule wins);
//! - empty or uncompilable patterns keep the rule in the table (its asset
//!   flags still matter for preload hints) but it never matches.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{DocfoldError, Result};
use crate::registry::RegistrySource;

/// Whether a module is a small atomic style rule or a larger bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Atomic style rule; only ever ships CSS.
    Utility,
    /// Larger bundle; may ship CSS and/or JS behavior.
    Component,
}

impl RuleKind {
    /// Registry path segment for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Utility => "utility",
            RuleKind::Component => "component",
        }
    }

    fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some(s) if s.eq_ignore_ascii_case("utility") => RuleKind::Utility,
            None => RuleKind::Utility,
            Some(_) => RuleKind::Component,
        }
    }
}

/// A rule as it appears on the wire (registry response and local cache).
///
/// Every field is optional; [`RuleTable::from_raw`] applies the
/// normalization policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRule {
    /// Delimiter-joined module path, e.g. `accordion/panel`.
    #[serde(default)]
    pub name: Option<String>,
    /// Detection pattern matched against the page attribute blob.
    #[serde(default)]
    pub regex: Option<String>,
    /// `utility` or `component`.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Whether the module ships a CSS asset.
    #[serde(default)]
    pub css: Option<bool>,
    /// Whether the module ships a JS asset.
    #[serde(default)]
    pub js: Option<bool>,
}

/// A normalized rule held in the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    /// Delimiter-joined module path.
    pub name: String,
    /// Detection pattern source (may be empty; such rules never match).
    pub pattern: String,
    /// Utility or component.
    pub kind: RuleKind,
    /// Whether the module ships CSS.
    pub css: bool,
    /// Whether the module ships JS.
    pub js: bool,
}

/// Wire format of the local rule cache file.
#[derive(Debug, Serialize, Deserialize)]
struct CachedRules {
    ts: u64,
    rules: Vec<RawRule>,
}

#[derive(Debug)]
struct TableEntry {
    rule: Rule,
    regex: Option<Regex>,
}

/// An in-memory table of module rules keyed by name.
#[derive(Debug)]
pub struct RuleTable {
    entries: BTreeMap<String, TableEntry>,
    delimiter: char,
}

impl RuleTable {
    /// Loads the table from the local TTL-bounded cache or the registry.
    ///
    /// Never fails: an expired cache plus a failed fetch falls back to the
    /// stale cache, and with no cache at all the table is empty.
    pub fn load(
        source: &dyn RegistrySource,
        cache_file: &Path,
        ttl: Duration,
        delimiter: char,
    ) -> Self {
        let cached = read_cache(cache_file);
        if let Some(cached) = &cached {
            if !is_expired(cached.ts, ttl) {
                tracing::debug!(path = %cache_file.display(), "using cached rule table");
                return Self::from_raw(cached.rules.clone(), delimiter);
            }
        }

        match source.fetch_rules() {
            Ok(fresh) => {
                if let Err(e) = write_cache(cache_file, &fresh) {
                    tracing::warn!(error = %e, "failed to persist rule cache");
                }
                Self::from_raw(fresh, delimiter)
            }
            Err(e) => {
                tracing::warn!(error = %e, "rule fetch failed, falling back to local cache");
                let stale = cached.map(|c| c.rules).unwrap_or_default();
                Self::from_raw(stale, delimiter)
            }
        }
    }

    /// Builds a table directly from wire-format rules.
    pub fn from_raw(raw: Vec<RawRule>, delimiter: char) -> Self {
        let mut entries = BTreeMap::new();
        for raw_rule in raw {
            let name = match raw_rule.name {
                Some(name) if !name.is_empty() => name,
                _ => {
                    tracing::debug!("dropping rule without a name");
                    continue;
                }
            };
            let kind = RuleKind::from_raw(raw_rule.kind.as_deref());
            let (css, js) = match kind {
                RuleKind::Utility => (raw_rule.css.unwrap_or(true), raw_rule.js.unwrap_or(false)),
                RuleKind::Component => (raw_rule.css.unwrap_or(false), raw_rule.js.unwrap_or(false)),
            };
            let pattern = raw_rule.regex.unwrap_or_default();

            // The one place where a bad pattern is downgraded to
            // "never matches" instead of an error.
            let regex = match compile_pattern(&name, &pattern) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    tracing::warn!(rule = %name, error = %e, "rule pattern rejected");
                    None
                }
            };

            let rule = Rule {
                name: name.clone(),
                pattern,
                kind,
                css,
                js,
            };
            entries.insert(name, TableEntry { rule, regex });
        }
        Self { entries, delimiter }
    }

    /// Returns every rule whose pattern matches the attribute blob.
    pub fn matches(&self, blob: &str) -> Vec<&Rule> {
        self.entries
            .values()
            .filter(|entry| {
                entry
                    .regex
                    .as_ref()
                    .map(|re| re.is_match(blob))
                    .unwrap_or(false)
            })
            .map(|entry| &entry.rule)
            .collect()
    }

    /// Looks up a rule by name.
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.entries.get(name).map(|e| &e.rule)
    }

    /// Returns true if the table holds no rules.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of rules in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The module-path delimiter configured for this table.
    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Splits a rule name into its first and last segments.
    ///
    /// `first == last` denotes a whole group, otherwise `group/variant`.
    /// Returns `None` for names that are empty after trimming delimiters.
    pub fn name_parts(&self, name: &str) -> Option<(String, String)> {
        let trimmed = name.trim_matches(self.delimiter);
        if trimmed.is_empty() {
            return None;
        }
        let mut parts = trimmed.split(self.delimiter);
        let first = parts.next().unwrap_or(trimmed).to_string();
        let last = parts.last().map(str::to_string).unwrap_or_else(|| first.clone());
        Some((first, last))
    }

    /// A deterministic hash over the normalized table.
    ///
    /// Folded into every module-set hash so that a rule-table change
    /// invalidates cached bundles for an otherwise unchanged module set.
    pub fn fingerprint(&self) -> String {
        let rules: BTreeMap<&str, &Rule> = self
            .entries
            .iter()
            .map(|(name, entry)| (name.as_str(), &entry.rule))
            .collect();
        let canonical = serde_json::to_string(&rules).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

fn compile_pattern(name: &str, pattern: &str) -> Result<Regex> {
    if pattern.is_empty() {
        return Err(DocfoldError::InvalidPattern {
            name: name.to_string(),
            reason: "empty pattern".to_string(),
        });
    }
    Regex::new(pattern).map_err(|e| DocfoldError::InvalidPattern {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn read_cache(path: &Path) -> Option<CachedRules> {
    let raw = fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

fn write_cache(path: &Path, rules: &[RawRule]) -> Result<()> {
    let payload = CachedRules {
        ts: unix_now(),
        rules: rules.to_vec(),
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(&payload)?)?;
    Ok(())
}

fn is_expired(ts: u64, ttl: Duration) -> bool {
    unix_now().saturating_sub(ts) > ttl.as_secs()
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
