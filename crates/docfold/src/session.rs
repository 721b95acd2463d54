// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Per-run build session state.
//!
//! A [`BuildSession`] is created once per build run and passed to every
//! page resolution. It owns the run-level fetched-asset cache (a module
//! asset is fetched at most once per run, no matter how many distinct
//! bundles include it) and the aggregate index of every module matched
//! anywhere in the run. It is an explicit object by design; there is no
//! ambient process-wide state.

use std::collections::HashMap;

use crate::registry::AssetExt;
use crate::resolver::{insert_flat, insert_nested, ModuleSet};
use crate::rules::Rule;

/// Mutable state shared by all page resolutions within one build run.
#[derive(Debug, Default)]
pub struct BuildSession {
    fetched: HashMap<(String, AssetExt), String>,
    module_index: ModuleSet,
}

impl BuildSession {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every module matched by any page so far in this run.
    pub fn module_index(&self) -> &ModuleSet {
        &self.module_index
    }

    /// Number of distinct assets fetched so far in this run.
    pub fn fetched_assets(&self) -> usize {
        self.fetched.len()
    }

    pub(crate) fn cached_asset(&self, key: &str, ext: AssetExt) -> Option<&String> {
        self.fetched.get(&(key.to_string(), ext))
    }

    pub(crate) fn cache_asset(&mut self, key: &str, ext: AssetExt, body: String) {
        self.fetched.insert((key.to_string(), ext), body);
    }

    pub(crate) fn index_flat(&mut self, group: &str, rule: Rule) {
        insert_flat(&mut self.module_index, group, rule);
    }

    pub(crate) fn index_nested(&mut self, group: &str, variant: &str, rule: Rule) {
        insert_nested(&mut self.module_index, group, variant, rule);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::GroupEntry;
    use crate::rules::RuleKind;

    fn rule(name: &str) -> Rule {
        Rule {
            name: name.to_string(),
            pattern: String::new(),
            kind: RuleKind::Utility,
            css: true,
            js: false,
        }
    }

    #[test]
    fn index_accumulates_across_inserts() {
        let mut session = BuildSession::new();
        session.index_flat("flex", rule("flex"));
        session.index_nested("nav", "item", rule("nav/item"));
        session.index_nested("nav", "bar", rule("nav/bar"));

        assert_eq!(session.module_index().len(), 2);
        match session.module_index().get("nav").unwrap() {
            GroupEntry::Nested(variants) => assert_eq!(variants.len(), 2),
            GroupEntry::Flat(_) => panic!("expected nested group"),
        }
    }

    #[test]
    fn asset_cache_roundtrip() {
        let mut session = BuildSession::new();
        assert!(session.cached_asset("flex", AssetExt::Css).is_none());
        session.cache_asset("flex", AssetExt::Css, ".flex{}".to_string());
        assert_eq!(
            session.cached_asset("flex", AssetExt::Css).map(String::as_str),
            Some(".flex{}")
        );
        assert!(session.cached_asset("flex", AssetExt::Js).is_none());
        assert_eq!(session.fetched_assets(), 1);
    }
}
