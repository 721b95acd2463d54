// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Upstream version tag resolution.
//!
//! The upstream tag is the latest commit id of the remote template
//! library. It is a coarse second invalidation key for the build cache:
//! when it changes, every document rebuilds. Resolution happens at most
//! once per process; every failure path degrades to "no tag" with a
//! warning, never an error.

use std::env;
use std::time::Duration;

/// Environment variable that disables the upstream fetch entirely.
pub const SKIP_ENV: &str = "DOCFOLD_SKIP_UPSTREAM";

/// Timeout for the commits API request.
const FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// Resolves the upstream template-library commit tag.
#[derive(Debug)]
pub struct UpstreamResolver {
    repo: Option<String>,
    branch: String,
    skip: bool,
    pinned: Option<String>,
    resolved: Option<Option<String>>,
}

impl UpstreamResolver {
    /// Creates a resolver for `owner/name` on the given branch.
    ///
    /// With `repo == None` resolution always yields no tag.
    pub fn new(repo: Option<String>, branch: impl Into<String>) -> Self {
        Self {
            repo,
            branch: branch.into(),
            skip: false,
            pinned: None,
            resolved: None,
        }
    }

    /// Disables the remote fetch (config switch).
    pub fn skip_fetch(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    /// Pins the tag to a known value, bypassing the fetch.
    pub fn pinned(mut self, tag: Option<String>) -> Self {
        self.pinned = tag;
        self
    }

    /// Resolves the tag, fetching at most once per process.
    pub fn resolve(&mut self) -> Option<String> {
        if let Some(resolved) = &self.resolved {
            return resolved.clone();
        }
        let tag = self.fetch();
        match &tag {
            Some(tag) => tracing::info!(%tag, "resolved upstream tag"),
            None => tracing::debug!("no upstream tag resolved"),
        }
        self.resolved = Some(tag.clone());
        tag
    }

    fn fetch(&self) -> Option<String> {
        if let Some(pinned) = &self.pinned {
            return Some(pinned.clone());
        }
        if self.skip || skip_from_env() {
            tracing::debug!("upstream tag fetch skipped");
            return None;
        }
        let repo = self.repo.as_deref()?;
        let url = format!(
            "https://api.github.com/repos/{}/commits/{}",
            repo, self.branch
        );

        let result = (|| -> crate::error::Result<Option<String>> {
            let client = reqwest::blocking::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .user_agent("docfold")
                .build()
                .map_err(|e| crate::error::DocfoldError::Fetch(e.to_string()))?;
            let response = client
                .get(&url)
                .header("Accept", "application/vnd.github.v3+json")
                .send()
                .map_err(|e| crate::error::DocfoldError::Fetch(e.to_string()))?;
            if !response.status().is_success() {
                return Err(crate::error::DocfoldError::Fetch(format!(
                    "{url}: HTTP {}",
                    response.status()
                )));
            }
            let body: serde_json::Value = response
                .json()
                .map_err(|e| crate::error::DocfoldError::Fetch(e.to_string()))?;
            Ok(body["sha"].as_str().map(str::to_string))
        })();

        match result {
            Ok(tag) => tag,
            Err(e) => {
                tracing::warn!(error = %e, "upstream tag fetch failed");
                None
            }
        }
    }
}

fn skip_from_env() -> bool {
    env::var(SKIP_ENV)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
