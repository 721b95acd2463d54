// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Docfold project configuration.
//!
//! Configuration is loaded from `docfold.toml` at the project root.
//!
//! # Example Configuration
//!
//! ```toml
//! [site]
//! name = "my-docs"
//!
//! [build]
//! source_dir = "source/docs"
//! output_dir = "dist"
//! cache_dir = ".docfold/cache"
//! pretty_urls = true
//!
//! [registry]
//! url = "https://registry.docfold.dev"
//! ttl_seconds = 900
//!
//! [upstream]
//! repo = "acme/ui-kit"
//! branch = "main"
//!
//! [fingerprint]
//! tracked = ["docfold.toml", "source/_core"]
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Main configuration structure loaded from `docfold.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Site metadata.
    #[serde(default)]
    pub site: SiteConfig,
    /// Build pipeline settings.
    #[serde(default)]
    pub build: BuildConfig,
    /// Module registry settings.
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Upstream template-library tracking.
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Global fingerprint inputs.
    #[serde(default)]
    pub fingerprint: FingerprintConfig,
}

/// Site metadata configuration.
#[derive(Debug, Deserialize)]
pub struct SiteConfig {
    /// Site name (default: "docs").
    #[serde(default = "default_site_name")]
    pub name: String,
}

/// Build pipeline configuration.
#[derive(Debug, Deserialize)]
pub struct BuildConfig {
    /// Directory containing source documents (default: "source/docs").
    #[serde(default = "default_source_dir")]
    pub source_dir: String,
    /// Source document extension (default: "html").
    #[serde(default = "default_source_ext")]
    pub source_ext: String,
    /// Output directory for the generated site (default: "dist").
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Cache directory for manifests and bundles (default: ".docfold/cache").
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    /// Emit `page/index.html` instead of `page.html` (default: false).
    #[serde(default)]
    pub pretty_urls: bool,
    /// Enable the incremental build cache (default: true).
    #[serde(default = "default_true")]
    pub cache: bool,
    /// Base href for injected bundle references (default: "/assets/").
    #[serde(default = "default_asset_base")]
    pub asset_base: String,
}

/// Module registry configuration.
#[derive(Debug, Deserialize)]
pub struct RegistryConfig {
    /// Registry base URL.
    #[serde(default = "default_registry_url")]
    pub url: String,
    /// Rule cache time-to-live in seconds (default: 900).
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Module path delimiter (default: "/").
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

/// Upstream template-library tracking configuration.
#[derive(Debug, Deserialize)]
pub struct UpstreamConfig {
    /// Repository to track, as `owner/name`. Unset disables tracking.
    #[serde(default)]
    pub repo: Option<String>,
    /// Branch whose head commit is the upstream tag (default: "main").
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Skip the remote fetch (default: false).
    #[serde(default)]
    pub skip_fetch: bool,
    /// Pin the upstream tag to a fixed value.
    #[serde(default)]
    pub sha: Option<String>,
}

/// Global fingerprint configuration.
#[derive(Debug, Deserialize)]
pub struct FingerprintConfig {
    /// Files and directories hashed into the global fingerprint,
    /// relative to the project root.
    #[serde(default = "default_tracked")]
    pub tracked: Vec<String>,
}

fn default_site_name() -> String {
    "docs".to_string()
}

fn default_source_dir() -> String {
    "source/docs".to_string()
}

fn default_source_ext() -> String {
    "html".to_string()
}

fn default_output_dir() -> String {
    "dist".to_string()
}

fn default_cache_dir() -> String {
    ".docfold/cache".to_string()
}

fn default_asset_base() -> String {
    "/assets/".to_string()
}

fn default_registry_url() -> String {
    "https://registry.docfold.dev".to_string()
}

fn default_ttl_seconds() -> u64 {
    900
}

fn default_delimiter() -> String {
    "/".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_tracked() -> Vec<String> {
    vec!["docfold.toml".to_string(), "source/_core".to_string()]
}

fn default_true() -> bool {
    true
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: default_site_name(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            source_ext: default_source_ext(),
            output_dir: default_output_dir(),
            cache_dir: default_cache_dir(),
            pretty_urls: false,
            cache: true,
            asset_base: default_asset_base(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: default_registry_url(),
            ttl_seconds: default_ttl_seconds(),
            delimiter: default_delimiter(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            repo: None,
            branch: default_branch(),
            skip_fetch: false,
            sha: None,
        }
    }
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            tracked: default_tracked(),
        }
    }
}

impl Config {
    /// Loads configuration from `docfold.toml` in the current directory.
    ///
    /// If no configuration file exists, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be
    /// parsed.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&std::env::current_dir()?)
    }

    /// Loads configuration from `docfold.toml` under the given root.
    pub fn load_from(root: &Path) -> anyhow::Result<Self> {
        let config_path = root.join("docfold.toml");
        if !config_path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// The module path delimiter as a char.
    pub fn delimiter(&self) -> char {
        self.registry.delimiter.chars().next().unwrap_or('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(dir.path()).unwrap();
        assert_eq!(config.build.source_dir, "source/docs");
        assert_eq!(config.registry.ttl_seconds, 900);
        assert!(config.build.cache);
        assert!(config.upstream.repo.is_none());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("docfold.toml"),
            r#"
[build]
source_dir = "docs"
pretty_urls = true

[upstream]
repo = "acme/ui-kit"
"#,
        )
        .unwrap();
        let config = Config::load_from(dir.path()).unwrap();
        assert_eq!(config.build.source_dir, "docs");
        assert!(config.build.pretty_urls);
        assert_eq!(config.build.output_dir, "dist");
        assert_eq!(config.upstream.repo.as_deref(), Some("acme/ui-kit"));
        assert_eq!(config.upstream.branch, "main");
        assert_eq!(config.delimiter(), '/');
    }
}
