// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Integration tests for the incremental build driver.
//!
//! These tests drive the full build pipeline (cache decision, module
//! resolution, injection, output writing) against a scratch project and
//! an in-memory registry.

use std::fs;
use std::path::Path;

use tempfile::tempdir;

use docfold::{AssetExt, IdentityRenderer, MemoryRegistry, RawRule};
use docfold_cli::commands::build::build_site;
use docfold_cli::config::Config;

/// Create a small documentation project in a temp directory.
fn setup_project(dir: &Path) {
    write_config(dir, false, None);

    fs::create_dir_all(dir.join("docs/guide")).unwrap();
    fs::create_dir_all(dir.join("core")).unwrap();
    fs::write(dir.join("core/layout.html"), "<html>core layout</html>").unwrap();

    fs::write(
        dir.join("docs/index.html"),
        r#"<html><head><title>Home</title></head><body><div class="flex">Welcome</div></body></html>"#,
    )
    .unwrap();
    fs::write(
        dir.join("docs/guide/intro.html"),
        r#"<html><head><title>Intro</title></head><body><div class="grid">Guide</div></body></html>"#,
    )
    .unwrap();
}

fn write_config(dir: &Path, pretty: bool, sha: Option<&str>) {
    let upstream = match sha {
        Some(sha) => format!("\n[upstream]\nrepo = \"acme/ui-kit\"\nsha = \"{sha}\"\n"),
        None => String::new(),
    };
    fs::write(
        dir.join("docfold.toml"),
        format!(
            r#"
[build]
source_dir = "docs"
output_dir = "dist"
cache_dir = ".cache"
pretty_urls = {pretty}

[fingerprint]
tracked = ["docfold.toml", "core"]
{upstream}"#
        ),
    )
    .unwrap();
}

fn registry() -> MemoryRegistry {
    MemoryRegistry::new(vec![
        rule("flex", r#"class="[^"]*\bflex\b"#),
        rule("grid", r#"class="[^"]*\bgrid\b"#),
    ])
    .with_asset("flex", AssetExt::Css, ".flex{display:flex}")
    .with_asset("grid", AssetExt::Css, ".grid{display:grid}")
}

fn rule(name: &str, regex: &str) -> RawRule {
    RawRule {
        name: Some(name.to_string()),
        regex: Some(regex.to_string()),
        kind: Some("utility".to_string()),
        css: Some(true),
        js: None,
    }
}

fn build(dir: &Path, registry: &MemoryRegistry, no_cache: bool) -> docfold_cli::commands::build::BuildReport {
    let config = Config::load_from(dir).unwrap();
    build_site(dir, &config, registry, &IdentityRenderer, no_cache, None).unwrap()
}

#[test]
fn full_build_writes_pages_and_bundles() {
    let dir = tempdir().unwrap();
    setup_project(dir.path());
    let registry = registry();

    let report = build(dir.path(), &registry, false);
    assert_eq!(report.built, 2);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.failed, 0);

    let index = fs::read_to_string(dir.path().join("dist/index.html")).unwrap();
    assert!(index.contains(r#"<link rel="stylesheet" href="/assets/"#));
    assert!(index.contains("window.__docfoldModules"));
    assert!(index.contains(r#""flex":{"js":false,"css":true}"#));

    let intro = fs::read_to_string(dir.path().join("dist/guide/intro.html")).unwrap();
    assert!(intro.contains(r#""grid""#));

    // One bundle per distinct module set, copied into the site assets.
    let assets: Vec<_> = fs::read_dir(dir.path().join("dist/assets"))
        .unwrap()
        .flatten()
        .collect();
    assert_eq!(assets.len(), 2);
}

#[test]
fn second_build_skips_everything_without_network() {
    let dir = tempdir().unwrap();
    setup_project(dir.path());
    let registry = registry();

    build(dir.path(), &registry, false);
    let rule_fetches = registry.rule_fetch_count();
    let asset_fetches = registry.asset_fetch_count();
    assert_eq!(rule_fetches, 1);
    assert_eq!(asset_fetches, 2);

    let report = build(dir.path(), &registry, false);
    assert_eq!(report.built, 0);
    assert_eq!(report.skipped, 2);

    // The rule cache is fresh and every document was skipped, so the
    // registry saw no further traffic.
    assert_eq!(registry.rule_fetch_count(), rule_fetches);
    assert_eq!(registry.asset_fetch_count(), asset_fetches);
}

#[test]
fn changed_document_rebuilds_alone() {
    let dir = tempdir().unwrap();
    setup_project(dir.path());
    let registry = registry();

    build(dir.path(), &registry, false);

    fs::write(
        dir.path().join("docs/index.html"),
        r#"<html><head><title>Home</title></head><body><div class="flex">Updated</div></body></html>"#,
    )
    .unwrap();

    let report = build(dir.path(), &registry, false);
    assert_eq!(report.built, 1);
    assert_eq!(report.skipped, 1);

    let index = fs::read_to_string(dir.path().join("dist/index.html")).unwrap();
    assert!(index.contains("Updated"));
}

#[test]
fn tracked_core_change_rebuilds_everything() {
    let dir = tempdir().unwrap();
    setup_project(dir.path());
    let registry = registry();

    build(dir.path(), &registry, false);
    fs::write(dir.path().join("core/layout.html"), "<html>changed</html>").unwrap();

    let report = build(dir.path(), &registry, false);
    assert_eq!(report.built, 2);
    assert_eq!(report.skipped, 0);
}

#[test]
fn upstream_tag_change_rebuilds_everything() {
    let dir = tempdir().unwrap();
    setup_project(dir.path());
    // Track only the core tree so rewriting docfold.toml does not
    // disturb the global fingerprint; the pinned sha is the only key
    // that changes between runs.
    let upstream_config = |sha: &str| {
        format!(
            r#"
[build]
source_dir = "docs"
output_dir = "dist"
cache_dir = ".cache"

[fingerprint]
tracked = ["core"]

[upstream]
repo = "acme/ui-kit"
sha = "{sha}"
"#
        )
    };
    fs::write(dir.path().join("docfold.toml"), upstream_config("v1")).unwrap();
    let registry = registry();

    build(dir.path(), &registry, false);
    let report = build(dir.path(), &registry, false);
    assert_eq!(report.skipped, 2);

    fs::write(dir.path().join("docfold.toml"), upstream_config("v2")).unwrap();
    let report = build(dir.path(), &registry, false);
    assert_eq!(report.built, 2);
    assert_eq!(report.skipped, 0);
}

#[test]
fn no_cache_flag_rebuilds_everything() {
    let dir = tempdir().unwrap();
    setup_project(dir.path());
    let registry = registry();

    build(dir.path(), &registry, false);
    let report = build(dir.path(), &registry, true);
    assert_eq!(report.built, 2);
    assert_eq!(report.skipped, 0);
}

#[test]
fn pretty_urls_nest_output_files() {
    let dir = tempdir().unwrap();
    setup_project(dir.path());
    write_config(dir.path(), true, None);
    let registry = registry();

    let report = build(dir.path(), &registry, false);
    assert_eq!(report.built, 2);
    assert!(dir.path().join("dist/index/index.html").is_file());
    assert!(dir.path().join("dist/guide/intro/index.html").is_file());

    // Pretty naming also satisfies the skip check on the next run.
    let report = build(dir.path(), &registry, false);
    assert_eq!(report.skipped, 2);
}

#[test]
fn pages_without_modules_get_no_injection() {
    let dir = tempdir().unwrap();
    setup_project(dir.path());
    fs::write(
        dir.path().join("docs/plain.html"),
        "<html><head></head><body><p>no modules here</p></body></html>",
    )
    .unwrap();
    let registry = registry();

    build(dir.path(), &registry, false);
    let plain = fs::read_to_string(dir.path().join("dist/plain.html")).unwrap();
    assert!(!plain.contains("stylesheet"));
    assert!(!plain.contains("__docfoldModules"));
}
