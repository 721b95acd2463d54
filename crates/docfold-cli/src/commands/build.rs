// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Build command: the sequential document build driver.
//!
//! For every source document the driver computes a content hash, asks the
//! build cache whether the previous output can be kept, and otherwise
//! renders the page, resolves its module bundles, injects the asset
//! references, and writes the output file. Documents are processed
//! strictly one at a time; the cache manifest is flushed once at the end.

use crate::config::Config;
use console::style;
use docfold::{
    content_hash, inject, output_file_path, BuildCache, BuildSession, HttpRegistry,
    IdentityRenderer, ModuleResolver, PageRenderer, RegistrySource, RuleTable, UpstreamResolver,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Outcome counts for one build run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    /// Documents rendered and written this run.
    pub built: usize,
    /// Documents skipped because their cached output is current.
    pub skipped: usize,
    /// Documents that failed; the rest of the build still completed.
    pub failed: usize,
}

/// Runs the build command against the current directory.
pub fn run(no_cache: bool, output: Option<String>) -> anyhow::Result<()> {
    let root = std::env::current_dir()?;
    let config = Config::load_from(&root)?;
    let registry = HttpRegistry::new(&config.registry.url)?;
    let renderer = IdentityRenderer;

    let report = build_site(
        &root,
        &config,
        &registry,
        &renderer,
        no_cache,
        output.as_deref(),
    )?;
    if report.failed > 0 {
        anyhow::bail!("{} document(s) failed to build", report.failed);
    }
    Ok(())
}

/// Builds the whole site once, sequentially.
///
/// Separated from [`run`] so tests can drive it with an in-memory
/// registry and a scratch project root.
pub fn build_site(
    root: &Path,
    config: &Config,
    registry: &dyn RegistrySource,
    renderer: &dyn PageRenderer,
    no_cache: bool,
    output_override: Option<&str>,
) -> anyhow::Result<BuildReport> {
    let started = Instant::now();
    let output_root = root.join(output_override.unwrap_or(&config.build.output_dir));
    let cache_dir = root.join(&config.build.cache_dir);
    let source_root = root.join(&config.build.source_dir);
    let tracked: Vec<PathBuf> = config
        .fingerprint
        .tracked
        .iter()
        .map(|p| root.join(p))
        .collect();

    let enabled = config.build.cache && !no_cache;
    let mut cache = BuildCache::new(
        &cache_dir,
        &output_root,
        tracked,
        enabled,
        config.build.pretty_urls,
    );

    let mut upstream = UpstreamResolver::new(
        config.upstream.repo.clone(),
        config.upstream.branch.clone(),
    )
    .skip_fetch(config.upstream.skip_fetch)
    .pinned(config.upstream.sha.clone());
    cache.set_upstream_tag(upstream.resolve());

    let table = RuleTable::load(
        registry,
        &cache_dir.join("rules.json"),
        Duration::from_secs(config.registry.ttl_seconds),
        config.delimiter(),
    );
    let mut resolver = ModuleResolver::new(&table, registry, &cache_dir);
    let mut session = BuildSession::new();

    let pattern = format!(
        "{}/**/*.{}",
        source_root.display(),
        config.build.source_ext
    );
    let mut documents: Vec<PathBuf> = glob::glob(&pattern)?.flatten().collect();
    documents.sort();

    if documents.is_empty() {
        println!("No documents found in {}", config.build.source_dir);
        return Ok(BuildReport::default());
    }

    println!(
        "{} {} document(s), {} rule(s)",
        style("Found").green(),
        documents.len(),
        table.len()
    );

    let pb = ProgressBar::new(documents.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.green} Building [{bar:30.cyan/blue}] {pos}/{len}")
            .unwrap()
            .progress_chars("━━╺"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let fingerprint = cache.global_fingerprint();
    let mut report = BuildReport::default();
    let mut bundles: BTreeSet<PathBuf> = BTreeSet::new();

    for path in &documents {
        pb.inc(1);
        let rel = match path.strip_prefix(&source_root) {
            Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
            Err(_) => continue,
        };
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                tracing::error!(document = %rel, error = %e, "failed to read source");
                report.failed += 1;
                continue;
            }
        };
        let hash = content_hash(&source, &fingerprint);

        if cache.should_skip(&rel, &hash) {
            tracing::debug!(document = %rel, "up to date, skipping");
            report.skipped += 1;
            continue;
        }

        let output_rel = Path::new(&rel)
            .with_extension("")
            .to_string_lossy()
            .replace('\\', "/");

        let html = match renderer.render(&source, path) {
            Ok(html) => html,
            Err(e) => {
                tracing::error!(document = %rel, error = %e, "render failed");
                report.failed += 1;
                continue;
            }
        };
        let assets = match resolver.resolve(&html, &mut session) {
            Ok(assets) => assets,
            Err(e) => {
                tracing::error!(document = %rel, error = %e, "module resolution failed");
                report.failed += 1;
                continue;
            }
        };
        let page = inject(&html, &assets, &config.build.asset_base);

        let output_path = output_file_path(&output_root, &output_rel, config.build.pretty_urls);
        if let Err(e) = write_page(&output_path, &page) {
            tracing::error!(document = %rel, error = %e, "failed to write output");
            report.failed += 1;
            continue;
        }

        bundles.extend(assets.css_bundle.iter().cloned());
        bundles.extend(assets.js_bundle.iter().cloned());
        cache.store(&rel, &hash, &output_rel);
        report.built += 1;
    }
    pb.finish_and_clear();

    copy_bundles(&bundles, &output_root)?;
    cache.flush()?;

    println!(
        "{} {} built, {} skipped, {} failed {}",
        style("Build complete!").green().bold(),
        style(report.built).cyan(),
        style(report.skipped).cyan(),
        if report.failed > 0 {
            style(report.failed).red()
        } else {
            style(report.failed).dim()
        },
        style(format!("in {}ms", started.elapsed().as_millis())).dim()
    );

    Ok(report)
}

fn write_page(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

// Bundles live in the cache directory; the published site references
// them from its assets directory.
fn copy_bundles(bundles: &BTreeSet<PathBuf>, output_root: &Path) -> anyhow::Result<()> {
    if bundles.is_empty() {
        return Ok(());
    }
    let assets_dir = output_root.join("assets");
    fs::create_dir_all(&assets_dir)?;
    for bundle in bundles {
        let Some(name) = bundle.file_name() else {
            continue;
        };
        if bundle.is_file() {
            fs::copy(bundle, assets_dir.join(name))?;
        }
    }
    Ok(())
}
