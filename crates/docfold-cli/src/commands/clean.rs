// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Clean command: removes the cache directory.

use crate::config::Config;
use console::style;
use std::fs;

/// Removes the cache directory (manifests, rule cache, bundles).
pub fn run() -> anyhow::Result<()> {
    let root = std::env::current_dir()?;
    let config = Config::load_from(&root)?;
    let cache_dir = root.join(&config.build.cache_dir);

    if cache_dir.exists() {
        fs::remove_dir_all(&cache_dir)?;
        println!(
            "{} {}",
            style("Removed").green(),
            cache_dir.display()
        );
    } else {
        println!("Nothing to clean at {}", cache_dir.display());
    }
    Ok(())
}
