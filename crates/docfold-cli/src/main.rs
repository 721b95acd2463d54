// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use clap::{Parser, Subcommand};
use docfold_cli::commands;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docfold")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "Incremental documentation-site builder", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the site incrementally
    Build {
        /// Ignore the build cache and rebuild every document
        #[arg(long)]
        no_cache: bool,
        /// Output directory (overrides docfold.toml)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Remove cached manifests, rules and bundles
    Clean,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with the specified log level
    let filter = EnvFilter::try_new(&cli.log_level)
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    match cli.command {
        Commands::Build { no_cache, output } => commands::build::run(no_cache, output),
        Commands::Clean => commands::clean::run(),
    }
}
