// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! Docfold CLI library.
//!
//! This crate provides the command-line interface for the docfold
//! documentation-site builder: an incremental build driver on top of the
//! `docfold` core (build cache, module resolver) plus project
//! configuration.
//!
//! # Usage
//!
//! This crate is primarily used through the `docfold` binary:
//!
//! ```bash
//! docfold build          # Incrementally build the site
//! docfold build --no-cache
//! docfold clean          # Drop cached manifests and bundles
//! ```
//!
//! # Configuration
//!
//! Projects are configured via `docfold.toml` at the project root.

/// CLI commands (build, clean).
pub mod commands;
/// Project configuration from `docfold.toml`.
pub mod config;
