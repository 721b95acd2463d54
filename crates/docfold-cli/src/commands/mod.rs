// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI command implementations.
//!
//! - `build`: build the site incrementally
//! - `clean`: remove the cache directory

/// Site build command.
pub mod build;
/// Cache removal command.
pub mod clean;
