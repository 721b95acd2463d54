// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for the docfold build core.
//!
//! All docfold functions return `Result<T, DocfoldError>`. The error
//! categories follow the build pipeline's recovery policy:
//!
//! - **IO errors** propagate to the caller; a failed cache or bundle write
//!   is fatal for the document being built.
//! - **Fetch errors** are produced by registry access and absorbed at the
//!   resolver/rule-table boundary, where they degrade to "skip the asset"
//!   or "use the stale cache".
//! - **Cache errors** cover manifest and store bookkeeping failures.

use thiserror::Error;

/// The main error type for docfold operations.
#[derive(Error, Debug)]
pub enum DocfoldError {
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Build-cache manifest or content-store operation failed.
    #[error("Cache error: {0}")]
    Cache(String),

    /// A remote fetch (rule registry or module asset) failed.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// The registry client could not be constructed.
    #[error("Registry error: {0}")]
    Registry(String),

    /// A rule carries an empty or uncompilable match pattern.
    #[error("Invalid pattern for rule `{name}`: {reason}")]
    InvalidPattern {
        /// Name of the offending rule.
        name: String,
        /// Why the pattern was rejected.
        reason: String,
    },

    /// Page rendering failed (reported by the injected renderer).
    #[error("Render error: {0}")]
    Render(String),
}

/// Convenience type alias for Results with [`DocfoldError`].
pub type Result<T> = std::result::Result<T, DocfoldError>;
