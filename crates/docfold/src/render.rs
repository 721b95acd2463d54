// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The page renderer seam.
//!
//! Markdown conversion and template rendering live outside this crate.
//! The build driver talks to them through [`PageRenderer`]; docfold only
//! ever sees the rendered HTML. [`IdentityRenderer`] serves sites whose
//! sources are already HTML.

use std::path::Path;

use crate::error::Result;

/// Turns one source document into final HTML.
///
/// Implementations must be thread-safe so a parallel driver can share
/// one renderer across workers.
pub trait PageRenderer: Send + Sync {
    /// Renders a source document.
    ///
    /// # Arguments
    ///
    /// * `source` - the raw document contents
    /// * `path` - the document's source path, for error reporting
    fn render(&self, source: &str, path: &Path) -> Result<String>;
}

/// Renderer for sources that are already HTML.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityRenderer;

impl PageRenderer for IdentityRenderer {
    fn render(&self, source: &str, _path: &Path) -> Result<String> {
        Ok(source.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_renderer_passes_through() {
        let html = "<p>hello</p>";
        let rendered = IdentityRenderer
            .render(html, Path::new("docs/hello.html"))
            .unwrap();
        assert_eq!(rendered, html);
    }
}
