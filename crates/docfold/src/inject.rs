// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Asset reference injection.
//!
//! Turns a page's [`PageAssets`] into markup: a stylesheet link in the
//! head, a deferred script tag, and an inline script exposing the preload
//! manifest (module name → `{js,css}` flags) to client-side bookkeeping
//! under `window.__docfoldModules`.

use crate::resolver::PageAssets;

/// Builds the stylesheet link tag for a page, if it has a CSS bundle.
pub fn stylesheet_tag(assets: &PageAssets, asset_base: &str) -> Option<String> {
    let bundle = assets.css_bundle.as_ref()?;
    let file = bundle.file_name()?.to_string_lossy();
    Some(format!(
        r#"<link rel="stylesheet" href="{asset_base}{file}">"#
    ))
}

/// Builds the script tag for a page, if it has a JS bundle.
pub fn script_tag(assets: &PageAssets, asset_base: &str) -> Option<String> {
    let bundle = assets.js_bundle.as_ref()?;
    let file = bundle.file_name()?.to_string_lossy();
    Some(format!(r#"<script src="{asset_base}{file}" defer></script>"#))
}

/// Builds the inline preload-manifest script, if any modules matched.
pub fn preload_script(assets: &PageAssets) -> Option<String> {
    if assets.modules.is_empty() {
        return None;
    }
    let manifest = serde_json::to_string(&assets.modules).ok()?;
    Some(format!(
        "<script>window.__docfoldModules = {manifest};</script>"
    ))
}

/// Injects all asset references into a rendered page.
///
/// The stylesheet link goes before `</head>` (or is prepended when the
/// page has no head); scripts go before `</body>` (or are appended).
pub fn inject(html: &str, assets: &PageAssets, asset_base: &str) -> String {
    if assets.is_empty() {
        return html.to_string();
    }

    let mut head_markup = String::new();
    if let Some(link) = stylesheet_tag(assets, asset_base) {
        head_markup.push_str(&link);
        head_markup.push('\n');
    }

    let mut body_markup = String::new();
    if let Some(script) = script_tag(assets, asset_base) {
        body_markup.push_str(&script);
        body_markup.push('\n');
    }
    if let Some(preload) = preload_script(assets) {
        body_markup.push_str(&preload);
        body_markup.push('\n');
    }

    let mut out = if head_markup.is_empty() {
        html.to_string()
    } else {
        match html.find("</head>") {
            Some(pos) => {
                let mut out = String::with_capacity(html.len() + head_markup.len());
                out.push_str(&html[..pos]);
                out.push_str(&head_markup);
                out.push_str(&html[pos..]);
                out
            }
            None => format!("{head_markup}{html}"),
        }
    };

    if !body_markup.is_empty() {
        out = match out.find("</body>") {
            Some(pos) => {
                let mut with_body = String::with_capacity(out.len() + body_markup.len());
                with_body.push_str(&out[..pos]);
                with_body.push_str(&body_markup);
                with_body.push_str(&out[pos..]);
                with_body
            }
            None => {
                out.push_str(&body_markup);
                out
            }
        };
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ModuleFlags;
    use std::path::PathBuf;

    fn assets() -> PageAssets {
        let mut assets = PageAssets {
            css_bundle: Some(PathBuf::from("/cache/abc123.css")),
            js_bundle: Some(PathBuf::from("/cache/abc123.js")),
            ..PageAssets::default()
        };
        assets.modules.insert(
            "flex".to_string(),
            ModuleFlags {
                js: false,
                css: true,
            },
        );
        assets
    }

    #[test]
    fn tags_reference_bundle_files_under_base() {
        let assets = assets();
        assert_eq!(
            stylesheet_tag(&assets, "assets/").unwrap(),
            r#"<link rel="stylesheet" href="assets/abc123.css">"#
        );
        assert_eq!(
            script_tag(&assets, "assets/").unwrap(),
            r#"<script src="assets/abc123.js" defer></script>"#
        );
    }

    #[test]
    fn preload_script_lists_module_flags() {
        let script = preload_script(&assets()).unwrap();
        assert!(script.contains("window.__docfoldModules"));
        assert!(script.contains(r#""flex":{"js":false,"css":true}"#));
    }

    #[test]
    fn injects_into_head_and_body() {
        let html = "<html><head><title>t</title></head><body><p>x</p></body></html>";
        let out = inject(html, &assets(), "assets/");
        let link = out.find("abc123.css").unwrap();
        let head_end = out.find("</head>").unwrap();
        let script = out.find("abc123.js").unwrap();
        let body_end = out.find("</body>").unwrap();
        assert!(link < head_end);
        assert!(script > head_end && script < body_end);
    }

    #[test]
    fn body_fragment_gets_tags_around_it() {
        let html = "<p>fragment</p>";
        let out = inject(html, &assets(), "");
        assert!(out.starts_with(r#"<link rel="stylesheet""#));
        assert!(out.trim_end().ends_with("</script>"));
    }

    #[test]
    fn empty_assets_leave_page_untouched() {
        let html = "<p>plain</p>";
        assert_eq!(inject(html, &PageAssets::default(), "assets/"), html);
    }
}
