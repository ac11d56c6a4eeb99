//! Asset reference: a single declared input.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::error::{PipelineError, Result};

use super::AssetKind;

/// A declared asset, either a local source path or an external URL.
///
/// Immutable once created. Two references are duplicates when they share
/// `(path_or_url, media)` within the same kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AssetRef {
    path_or_url: String,
    kind: AssetKind,
    media: Option<String>,
}

impl AssetRef {
    /// Create a reference, rejecting empty paths and paths escaping the source root.
    pub fn new(
        path_or_url: impl Into<String>,
        kind: AssetKind,
        media: Option<impl Into<String>>,
    ) -> Result<Self> {
        let path_or_url = path_or_url.into().trim().to_string();
        if path_or_url.is_empty() {
            return Err(PipelineError::invalid_reference(path_or_url, "empty path or url"));
        }

        if !is_external_url(&path_or_url)
            && Path::new(strip_query_fragment(&path_or_url))
                .components()
                .any(|c| c == Component::ParentDir)
        {
            return Err(PipelineError::invalid_reference(
                path_or_url,
                "parent directory '..' not allowed",
            ));
        }

        let media = media
            .map(Into::into)
            .map(|m: String| m.trim().to_string())
            .filter(|m| !m.is_empty());

        Ok(Self {
            path_or_url,
            kind,
            media,
        })
    }

    /// Create a reference whose kind is inferred from the file extension.
    pub fn infer(path_or_url: impl Into<String>, media: Option<impl Into<String>>) -> Result<Self> {
        let path_or_url = path_or_url.into();
        let kind = AssetKind::from_path(&path_or_url).ok_or_else(|| {
            PipelineError::invalid_reference(
                path_or_url.as_str(),
                "unrecognized asset kind (expected .css, .js or .mjs)",
            )
        })?;
        Self::new(path_or_url, kind, media)
    }

    pub fn path_or_url(&self) -> &str {
        &self.path_or_url
    }

    pub const fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn media(&self) -> Option<&str> {
        self.media.as_deref()
    }

    /// External URLs are referenced as-is, never read or transformed.
    pub fn is_external(&self) -> bool {
        is_external_url(&self.path_or_url)
    }

    /// Local source file for this reference, rooted at `base_dir`.
    ///
    /// Leading slashes are treated as relative to `base_dir`, query strings
    /// and fragments are dropped: `/css/a.css?v=2` → `{base_dir}/css/a.css`.
    pub fn source_path(&self, base_dir: &Path) -> PathBuf {
        let path = strip_query_fragment(&self.path_or_url).trim_start_matches(['/', '\\']);
        base_dir.join(path)
    }

    /// File stem and extension of the source (`a.min.css` → `("a.min", "css")`).
    pub fn name_parts(&self) -> (&str, &str) {
        let path = strip_query_fragment(&self.path_or_url);
        let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
        match file.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, ext),
            _ => (file, ""),
        }
    }

    /// Whether the source file is already minified (`*.min.css`, `*.min.js`).
    pub fn is_preminified(&self) -> bool {
        self.name_parts().0.ends_with(".min")
    }
}

/// Check whether a reference points outside the local source tree.
///
/// Protocol-relative (`//cdn/x.js`), `http(s)` and `data:` URLs are external.
pub fn is_external_url(s: &str) -> bool {
    if s.starts_with("//") {
        return true;
    }
    match url::Url::parse(s) {
        Ok(url) => url.has_host() || url.scheme() == "data",
        Err(_) => false,
    }
}

fn strip_query_fragment(s: &str) -> &str {
    s.split(['?', '#']).next().unwrap_or_default()
}
