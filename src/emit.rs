//! Tag emission: resolved artifacts → `<link>` / `<script>` markup.
//!
//! All references of a kind are resolved in parallel and joined before any
//! markup is produced. A missing source drops its own tag only; a write
//! failure aborts the whole emission.

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;

use crate::asset::AssetKind;
use crate::error::Result;
use crate::log;
use crate::resolve::{ResolvedArtifact, Resolver};
use crate::session::PipelineSession;
use crate::utils::html::escape_attr;

/// Which group comes first in combined output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagOrder {
    #[default]
    StyleFirst,
    ScriptFirst,
}

impl TagOrder {
    const fn kinds(self) -> [AssetKind; 2] {
        match self {
            Self::StyleFirst => [AssetKind::Style, AssetKind::Script],
            Self::ScriptFirst => [AssetKind::Script, AssetKind::Style],
        }
    }
}

impl FromStr for TagOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "style-first" | "css-first" | "css" => Ok(Self::StyleFirst),
            "script-first" | "js-first" | "js" => Ok(Self::ScriptFirst),
            other => Err(format!("unknown tag order `{other}` (expected style-first or script-first)")),
        }
    }
}

impl fmt::Display for TagOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StyleFirst => "style-first",
            Self::ScriptFirst => "script-first",
        })
    }
}

/// Renders the markup for one session's registered assets.
#[derive(Debug, Clone, Copy)]
pub struct TagEmitter<'a> {
    resolver: &'a Resolver,
    bundle: bool,
}

impl<'a> TagEmitter<'a> {
    pub fn new(resolver: &'a Resolver, bundle: bool) -> Self {
        Self { resolver, bundle }
    }

    /// Tags for every artifact of `kind`, one per line, in registration order.
    pub fn emit(&self, session: &PipelineSession, kind: AssetKind) -> Result<String> {
        let artifacts = self.resolve_all(session, kind)?;
        Ok(artifacts
            .iter()
            .map(render_tag)
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Both groups, in the requested order.
    pub fn emit_combined(&self, session: &PipelineSession, order: TagOrder) -> Result<String> {
        let mut parts = Vec::with_capacity(2);
        for kind in order.kinds() {
            let tags = self.emit(session, kind)?;
            if !tags.is_empty() {
                parts.push(tags);
            }
        }
        Ok(parts.join("\n"))
    }

    /// Resolve the registered references of `kind`.
    ///
    /// Non-fatal per-asset errors are logged and the asset skipped.
    pub fn resolve_all(&self, session: &PipelineSession, kind: AssetKind) -> Result<Vec<ResolvedArtifact>> {
        let refs = session.registry.list(kind);
        let site = session.site_root.as_ref();

        if self.bundle {
            return self.resolver.resolve_bundle(kind, refs, site);
        }

        let results: Vec<_> = refs
            .par_iter()
            .map(|reference| self.resolver.resolve(reference, site))
            .collect();

        let mut artifacts = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(artifact) => artifacts.push(artifact),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => log!("skip"; "{e}"),
            }
        }
        Ok(artifacts)
    }
}

/// Markup for one artifact. Tag shape is fixed per kind.
pub fn render_tag(artifact: &ResolvedArtifact) -> String {
    let url = escape_attr(&artifact.output_url);
    match artifact.source_ref.kind() {
        AssetKind::Style => match artifact.source_ref.media() {
            Some(media) => format!(
                r#"<link rel="stylesheet" href="{url}" media="{}">"#,
                escape_attr(media)
            ),
            None => format!(r#"<link rel="stylesheet" href="{url}">"#),
        },
        AssetKind::Script => {
            format!(r#"<script type="text/javascript" src="{url}"></script>"#)
        }
    }
}
