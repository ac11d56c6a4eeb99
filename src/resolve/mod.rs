//! Resolution of asset references into content-addressed artifacts.
//!
//! ```text
//! AssetRef ─▶ read source ─▶ transform ─▶ hash ─▶ render pattern ─▶ write/reuse ─▶ URL
//! ```
//!
//! Resolution is a pure function of source bytes and configuration, so the
//! same asset can be resolved from many sessions and threads at once. The
//! in-memory cache and the on-disk outputs are both append-only by content.

pub mod hash;
pub mod minify;
pub mod pattern;
pub mod write;

pub use hash::ContentHash;
pub use minify::{TransformMode, Transformer};
pub use pattern::{DEFAULT_PATTERN, OutputPattern, PatternInput};
pub use write::{WriteOutcome, write_artifact};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use dashmap::DashMap;
use serde::Serialize;

use crate::address::{BaseUrl, SiteRoot};
use crate::asset::{AssetKind, AssetRef};
use crate::error::{PipelineError, Result};
use crate::{debug, log};

/// Output of resolving one reference (or one bundle).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedArtifact {
    /// The reference this artifact was built from. For bundles, a synthetic
    /// `bundle.<ext>` reference carrying the merged media.
    pub source_ref: AssetRef,
    /// Constituents of a bundle, empty otherwise.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bundled: Vec<AssetRef>,
    pub output_url: String,
    /// Written file, `None` for external URLs.
    pub output_path: Option<PathBuf>,
    /// Hash of the artifact bytes, `None` for external URLs.
    pub content_hash: Option<ContentHash>,
    pub transformed: bool,
}

/// What the cache remembers about a resolved local asset.
#[derive(Debug, Clone)]
struct CachedArtifact {
    source_mtime: Option<SystemTime>,
    rel_path: String,
    content_hash: ContentHash,
    transformed: bool,
}

/// Resolver settings, fixed for the lifetime of a pipeline.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub base_dir: PathBuf,
    pub output_root: PathBuf,
    pub pattern: OutputPattern,
    pub base_url: BaseUrl,
    pub transformer: Transformer,
    pub skip_minified: bool,
}

/// Turns asset references into artifacts on disk.
///
/// One resolver holds one transform configuration, so its cache is keyed by
/// reference alone.
#[derive(Debug)]
pub struct Resolver {
    options: ResolverOptions,
    cache: DashMap<AssetRef, CachedArtifact>,
}

impl Resolver {
    pub fn new(options: ResolverOptions) -> Self {
        Self {
            options,
            cache: DashMap::new(),
        }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn transformer(&self) -> &Transformer {
        &self.options.transformer
    }

    /// Drop every cached resolution.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Resolve one reference.
    ///
    /// External URLs are passed through. Local sources are read, transformed
    /// (falling back to the raw bytes on transform failure), hashed and
    /// written under the output pattern unless an identical artifact exists.
    pub fn resolve(&self, reference: &AssetRef, site: Option<&SiteRoot>) -> Result<ResolvedArtifact> {
        if reference.is_external() {
            return Ok(ResolvedArtifact {
                source_ref: reference.clone(),
                bundled: Vec::new(),
                output_url: reference.path_or_url().to_string(),
                output_path: None,
                content_hash: None,
                transformed: false,
            });
        }

        let source = reference.source_path(&self.options.base_dir);
        let metadata = fs::metadata(&source).map_err(|e| not_found(&source, e))?;
        if !metadata.is_file() {
            return Err(not_found(
                &source,
                std::io::Error::new(std::io::ErrorKind::NotFound, "not a regular file"),
            ));
        }
        let mtime = metadata.modified().ok();

        if let Some(cached) = self.cache.get(reference)
            && mtime.is_some()
            && cached.source_mtime == mtime
            && self.options.output_root.join(&cached.rel_path).is_file()
        {
            debug!("cache"; "{} → {}", reference.path_or_url(), cached.rel_path);
            return Ok(self.artifact(reference.clone(), Vec::new(), &cached, site));
        }

        let bytes = fs::read(&source).map_err(|e| not_found(&source, e))?;
        let (name, ext) = reference.name_parts();
        let skip = self.options.skip_minified && reference.is_preminified();
        let cached = self.materialize(&bytes, reference, name, ext, skip, mtime)?;
        self.cache.insert(reference.clone(), cached.clone());

        Ok(self.artifact(reference.clone(), Vec::new(), &cached, site))
    }

    /// Resolve all references of one kind into a single bundle.
    ///
    /// External URLs cannot be concatenated and resolve on their own; the
    /// bundle takes the position of the first local reference. Missing
    /// sources are skipped with a log line.
    pub fn resolve_bundle(
        &self,
        kind: AssetKind,
        references: &[AssetRef],
        site: Option<&SiteRoot>,
    ) -> Result<Vec<ResolvedArtifact>> {
        let mut artifacts = Vec::new();
        let mut bundle_slot = None;
        let mut bundled = Vec::new();
        let mut bytes = Vec::new();

        for reference in references {
            if reference.is_external() {
                artifacts.push(self.resolve(reference, site)?);
                continue;
            }
            let source = reference.source_path(&self.options.base_dir);
            match fs::read(&source) {
                Ok(content) => {
                    if !bytes.is_empty() && !bytes.ends_with(b"\n") {
                        bytes.push(b'\n');
                    }
                    bytes.extend_from_slice(&content);
                    bundled.push(reference.clone());
                    bundle_slot.get_or_insert(artifacts.len());
                }
                Err(e) => log!("skip"; "{}", not_found(&source, e)),
            }
        }

        let Some(slot) = bundle_slot else {
            return Ok(artifacts);
        };

        let bundle_ref = AssetRef::new(
            format!("bundle.{}", kind.extension()),
            kind,
            merged_media(&bundled),
        )?;
        let cached = self.materialize(&bytes, &bundle_ref, "bundle", kind.extension(), false, None)?;
        artifacts.insert(slot, self.artifact(bundle_ref, bundled, &cached, site));
        Ok(artifacts)
    }

    /// Transform, hash and write one artifact.
    fn materialize(
        &self,
        bytes: &[u8],
        reference: &AssetRef,
        name: &str,
        ext: &str,
        skip_transform: bool,
        source_mtime: Option<SystemTime>,
    ) -> Result<CachedArtifact> {
        let transformer = &self.options.transformer;

        let (output, transformed) = if skip_transform || transformer.is_passthrough() {
            (None, false)
        } else {
            match transformer.transform(bytes, reference.kind(), reference.path_or_url()) {
                Ok(out) => (Some(out), true),
                Err(e) => {
                    log!("minify"; "{e}, using source as-is");
                    (None, false)
                }
            }
        };
        let output = output.as_deref().unwrap_or(bytes);

        let content_hash = ContentHash::of(output);
        let rel_path = self.options.pattern.render(&PatternInput {
            name,
            ext,
            hash: content_hash,
            kind: reference.kind(),
        });
        // Source names feed the pattern, so `..` can still appear here
        if pattern::check_relative(&rel_path).is_err() {
            return Err(PipelineError::invalid_reference(
                reference.path_or_url(),
                format!("output path `{rel_path}` escapes the output root"),
            ));
        }

        let path = self.options.output_root.join(&rel_path);
        match write_artifact(&path, output, self.options.pattern.has_digest())? {
            WriteOutcome::Written => debug!("write"; "{}", path.display()),
            WriteOutcome::Reused => debug!("cache"; "reusing {}", path.display()),
        }

        Ok(CachedArtifact {
            source_mtime,
            rel_path,
            content_hash,
            transformed,
        })
    }

    fn artifact(
        &self,
        source_ref: AssetRef,
        bundled: Vec<AssetRef>,
        cached: &CachedArtifact,
        site: Option<&SiteRoot>,
    ) -> ResolvedArtifact {
        ResolvedArtifact {
            source_ref,
            bundled,
            output_url: self.options.base_url.join(&cached.rel_path, site),
            output_path: Some(self.options.output_root.join(&cached.rel_path)),
            content_hash: Some(cached.content_hash),
            transformed: cached.transformed,
        }
    }
}

fn not_found(path: &Path, source: std::io::Error) -> PipelineError {
    PipelineError::SourceNotFound {
        path: path.to_path_buf(),
        source,
    }
}

/// Distinct media of bundle constituents, in first-appearance order.
fn merged_media(references: &[AssetRef]) -> Option<String> {
    let mut media: Vec<&str> = Vec::new();
    for m in references.iter().filter_map(AssetRef::media) {
        if !media.contains(&m) {
            media.push(m);
        }
    }
    (!media.is_empty()).then(|| media.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::minify::TransformMode;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            fs::create_dir_all(dir.path().join("src/css")).unwrap();
            fs::create_dir_all(dir.path().join("src/js")).unwrap();
            Self { dir }
        }

        fn source(&self, rel: &str, content: &str) {
            fs::write(self.dir.path().join("src").join(rel), content).unwrap();
        }

        fn resolver(&self, mode: TransformMode, pattern: &str) -> Resolver {
            Resolver::new(ResolverOptions {
                base_dir: self.dir.path().join("src"),
                output_root: self.dir.path().join("out"),
                pattern: OutputPattern::parse(pattern).unwrap(),
                base_url: BaseUrl::default(),
                transformer: Transformer::select(mode),
                skip_minified: true,
            })
        }
    }

    fn style(path: &str) -> AssetRef {
        AssetRef::new(path, AssetKind::Style, None::<String>).unwrap()
    }

    #[test]
    fn test_passthrough_keeps_source_bytes() {
        let fx = Fixture::new();
        let css = "body {\n  color: red;\n}\n";
        fx.source("css/a.css", css);

        let resolver = fx.resolver(TransformMode::None, DEFAULT_PATTERN);
        let artifact = resolver.resolve(&style("/css/a.css"), None).unwrap();

        assert!(!artifact.transformed);
        assert_eq!(artifact.content_hash, Some(ContentHash::of(css.as_bytes())));
        let hash = ContentHash::of(css.as_bytes());
        assert_eq!(artifact.output_url, format!("/static/a-{}.css", hash.short()));
        let written = fs::read_to_string(artifact.output_path.unwrap()).unwrap();
        assert_eq!(written, css);
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let fx = Fixture::new();
        fx.source("css/a.css", "a { color: blue; }");

        let resolver = fx.resolver(TransformMode::Pure, DEFAULT_PATTERN);
        let first = resolver.resolve(&style("/css/a.css"), None).unwrap();
        let second = resolver.resolve(&style("/css/a.css"), None).unwrap();
        assert_eq!(first, second);

        // a fresh resolver (cold cache) agrees too
        let again = fx.resolver(TransformMode::Pure, DEFAULT_PATTERN);
        assert_eq!(again.resolve(&style("/css/a.css"), None).unwrap(), first);
    }

    #[test]
    fn test_mode_changes_hash_and_url() {
        let fx = Fixture::new();
        fx.source("css/a.css", "a {\n  color: blue;\n}\n");

        let plain = fx.resolver(TransformMode::None, DEFAULT_PATTERN);
        let minified = fx.resolver(TransformMode::Pure, DEFAULT_PATTERN);
        let a = plain.resolve(&style("/css/a.css"), None).unwrap();
        let b = minified.resolve(&style("/css/a.css"), None).unwrap();

        assert!(b.transformed);
        assert_ne!(a.content_hash, b.content_hash);
        assert_ne!(a.output_url, b.output_url);
    }

    #[test]
    fn test_missing_source() {
        let fx = Fixture::new();
        let resolver = fx.resolver(TransformMode::None, DEFAULT_PATTERN);
        let err = resolver.resolve(&style("/css/missing.css"), None).unwrap_err();
        assert!(matches!(err, PipelineError::SourceNotFound { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_dotted_stem_cannot_escape_output_root() {
        let fx = Fixture::new();
        fx.source("css/...css", "a{}");

        let resolver = fx.resolver(TransformMode::None, "%n/%l.%e");
        let err = resolver.resolve(&style("css/...css"), None).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidReference { .. }));
        assert!(!err.is_fatal());

        let escaped = fs::read_dir(fx.dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .any(|entry| entry.path().extension().is_some_and(|ext| ext == "css"));
        assert!(!escaped);
    }

    #[test]
    fn test_transform_failure_falls_back_to_source() {
        let fx = Fixture::new();
        let js = "function (";
        fx.source("js/broken.js", js);

        let resolver = fx.resolver(TransformMode::Pure, DEFAULT_PATTERN);
        let reference = AssetRef::new("/js/broken.js", AssetKind::Script, None::<String>).unwrap();
        let artifact = resolver.resolve(&reference, None).unwrap();

        assert!(!artifact.transformed);
        assert_eq!(artifact.content_hash, Some(ContentHash::of(js.as_bytes())));
    }

    #[test]
    fn test_preminified_is_not_transformed() {
        let fx = Fixture::new();
        fx.source("js/lib.min.js", "var a = 1;\n");

        let resolver = fx.resolver(TransformMode::Fast, "%h/%n.%e");
        let reference = AssetRef::new("js/lib.min.js", AssetKind::Script, None::<String>).unwrap();
        let artifact = resolver.resolve(&reference, None).unwrap();

        assert!(!artifact.transformed);
        assert_eq!(artifact.output_url, "/script/lib.min.js");
    }

    #[test]
    fn test_external_url_passthrough() {
        let fx = Fixture::new();
        let resolver = fx.resolver(TransformMode::Pure, DEFAULT_PATTERN);
        let reference = AssetRef::new("https://cdn.example.com/x.js", AssetKind::Script, None::<String>).unwrap();
        let artifact = resolver.resolve(&reference, None).unwrap();

        assert_eq!(artifact.output_url, "https://cdn.example.com/x.js");
        assert_eq!(artifact.content_hash, None);
        assert_eq!(artifact.output_path, None);
        assert_eq!(resolver.cached_len(), 0);
    }

    #[test]
    fn test_cache_refreshes_on_source_change() {
        let fx = Fixture::new();
        fx.source("css/a.css", "a{color:red}");

        let resolver = fx.resolver(TransformMode::None, DEFAULT_PATTERN);
        let first = resolver.resolve(&style("css/a.css"), None).unwrap();
        assert_eq!(resolver.cached_len(), 1);

        // make sure the mtime moves even on coarse filesystems
        let path = fx.dir.path().join("src/css/a.css");
        fs::write(&path, "a{color:blue}").unwrap();
        let later = SystemTime::now() + std::time::Duration::from_secs(5);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();

        let second = resolver.resolve(&style("css/a.css"), None).unwrap();
        assert_ne!(first.content_hash, second.content_hash);

        resolver.clear_cache();
        assert_eq!(resolver.cached_len(), 0);
    }

    #[test]
    fn test_url_uses_site_root() {
        let fx = Fixture::new();
        fx.source("css/a.css", "a{}");
        let mut resolver = fx.resolver(TransformMode::None, "%n.%e");
        resolver.options.base_url = BaseUrl::parse(Some("assets")).unwrap();

        let site = SiteRoot::new("https", "example.com").unwrap();
        let artifact = resolver.resolve(&style("css/a.css"), Some(&site)).unwrap();
        assert_eq!(artifact.output_url, "https://example.com/assets/a.css");

        let artifact = resolver.resolve(&style("css/a.css"), None).unwrap();
        assert_eq!(artifact.output_url, "/assets/a.css");
    }

    #[test]
    fn test_bundle_concatenates_in_order() {
        let fx = Fixture::new();
        fx.source("css/a.css", "a{}");
        fx.source("css/b.css", "b{}");

        let resolver = fx.resolver(TransformMode::None, "%n-%l.%e");
        let refs = vec![
            AssetRef::new("https://cdn.example.com/reset.css", AssetKind::Style, None::<String>).unwrap(),
            style("css/a.css"),
            AssetRef::new("css/b.css", AssetKind::Style, Some("screen")).unwrap(),
            style("css/missing.css"),
        ];

        let artifacts = resolver.resolve_bundle(AssetKind::Style, &refs, None).unwrap();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].output_url, "https://cdn.example.com/reset.css");

        let bundle = &artifacts[1];
        assert_eq!(bundle.bundled.len(), 2);
        assert_eq!(bundle.source_ref.media(), Some("screen"));
        let written = fs::read_to_string(bundle.output_path.as_ref().unwrap()).unwrap();
        assert_eq!(written, "a{}\nb{}");
        assert!(bundle.output_url.starts_with("/bundle-"));
    }

    #[test]
    fn test_bundle_without_local_sources() {
        let fx = Fixture::new();
        let resolver = fx.resolver(TransformMode::None, DEFAULT_PATTERN);
        let artifacts = resolver
            .resolve_bundle(AssetKind::Script, &[style("css/missing.css")], None)
            .unwrap();
        assert!(artifacts.is_empty());
    }

    #[test]
    fn test_merged_media() {
        let refs = vec![
            AssetRef::new("a.css", AssetKind::Style, Some("screen")).unwrap(),
            AssetRef::new("b.css", AssetKind::Style, None::<String>).unwrap(),
            AssetRef::new("c.css", AssetKind::Style, Some("print")).unwrap(),
            AssetRef::new("d.css", AssetKind::Style, Some("screen")).unwrap(),
        ];
        assert_eq!(merged_media(&refs), Some("screen, print".to_string()));
        assert_eq!(merged_media(&refs[1..2]), None);
    }
}
