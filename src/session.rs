//! Pipeline construction and per-request sessions.
//!
//! A [`Pipeline`] is built once from configuration and shared by every
//! request. Each request gets its own [`PipelineSession`] holding the assets
//! it registered; the session is passed explicitly to the template helpers
//! and dropped when the request ends.
//!
//! ```ignore
//! let pipeline = Pipeline::from_path(Path::new("assetry.toml"))?;
//! let mut session = pipeline.session(Some(SiteRoot::new("https", host)?));
//! let mut helpers = pipeline.helpers(&mut session);
//! helpers.add_asset("/css/site.css", None)?;
//! helpers.add_asset("/js/app.js", None)?;
//! let head = helpers.tags(TagOrder::StyleFirst)?;
//! ```

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::path::Path;

use crate::address::{BaseUrl, SiteRoot};
use crate::asset::AssetKind;
use crate::config::PipelineConfig;
use crate::emit::{TagEmitter, TagOrder};
use crate::error::Result;
use crate::registry::AssetRegistry;
use crate::resolve::{OutputPattern, Resolver, ResolverOptions, TransformMode, Transformer};
use crate::{debug, log};

/// Configured pipeline, shared across requests.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    resolver: Resolver,
}

impl Pipeline {
    /// Validate `config` and select the transform backend.
    ///
    /// Fails on an invalid output pattern or invalid settings; an
    /// unavailable minifier only falls back with a warning.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let pattern = OutputPattern::parse(&config.output_dir)?;
        config.validate()?;
        // validated above
        let base_url = BaseUrl::parse(config.url.as_deref()).unwrap_or_default();

        let mode = TransformMode::from_setting(
            &config.minify,
            &config.minify_args,
            config.minify_timeout(),
        );
        let transformer = Transformer::select(mode);
        debug!("pipeline"; "transform backend: {}", transformer.fingerprint());

        let resolver = Resolver::new(ResolverOptions {
            base_dir: config.base_dir.clone(),
            output_root: config.output_root.clone(),
            pattern,
            base_url,
            transformer,
            skip_minified: config.skip_minified,
        });

        Ok(Self { config, resolver })
    }

    /// Load `assetry.toml` and build the pipeline.
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::new(PipelineConfig::from_path(path)?)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn emitter(&self) -> TagEmitter<'_> {
        TagEmitter::new(&self.resolver, self.config.bundle)
    }

    /// Key under which sessions live in a request store.
    pub fn context_key(&self) -> &str {
        &self.config.minified_name
    }

    /// Start a session for one request.
    pub fn session(&self, site_root: Option<SiteRoot>) -> PipelineSession {
        PipelineSession::new(site_root)
    }

    /// Fetch this request's session from `store`, creating it on first use.
    pub fn session_in<'s, S: SessionStore>(
        &self,
        store: &'s mut S,
        site_root: Option<SiteRoot>,
    ) -> &'s mut PipelineSession {
        store.session_or_insert_with(self.context_key(), || self.session(site_root))
    }

    /// Remove this request's session from `store`.
    pub fn end_session<S: SessionStore>(&self, store: &mut S) -> Option<PipelineSession> {
        store.take_session(self.context_key())
    }

    /// The four template callables, bound to `session`.
    pub fn helpers<'a>(&'a self, session: &'a mut PipelineSession) -> TemplateHelpers<'a> {
        TemplateHelpers {
            emitter: self.emitter(),
            session,
        }
    }
}

/// State of one request: what it registered and where it was served from.
#[derive(Debug, Clone, Default)]
pub struct PipelineSession {
    pub registry: AssetRegistry,
    /// Used to make relative base URLs absolute.
    pub site_root: Option<SiteRoot>,
}

impl PipelineSession {
    pub fn new(site_root: Option<SiteRoot>) -> Self {
        Self {
            registry: AssetRegistry::new(),
            site_root,
        }
    }
}

/// Helpers a templating layer installs into its rendering context.
pub struct TemplateHelpers<'a> {
    emitter: TagEmitter<'a>,
    session: &'a mut PipelineSession,
}

impl TemplateHelpers<'_> {
    /// Register an asset, inferring its kind from the extension.
    pub fn add_asset(&mut self, path_or_url: &str, media: Option<&str>) -> Result<()> {
        self.session.registry.add_asset(path_or_url, media).inspect_err(|e| {
            log!("error"; "{e}");
        })
    }

    pub fn css_tags(&self) -> Result<String> {
        self.emitter.emit(&*self.session, AssetKind::Style)
    }

    pub fn js_tags(&self) -> Result<String> {
        self.emitter.emit(&*self.session, AssetKind::Script)
    }

    pub fn tags(&self, order: TagOrder) -> Result<String> {
        self.emitter.emit_combined(&*self.session, order)
    }

    pub fn session(&self) -> &PipelineSession {
        &*self.session
    }
}

/// A request-scoped key/value slot holding the session.
pub trait SessionStore {
    fn session_or_insert_with<F>(&mut self, key: &str, create: F) -> &mut PipelineSession
    where
        F: FnOnce() -> PipelineSession;

    fn take_session(&mut self, key: &str) -> Option<PipelineSession>;
}

impl<S: BuildHasher> SessionStore for HashMap<String, PipelineSession, S> {
    fn session_or_insert_with<F>(&mut self, key: &str, create: F) -> &mut PipelineSession
    where
        F: FnOnce() -> PipelineSession,
    {
        self.entry(key.to_string()).or_insert_with(create)
    }

    fn take_session(&mut self, key: &str) -> Option<PipelineSession> {
        self.remove(key)
    }
}
