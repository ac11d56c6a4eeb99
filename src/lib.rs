//! assetry - a standalone asset pipeline for CSS and JavaScript.
//!
//! ```text
//! ┌──────────────┐  register   ┌──────────────┐  resolve   ┌──────────────┐
//! │ template /   │ ──────────▶ │ AssetRegistry│ ─────────▶ │   Resolver   │
//! │ request      │             │ (per session)│            │ (shared)     │
//! └──────────────┘             └──────────────┘            └──────┬───────┘
//!        ▲                                                        │ artifacts
//!        │            <link> / <script>     ┌──────────────┐      │
//!        └───────────────────────────────── │  TagEmitter  │ ◀────┘
//!                                           └──────────────┘
//! ```
//!
//! - [`registry`]: ordered, deduplicated asset declarations
//! - [`resolve`]: transform, fingerprint and write artifacts
//! - [`emit`]: markup for resolved artifacts
//! - [`session`]: pipeline construction, per-request sessions, template helpers

pub mod address;
pub mod asset;
pub mod config;
pub mod emit;
pub mod error;
pub mod logger;
pub mod registry;
pub mod resolve;
pub mod session;

mod utils;

pub use asset::{AssetKind, AssetRef};
pub use config::PipelineConfig;
pub use emit::{TagEmitter, TagOrder};
pub use error::{PipelineError, Result};
pub use registry::AssetRegistry;
pub use resolve::{ResolvedArtifact, Resolver};
pub use session::{Pipeline, PipelineSession, SessionStore, TemplateHelpers};
