//! Per-session registry of declared assets.
//!
//! Assets are grouped by kind. Within a group, first-registration order is
//! preserved and decides the order of emitted tags.

use rustc_hash::FxHashSet;

use crate::asset::{AssetKind, AssetRef};
use crate::error::Result;

/// Ordered, deduplicated collection of asset references.
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    styles: Vec<AssetRef>,
    scripts: Vec<AssetRef>,
    seen: FxHashSet<AssetRef>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset of an explicit kind.
    ///
    /// Registering the same `(path_or_url, media)` twice is a no-op.
    pub fn register(
        &mut self,
        path_or_url: &str,
        kind: AssetKind,
        media: Option<&str>,
    ) -> Result<()> {
        let reference = AssetRef::new(path_or_url, kind, media)?;
        self.insert(reference);
        Ok(())
    }

    /// Register an asset, inferring its kind from the file extension.
    pub fn add_asset(&mut self, path_or_url: &str, media: Option<&str>) -> Result<()> {
        let reference = AssetRef::infer(path_or_url, media)?;
        self.insert(reference);
        Ok(())
    }

    /// Insert an already validated reference. Returns `false` for duplicates.
    pub fn insert(&mut self, reference: AssetRef) -> bool {
        if self.seen.contains(&reference) {
            return false;
        }
        self.seen.insert(reference.clone());
        self.group_mut(reference.kind()).push(reference);
        true
    }

    /// References of one kind, in first-registration order.
    pub fn list(&self, kind: AssetKind) -> &[AssetRef] {
        match kind {
            AssetKind::Style => &self.styles,
            AssetKind::Script => &self.scripts,
        }
    }

    pub fn len(&self) -> usize {
        self.styles.len() + self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty() && self.scripts.is_empty()
    }

    fn group_mut(&mut self, kind: AssetKind) -> &mut Vec<AssetRef> {
        match kind {
            AssetKind::Style => &mut self.styles,
            AssetKind::Script => &mut self.scripts,
        }
    }
}
