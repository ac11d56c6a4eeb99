//! Asset references and kinds.

mod kind;
mod reference;

pub use kind::AssetKind;
pub use reference::{AssetRef, is_external_url};
