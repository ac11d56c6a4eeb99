//! Asset kind definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of asset, which decides the shape of the emitted tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Stylesheet, emitted as `<link rel="stylesheet">`.
    Style,
    /// Script, emitted as `<script src>`.
    Script,
}

impl AssetKind {
    pub const ALL: [Self; 2] = [Self::Style, Self::Script];

    /// Parse a kind from a user-facing name (`css`, `style`, `js`, `script`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "css" | "style" | "stylesheet" => Some(Self::Style),
            "js" | "mjs" | "script" | "javascript" => Some(Self::Script),
            _ => None,
        }
    }

    /// Infer the kind from a file extension, ignoring query and fragment.
    ///
    /// ```ignore
    /// assert_eq!(AssetKind::from_path("/css/a.css?v=2"), Some(AssetKind::Style));
    /// assert_eq!(AssetKind::from_path("app.mjs"), Some(AssetKind::Script));
    /// ```
    pub fn from_path(path_or_url: &str) -> Option<Self> {
        let path = path_or_url.split(['?', '#']).next().unwrap_or_default();
        let file = path.rsplit('/').next().unwrap_or(path);
        let (_, ext) = file.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "css" => Some(Self::Style),
            "js" | "mjs" => Some(Self::Script),
            _ => None,
        }
    }

    /// Canonical file extension for artifacts of this kind.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Style => "css",
            Self::Script => "js",
        }
    }

    /// Name used by the `%h` pattern token and in logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Style => "style",
            Self::Script => "script",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
