//! Pipeline configuration (`assetry.toml`).
//!
//! # Example
//!
//! ```toml
//! url = "https://cdn.example.com/"   # or "/assets/", defaults to the site root
//! base_dir = "static"                # where source paths are looked up
//! output_root = "public"             # where the output pattern is rendered
//! output_dir = "static/%n%-l.%e"     # output path pattern
//! minify = "auto"                    # false | true | "fast" | "oxc" | "/path/to/tool"
//! minify_args = ["--type", "{ext}"]  # only used by external tools
//! minified_name = "minified"         # request-store key of the session
//! bundle = false
//! ```

mod error;

pub use error::{ConfigDiagnostic, ConfigDiagnostics, ConfigError, FieldPath};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::address::BaseUrl;
use crate::log;
use crate::resolve::DEFAULT_PATTERN;

/// The `minify` setting: a switch or a backend name / tool path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MinifySetting {
    Enabled(bool),
    Named(String),
}

impl Default for MinifySetting {
    fn default() -> Self {
        Self::Enabled(false)
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Base URL prefix for emitted references. Relative values resolve
    /// against the current request's scheme and host.
    pub url: Option<String>,

    /// Root that source paths are resolved against.
    pub base_dir: PathBuf,

    /// Directory the output pattern is rendered under.
    pub output_root: PathBuf,

    /// Output path pattern (`%n`, `%e`, `%d`, `%l`, `%h`).
    pub output_dir: String,

    /// Transform mode.
    pub minify: MinifySetting,

    /// Extra arguments for an external minifier.
    pub minify_args: Vec<String>,

    /// Deadline for one external minifier run.
    pub minify_timeout_ms: u64,

    /// Key under which a request's session is stored.
    pub minified_name: String,

    /// Concatenate all local assets of a kind into one artifact.
    pub bundle: bool,

    /// Pass `*.min.css` / `*.min.js` through untouched.
    pub skip_minified: bool,

    /// Directory containing the config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            url: None,
            base_dir: PathBuf::from("static"),
            output_root: PathBuf::from("."),
            output_dir: DEFAULT_PATTERN.to_string(),
            minify: MinifySetting::default(),
            minify_args: Vec::new(),
            minify_timeout_ms: 10_000,
            minified_name: "minified".to_string(),
            bundle: false,
            skip_minified: true,
            root: PathBuf::new(),
        }
    }
}

/// Field paths used in diagnostics.
pub struct PipelineConfigFields {
    pub url: FieldPath,
    pub base_dir: FieldPath,
    pub minify: FieldPath,
    pub minify_timeout_ms: FieldPath,
    pub minified_name: FieldPath,
}

impl PipelineConfig {
    pub const FIELDS: PipelineConfigFields = PipelineConfigFields {
        url: FieldPath::new("url"),
        base_dir: FieldPath::new("base_dir"),
        minify: FieldPath::new("minify"),
        minify_timeout_ms: FieldPath::new("minify_timeout_ms"),
        minified_name: FieldPath::new("minified_name"),
    };

    /// Parse configuration from TOML string.
    ///
    /// Relative paths stay relative to the current directory.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let (config, ignored) = Self::parse_with_ignored(content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, Path::new("<inline>"));
        }
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    ///
    /// Relative paths are resolved against the config file's directory.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (mut config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        config.normalize(root);
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring: {}", display_path, fields.join(", "));
    }

    /// Resolve `base_dir` and `output_root` against `root`, expanding `~`.
    pub fn normalize(&mut self, root: &Path) {
        self.root = root.to_path_buf();
        self.base_dir = Self::normalize_dir(&self.base_dir, root);
        self.output_root = Self::normalize_dir(&self.output_root, root);
    }

    fn normalize_dir(path: &Path, root: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        let path = PathBuf::from(expanded);
        if path.is_relative() {
            root.join(path)
        } else {
            path
        }
    }

    /// Deadline for one external minifier run.
    pub fn minify_timeout(&self) -> Duration {
        Duration::from_millis(self.minify_timeout_ms)
    }

    /// Validate everything except the output pattern.
    ///
    /// Collects all validation errors and returns them at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();

        if let Err(reason) = BaseUrl::parse(self.url.as_deref()) {
            diag.error_with_hint(
                Self::FIELDS.url,
                reason,
                "use an absolute url (https://cdn.example.com/) or a path (/assets/)",
            );
        }

        if self.minified_name.trim().is_empty() {
            diag.error(Self::FIELDS.minified_name, "must not be empty");
        }

        if self.minify_timeout_ms == 0 {
            diag.error(Self::FIELDS.minify_timeout_ms, "must be greater than 0");
        }

        if let MinifySetting::Named(name) = &self.minify
            && name.trim().is_empty()
        {
            diag.error_with_hint(
                Self::FIELDS.minify,
                "empty minifier name",
                "use false, true, \"fast\", \"oxc\" or a tool path",
            );
        }

        if !self.base_dir.as_os_str().is_empty() && !self.base_dir.is_dir() {
            diag.hint(
                Self::FIELDS.base_dir,
                format!("directory not found: {}", self.base_dir.display()),
            );
        }

        diag.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_str("").unwrap();
        assert_eq!(config.url, None);
        assert_eq!(config.base_dir, PathBuf::from("static"));
        assert_eq!(config.output_dir, "static/%n%-l.%e");
        assert_eq!(config.minify, MinifySetting::Enabled(false));
        assert_eq!(config.minified_name, "minified");
        assert!(!config.bundle);
        assert!(config.skip_minified);
    }

    #[test]
    fn test_minify_setting_forms() {
        let config = PipelineConfig::from_str("minify = true").unwrap();
        assert_eq!(config.minify, MinifySetting::Enabled(true));

        let config = PipelineConfig::from_str("minify = \"/usr/bin/csso\"").unwrap();
        assert_eq!(config.minify, MinifySetting::Named("/usr/bin/csso".into()));
    }

    #[test]
    fn test_syntax_error() {
        let err = PipelineConfig::from_str("minify = ").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_unknown_fields_are_tolerated() {
        let config = PipelineConfig::from_str("bundle = true\nnot_a_key = 1\n").unwrap();
        assert!(config.bundle);
    }

    #[test]
    fn test_from_path_resolves_relative_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("assetry.toml");
        fs::write(&path, "base_dir = \"assets\"\noutput_root = \"public\"\n").unwrap();

        let config = PipelineConfig::from_path(&path).unwrap();
        assert_eq!(config.base_dir, dir.path().join("assets"));
        assert_eq!(config.output_root, dir.path().join("public"));
        assert_eq!(config.root, dir.path());
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = PipelineConfig::from_path(Path::new("/nonexistent/assetry.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(..)));
    }

    #[test]
    fn test_validate_collects_errors() {
        let config = PipelineConfig {
            url: Some("mailto:nobody@example.com".into()),
            minified_name: " ".into(),
            minify_timeout_ms: 0,
            ..PipelineConfig::default()
        };
        match config.validate() {
            Err(ConfigError::Diagnostics(diag)) => assert_eq!(diag.len(), 3),
            other => panic!("expected diagnostics, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_ok() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig {
            url: Some("/assets/".into()),
            base_dir: dir.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
