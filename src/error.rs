//! Pipeline error types.
//!
//! | Variant            | Raised by              | Scope                       |
//! |--------------------|------------------------|-----------------------------|
//! | `InvalidReference` | registry               | rejected at registration    |
//! | `InvalidPattern`   | config / pattern       | fatal to pipeline startup   |
//! | `Config`           | config loading         | fatal to pipeline startup   |
//! | `SourceNotFound`   | resolver               | per asset, skipped + logged |
//! | `Transform`        | minifier backends      | per asset, pass-through     |
//! | `Write`            | artifact writer        | fatal to the run            |

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while registering, resolving and emitting assets.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid asset reference `{reference}`: {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("invalid output pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("source not found: `{}`", path.display())]
    SourceNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transform of `{reference}` failed: {reason}")]
    Transform { reference: String, reason: String },

    #[error("cannot write artifact `{}`", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    pub(crate) fn invalid_reference(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn transform(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transform {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error aborts the whole run rather than a single asset.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Write { .. } | Self::Config(_) | Self::InvalidPattern { .. }
        )
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
