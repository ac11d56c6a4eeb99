//! URL composition for emitted artifacts.
//!
//! The configured base URL is either absolute (`https://cdn.example.com/assets/`)
//! or relative (`/assets/`). A relative base is resolved against the site root
//! of the current request when one is known:
//!
//! ```text
//! base "/assets/" + request https://example.com  + "static/a-1a2b.css"
//!   → https://example.com/assets/static/a-1a2b.css
//! base "/assets/" + no request                    + "static/a-1a2b.css"
//!   → /assets/static/a-1a2b.css
//! ```

use std::fmt;

use url::Url;

use crate::error::{PipelineError, Result};

/// `scheme://host[:port]/` of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRoot(Url);

impl SiteRoot {
    /// Build from the request's scheme and `Host` header (which may carry a port).
    pub fn new(scheme: &str, host: &str) -> Result<Self> {
        Self::parse(&format!("{scheme}://{host}"))
    }

    /// Parse any absolute URL and keep only its origin.
    pub fn parse(url: &str) -> Result<Self> {
        let mut parsed = Url::parse(url.trim())
            .map_err(|e| PipelineError::invalid_reference(url, format!("invalid site root: {e}")))?;
        if !parsed.has_host() {
            return Err(PipelineError::invalid_reference(url, "site root has no host"));
        }
        parsed.set_path("/");
        parsed.set_query(None);
        parsed.set_fragment(None);
        Ok(Self(parsed))
    }

    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for SiteRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Configured prefix for artifact URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseUrl {
    /// Always ends with `/`.
    Absolute(Url),
    /// Protocol-relative prefix (`//cdn.example.com/x/`), takes the request scheme.
    ProtocolRelative(String),
    /// Path prefix, always starts and ends with `/`.
    Relative(String),
}

impl Default for BaseUrl {
    fn default() -> Self {
        Self::Relative("/".into())
    }
}

impl BaseUrl {
    /// Parse the `url` setting. `None` or blank means the site root.
    pub fn parse(value: Option<&str>) -> std::result::Result<Self, String> {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(Self::default());
        };

        if let Some(rest) = value.strip_prefix("//") {
            if rest.is_empty() {
                return Err("protocol-relative url has no host".into());
            }
            return Ok(Self::ProtocolRelative(with_trailing_slash(value)));
        }

        match Url::parse(value) {
            Ok(url) if url.has_host() => {
                let normalized = with_trailing_slash(url.as_str());
                Url::parse(&normalized)
                    .map(Self::Absolute)
                    .map_err(|e| format!("invalid url `{value}`: {e}"))
            }
            Ok(_) => Err(format!("url `{value}` has no host")),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let path = value.trim_start_matches("./").trim_matches('/');
                if path.is_empty() {
                    Ok(Self::default())
                } else {
                    Ok(Self::Relative(format!("/{path}/")))
                }
            }
            Err(e) => Err(format!("invalid url `{value}`: {e}")),
        }
    }

    /// Compose the public URL for an artifact path relative to the output root.
    pub fn join(&self, rel_path: &str, site: Option<&SiteRoot>) -> String {
        let rel_path = rel_path.trim_start_matches('/');
        match self {
            Self::Absolute(base) => join_url(base, rel_path),
            Self::ProtocolRelative(prefix) => match site {
                Some(site) => match Url::parse(&format!("{}:{prefix}", site.scheme())) {
                    Ok(base) => join_url(&base, rel_path),
                    Err(_) => format!("{prefix}{rel_path}"),
                },
                None => format!("{prefix}{rel_path}"),
            },
            Self::Relative(prefix) => match site {
                Some(site) => join_url(site.as_url(), &format!("{prefix}{rel_path}")),
                None => format!("{prefix}{rel_path}"),
            },
        }
    }
}

fn with_trailing_slash(s: &str) -> String {
    if s.ends_with('/') {
        s.to_string()
    } else {
        format!("{s}/")
    }
}

fn join_url(base: &Url, path: &str) -> String {
    base.join(path)
        .map(String::from)
        .unwrap_or_else(|_| format!("{base}{}", path.trim_start_matches('/')))
}
