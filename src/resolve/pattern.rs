//! Output path patterns.
//!
//! A pattern is a relative path template rendered once per artifact:
//!
//! | Token | Value                                   |
//! |-------|-----------------------------------------|
//! | `%n`  | source file stem (`a.min` for `a.min.css`) |
//! | `%e`  | source extension, or the kind's default |
//! | `%d`  | full hex digest of the artifact bytes   |
//! | `%l`  | short (8 char) hex digest               |
//! | `%h`  | asset kind (`style` / `script`)         |
//! | `%%`  | a literal `%`                           |
//!
//! A `-` between `%` and the token letter prefixes the value with `-`
//! when the value is non-empty, so `static/%n%-l.%e` renders to
//! `static/app-1a2b3c4d.js`.
//!
//! Patterns are parsed once when the pipeline is built; unknown tokens are
//! rejected there, never per asset.

use std::path::{Component, Path};

use crate::asset::AssetKind;
use crate::error::{PipelineError, Result};

use super::hash::ContentHash;

/// Default output pattern.
pub const DEFAULT_PATTERN: &str = "static/%n%-l.%e";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Name,
    Ext,
    Digest,
    ShortDigest,
    Kind,
}

impl Token {
    fn from_char(c: char) -> Option<Self> {
        match c {
            'n' => Some(Self::Name),
            'e' => Some(Self::Ext),
            'd' => Some(Self::Digest),
            'l' => Some(Self::ShortDigest),
            'h' => Some(Self::Kind),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Token { token: Token, dash: bool },
}

/// Values substituted into a pattern.
#[derive(Debug, Clone, Copy)]
pub struct PatternInput<'a> {
    pub name: &'a str,
    pub ext: &'a str,
    pub hash: ContentHash,
    pub kind: AssetKind,
}

/// A parsed output path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPattern {
    source: String,
    segments: Vec<Segment>,
}

impl OutputPattern {
    /// Parse and validate a pattern.
    pub fn parse(pattern: &str) -> Result<Self> {
        let fail = |reason: String| PipelineError::invalid_pattern(pattern, reason);

        if pattern.trim().is_empty() {
            return Err(fail("pattern is empty".into()));
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = pattern.chars();

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }

            let mut next = chars.next();
            if next == Some('%') {
                literal.push('%');
                continue;
            }

            let dash = next == Some('-');
            if dash {
                next = chars.next();
            }

            let Some(letter) = next else {
                return Err(fail("dangling `%` at end of pattern".into()));
            };
            let Some(token) = Token::from_char(letter) else {
                let shown = if dash { format!("%-{letter}") } else { format!("%{letter}") };
                return Err(fail(format!(
                    "unknown token `{shown}` (expected %n, %e, %d, %l, %h or %%)"
                )));
            };

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Token { token, dash });
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        let parsed = Self {
            source: pattern.to_string(),
            segments,
        };
        parsed.validate_shape().map_err(|reason| fail(reason.into()))?;
        Ok(parsed)
    }

    /// Render a sample path and check it stays a relative file path.
    fn validate_shape(&self) -> std::result::Result<(), &'static str> {
        let sample = self.render(&PatternInput {
            name: "name",
            ext: "ext",
            hash: ContentHash::new([0; 32]),
            kind: AssetKind::Style,
        });

        if sample.ends_with('/') || sample.ends_with('\\') {
            return Err("pattern must end with a file name");
        }
        check_relative(&sample)
    }

    /// The pattern as written in configuration.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether rendered names depend on the artifact content.
    ///
    /// Content-addressed outputs can be reused by existence alone.
    pub fn has_digest(&self) -> bool {
        self.segments.iter().any(|s| {
            matches!(
                s,
                Segment::Token {
                    token: Token::Digest | Token::ShortDigest,
                    ..
                }
            )
        })
    }

    /// Render the relative output path (always `/`-separated).
    pub fn render(&self, input: &PatternInput<'_>) -> String {
        let mut out = String::with_capacity(self.source.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token { token, dash } => {
                    let value = match token {
                        Token::Name => input.name.to_string(),
                        Token::Ext if input.ext.is_empty() => input.kind.extension().to_string(),
                        Token::Ext => input.ext.to_string(),
                        Token::Digest => input.hash.to_hex(),
                        Token::ShortDigest => input.hash.short(),
                        Token::Kind => input.kind.name().to_string(),
                    };
                    if *dash && !value.is_empty() {
                        out.push('-');
                    }
                    out.push_str(&value);
                }
            }
        }
        out.replace('\\', "/")
    }
}

impl Default for OutputPattern {
    fn default() -> Self {
        Self {
            source: DEFAULT_PATTERN.to_string(),
            segments: vec![
                Segment::Literal("static/".into()),
                Segment::Token {
                    token: Token::Name,
                    dash: false,
                },
                Segment::Token {
                    token: Token::ShortDigest,
                    dash: true,
                },
                Segment::Literal(".".into()),
                Segment::Token {
                    token: Token::Ext,
                    dash: false,
                },
            ],
        }
    }
}

/// Reject rendered paths that would leave the output root.
pub(crate) fn check_relative(path: &str) -> std::result::Result<(), &'static str> {
    for comp in Path::new(path).components() {
        match comp {
            Component::ParentDir => return Err("parent directory '..' not allowed"),
            Component::Prefix(_) | Component::RootDir => {
                return Err("pattern must be a relative path");
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &'static str, ext: &'static str) -> PatternInput<'static> {
        PatternInput {
            name,
            ext,
            hash: ContentHash::of(b"body{}"),
            kind: AssetKind::Style,
        }
    }

    #[test]
    fn test_default_pattern() {
        let pattern = OutputPattern::parse(DEFAULT_PATTERN).unwrap();
        assert_eq!(pattern, OutputPattern::default());

        let hash = ContentHash::of(b"body{}");
        assert_eq!(
            pattern.render(&input("site", "css")),
            format!("static/site-{}.css", hash.short())
        );
        assert!(pattern.has_digest());
    }

    #[test]
    fn test_full_and_short_digest_together() {
        let pattern = OutputPattern::parse("%h/%d/%n.%l.%e").unwrap();
        let hash = ContentHash::of(b"body{}");
        assert_eq!(
            pattern.render(&input("a", "css")),
            format!("style/{}/a.{}.css", hash.to_hex(), hash.short())
        );
    }

    #[test]
    fn test_literal_percent_and_missing_ext() {
        let pattern = OutputPattern::parse("out/100%%/%n.%e").unwrap();
        assert_eq!(pattern.render(&input("theme", "")), "out/100%/theme.css");
        assert!(!pattern.has_digest());
    }

    #[test]
    fn test_unknown_token_rejected() {
        let err = OutputPattern::parse("static/%n-%x.%e").unwrap_err();
        match err {
            PipelineError::InvalidPattern { reason, .. } => assert!(reason.contains("%x")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(OutputPattern::parse("static/%-q").is_err());
    }

    #[test]
    fn test_dangling_percent_rejected() {
        assert!(OutputPattern::parse("static/%n%").is_err());
        assert!(OutputPattern::parse("static/%n%-").is_err());
    }

    #[test]
    fn test_shape_rejected() {
        assert!(OutputPattern::parse("").is_err());
        assert!(OutputPattern::parse("../%n.%e").is_err());
        assert!(OutputPattern::parse("/abs/%n.%e").is_err());
        assert!(OutputPattern::parse("static/%h/").is_err());
    }

    #[test]
    fn test_check_relative() {
        assert!(check_relative("static/a.css").is_ok());
        assert!(check_relative("./a.css").is_ok());
        assert!(check_relative("../a.css").is_err());
        assert!(check_relative("static/../../a.css").is_err());
        assert!(check_relative("/a.css").is_err());
    }
}
