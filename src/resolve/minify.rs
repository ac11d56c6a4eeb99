//! Transform backends for CSS and JS.
//!
//! The backend is chosen once per pipeline from configuration:
//!
//! | Mode   | Backend                                        |
//! |--------|------------------------------------------------|
//! | `None` | pass-through                                   |
//! | `Fast` | regex comment/whitespace stripper, never fails |
//! | `Pure` | oxc for JavaScript, lightningcss for CSS       |
//! | `Tool` | external compressor reading stdin, writing stdout |
//!
//! An external tool that cannot be found falls back to `Pure`.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;
use regex::Regex;

use crate::asset::AssetKind;
use crate::config::MinifySetting;
use crate::error::{PipelineError, Result};
use crate::log;
use crate::utils::exec::Cmd;

/// External compressor invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub program: PathBuf,
    /// Extra arguments; `{ext}` and `{kind}` are substituted per asset.
    pub args: Vec<String>,
    pub timeout: Duration,
}

/// Configured transform strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformMode {
    None,
    Fast,
    Pure,
    Tool(ToolSpec),
}

impl TransformMode {
    /// Map the `minify` setting onto a mode.
    ///
    /// `false`/`"off"` → none, `true`/`"auto"` → best in-process backend,
    /// `"fast"` → stripper, library names → pure, anything else is a tool.
    pub fn from_setting(setting: &MinifySetting, args: &[String], timeout: Duration) -> Self {
        match setting {
            MinifySetting::Enabled(false) => Self::None,
            MinifySetting::Enabled(true) => Self::Pure,
            MinifySetting::Named(name) => match name.trim().to_ascii_lowercase().as_str() {
                "" | "off" | "none" | "false" => Self::None,
                "on" | "auto" | "best" | "true" => Self::Pure,
                "fast" => Self::Fast,
                "pure" | "oxc" | "lightningcss" | "builtin" => Self::Pure,
                _ => {
                    let expanded = shellexpand::tilde(name.trim()).into_owned();
                    Self::Tool(ToolSpec {
                        program: PathBuf::from(expanded),
                        args: args.to_vec(),
                        timeout,
                    })
                }
            },
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Fast => "minify-fast",
            Self::Pure => "minify-pure",
            Self::Tool(_) => "minify-tool",
        }
    }
}

/// A transform backend, selected and availability-checked once.
#[derive(Debug, Clone)]
pub struct Transformer {
    mode: TransformMode,
}

impl Transformer {
    /// Select the backend for `mode`, falling back when it is unavailable.
    pub fn select(mode: TransformMode) -> Self {
        let mode = match mode {
            TransformMode::Tool(spec) => match which::which(&spec.program) {
                Ok(program) => TransformMode::Tool(ToolSpec { program, ..spec }),
                Err(_) => {
                    log!(
                        "minify";
                        "`{}` not found, falling back to {}",
                        spec.program.display(),
                        TransformMode::Pure.name()
                    );
                    TransformMode::Pure
                }
            },
            other => other,
        };
        Self { mode }
    }

    pub const fn mode(&self) -> &TransformMode {
        &self.mode
    }

    /// Whether this transformer ever changes bytes.
    pub const fn is_passthrough(&self) -> bool {
        matches!(self.mode, TransformMode::None)
    }

    /// Stable description of the backend, shown by `check` and in verbose logs.
    pub fn fingerprint(&self) -> String {
        match &self.mode {
            TransformMode::Tool(spec) => {
                format!("tool:{}:{}", spec.program.display(), spec.args.join(" "))
            }
            other => other.name().to_string(),
        }
    }

    /// Transform artifact bytes.
    ///
    /// `label` names the asset in error messages.
    pub fn transform(&self, source: &[u8], kind: AssetKind, label: &str) -> Result<Vec<u8>> {
        match &self.mode {
            TransformMode::None => Ok(source.to_vec()),
            TransformMode::Fast => {
                let text = as_text(source, label)?;
                Ok(minify_fast(text, kind).into_bytes())
            }
            TransformMode::Pure => {
                let text = as_text(source, label)?;
                let minified = match kind {
                    AssetKind::Script => minify_js(text),
                    AssetKind::Style => minify_css(text),
                };
                minified
                    .map(String::into_bytes)
                    .map_err(|reason| PipelineError::transform(label, reason))
            }
            TransformMode::Tool(spec) => run_tool(spec, source, kind)
                .map_err(|e| PipelineError::transform(label, format!("{e:#}"))),
        }
    }
}

fn as_text<'a>(source: &'a [u8], label: &str) -> Result<&'a str> {
    std::str::from_utf8(source)
        .map_err(|e| PipelineError::transform(label, format!("source is not utf-8: {e}")))
}

// ============================================================================
// In-process backends
// ============================================================================

/// Minify JavaScript source code.
///
/// Sources are parsed as classic scripts: top-level declarations are
/// globals shared between `<script>` tags, so they are neither dropped
/// nor renamed.
pub fn minify_js(source: &str) -> std::result::Result<String, String> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_script(true);
    let ret = Parser::new(&allocator, source, source_type).parse();
    if let Some(first) = ret.errors.first() {
        return Err(format!("parse error: {first}"));
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions {
            top_level: Some(false),
            ..MangleOptions::default()
        }),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Ok(code)
}

/// Minify CSS source code.
pub fn minify_css(source: &str) -> std::result::Result<String, String> {
    let stylesheet = StyleSheet::parse(source, ParserOptions::default())
        .map_err(|e| format!("parse error: {e}"))?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|e| format!("print error: {e}"))?;
    Ok(result.code)
}

// ============================================================================
// Fast stripper
// ============================================================================

static CSS_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\*[\s\S]*?\*/").expect("valid regex"));
static CSS_SPACE_AROUND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*([{};:,>])\s*").expect("valid regex"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Best-effort minification that cannot fail.
///
/// CSS loses comments and insignificant whitespace. JS only loses
/// indentation, blank lines and whole-line `//` comments, since anything
/// more needs a parser.
pub fn minify_fast(source: &str, kind: AssetKind) -> String {
    match kind {
        AssetKind::Style => {
            let text = CSS_COMMENT.replace_all(source, "");
            let text = WHITESPACE_RUN.replace_all(&text, " ");
            let text = CSS_SPACE_AROUND.replace_all(&text, "$1");
            text.replace(";}", "}").trim().to_string()
        }
        AssetKind::Script => source
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

// ============================================================================
// External tool
// ============================================================================

fn run_tool(spec: &ToolSpec, source: &[u8], kind: AssetKind) -> anyhow::Result<Vec<u8>> {
    let args = spec.args.iter().map(|arg| {
        arg.replace("{ext}", kind.extension())
            .replace("{kind}", kind.name())
    });
    let output = Cmd::new(&spec.program)
        .args(args)
        .stdin(source)
        .timeout(spec.timeout)
        .run()?;
    if output.stdout.iter().all(u8::is_ascii_whitespace) && !source.is_empty() {
        anyhow::bail!("`{}` produced no output", spec.program.display());
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeout() -> Duration {
        Duration::from_secs(5)
    }

    #[test]
    fn test_mode_from_setting() {
        let args = vec![];
        let mode = |s: MinifySetting| TransformMode::from_setting(&s, &args, timeout());

        assert_eq!(mode(MinifySetting::Enabled(false)), TransformMode::None);
        assert_eq!(mode(MinifySetting::Enabled(true)), TransformMode::Pure);
        assert_eq!(mode(MinifySetting::Named("off".into())), TransformMode::None);
        assert_eq!(mode(MinifySetting::Named("fast".into())), TransformMode::Fast);
        assert_eq!(mode(MinifySetting::Named("lightningcss".into())), TransformMode::Pure);
        assert!(matches!(
            mode(MinifySetting::Named("/usr/bin/csso".into())),
            TransformMode::Tool(ToolSpec { ref program, .. }) if program == &PathBuf::from("/usr/bin/csso")
        ));
    }

    #[test]
    fn test_missing_tool_falls_back_to_pure() {
        let transformer = Transformer::select(TransformMode::Tool(ToolSpec {
            program: PathBuf::from("assetry-no-such-minifier-xyz"),
            args: vec![],
            timeout: timeout(),
        }));
        assert_eq!(transformer.mode(), &TransformMode::Pure);
    }

    #[test]
    fn test_passthrough_keeps_bytes() {
        let transformer = Transformer::select(TransformMode::None);
        let source = b"body {\n  color: red;\n}\n";
        let out = transformer.transform(source, AssetKind::Style, "a.css").unwrap();
        assert_eq!(out, source);
        assert!(transformer.is_passthrough());
    }

    #[test]
    fn test_minify_css() {
        let css = minify_css("body {\n  color: red;\n  margin: 0px;\n}\n").unwrap();
        assert!(css.len() < 30);
        assert!(css.contains("color:red"));
    }

    #[test]
    fn test_minify_js() {
        let source = "function add(first, second) {\n  return first + second;\n}\n";
        let js = minify_js(source).unwrap();
        assert!(js.len() < source.len());
        assert!(js.contains("add"));
        assert!(!js.contains("first + second"));
    }

    #[test]
    fn test_minify_js_keeps_script_globals() {
        let js = minify_js("function initMenu(){}\nvar siteConfig={};").unwrap();
        assert!(js.contains("initMenu"), "{js}");
        assert!(js.contains("siteConfig"), "{js}");
    }

    #[test]
    fn test_pure_reports_parse_errors() {
        let transformer = Transformer::select(TransformMode::Pure);
        let err = transformer
            .transform(b"function (", AssetKind::Script, "broken.js")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Transform { .. }));
    }

    #[test]
    fn test_non_utf8_is_transform_error() {
        let transformer = Transformer::select(TransformMode::Fast);
        let err = transformer
            .transform(&[0xff, 0xfe, 0x00], AssetKind::Style, "bin.css")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Transform { .. }));
    }

    #[test]
    fn test_minify_fast_css() {
        let out = minify_fast("/* header */\nbody {\n  color : red ;\n}\n\na > b { margin: 0 }\n", AssetKind::Style);
        assert_eq!(out, "body{color:red}a>b{margin:0}");
    }

    #[test]
    fn test_minify_fast_js() {
        let out = minify_fast("// banner\n\nconst a = 1;\n    console.log(a); // keep\n", AssetKind::Script);
        assert_eq!(out, "const a = 1;\nconsole.log(a); // keep");
    }

    #[test]
    fn test_fingerprint_differs_per_mode() {
        let none = Transformer::select(TransformMode::None).fingerprint();
        let fast = Transformer::select(TransformMode::Fast).fingerprint();
        let pure = Transformer::select(TransformMode::Pure).fingerprint();
        assert_ne!(none, fast);
        assert_ne!(fast, pure);
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_roundtrip_via_cat() {
        let transformer = Transformer::select(TransformMode::Tool(ToolSpec {
            program: PathBuf::from("cat"),
            args: vec![],
            timeout: timeout(),
        }));
        assert!(matches!(transformer.mode(), TransformMode::Tool(_)));
        let out = transformer.transform(b"a{}", AssetKind::Style, "a.css").unwrap();
        assert_eq!(out, b"a{}");
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_nonzero_exit_is_transform_error() {
        let transformer = Transformer::select(TransformMode::Tool(ToolSpec {
            program: PathBuf::from("false"),
            args: vec![],
            timeout: timeout(),
        }));
        let err = transformer.transform(b"a{}", AssetKind::Style, "a.css").unwrap_err();
        assert!(matches!(err, PipelineError::Transform { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_empty_output_is_transform_error() {
        let transformer = Transformer::select(TransformMode::Tool(ToolSpec {
            program: PathBuf::from("true"),
            args: vec![],
            timeout: timeout(),
        }));
        let err = transformer.transform(b"a{}", AssetKind::Style, "a.css").unwrap_err();
        assert!(matches!(err, PipelineError::Transform { .. }));
        assert!(err.to_string().contains("no output"), "{err}");
    }
}
