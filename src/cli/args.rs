//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use assetry::asset::AssetKind;
use assetry::emit::TagOrder;

/// Asset pipeline: fingerprint, minify and emit tags for CSS and JS
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: assetry.toml, optional)
    #[arg(short = 'C', long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Resolve assets and print their tags
    #[command(visible_alias = "t")]
    Tags {
        #[command(flatten)]
        args: TagsArgs,
    },

    /// Resolve a single asset and print the artifact as JSON
    #[command(visible_alias = "r")]
    Resolve {
        /// Source path (relative to base_dir) or external URL
        asset: String,

        /// Asset kind (css or js), inferred from the extension if omitted
        #[arg(short, long, value_parser = parse_kind)]
        kind: Option<AssetKind>,

        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Validate the configuration and report the transform backend
    #[command(visible_alias = "c")]
    Check,
}

/// Tags command arguments.
#[derive(clap::Args, Debug, Clone)]
pub struct TagsArgs {
    /// Assets to register, in order. Append `=MEDIA` to set a media query,
    /// e.g. `css/print.css=print`.
    #[arg(value_name = "ASSET", required = true)]
    pub assets: Vec<String>,

    /// Request origin used for relative base urls (e.g. https://example.com)
    #[arg(short, long = "site-root", value_hint = clap::ValueHint::Url)]
    pub site_root: Option<String>,

    /// Which group to print first (style-first, script-first)
    #[arg(short, long, default_value = "style-first")]
    pub order: TagOrder,
}

impl TagsArgs {
    /// Split `path=media` arguments.
    pub fn entries(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.assets.iter().map(|arg| match arg.rsplit_once('=') {
            Some((path, media)) if !path.is_empty() && !is_url_query(path) => (path, Some(media)),
            _ => (arg.as_str(), None),
        })
    }
}

/// `=` inside a query string (`a.css?v=2`) is not a media separator.
fn is_url_query(path: &str) -> bool {
    path.contains('?')
}

fn parse_kind(s: &str) -> Result<AssetKind, String> {
    AssetKind::from_name(s).ok_or_else(|| format!("unknown asset kind `{s}` (expected css or js)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(args: &[&str]) -> TagsArgs {
        let mut argv = vec!["assetry", "tags"];
        argv.extend_from_slice(args);
        match Cli::parse_from(argv).command {
            Commands::Tags { args } => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_tags_entries() {
        let args = tags(&["css/a.css", "css/print.css=print", "js/b.js?v=1"]);
        let entries: Vec<_> = args.entries().collect();
        assert_eq!(
            entries,
            vec![
                ("css/a.css", None),
                ("css/print.css", Some("print")),
                ("js/b.js?v=1", None),
            ]
        );
        assert_eq!(args.order, TagOrder::StyleFirst);
    }

    #[test]
    fn test_tags_order_flag() {
        let args = tags(&["--order", "script-first", "a.js"]);
        assert_eq!(args.order, TagOrder::ScriptFirst);
    }

    #[test]
    fn test_resolve_kind_flag() {
        let cli = Cli::parse_from(["assetry", "resolve", "--kind", "css", "theme"]);
        assert!(matches!(
            cli.command,
            Commands::Resolve { kind: Some(AssetKind::Style), .. }
        ));
        assert!(Cli::try_parse_from(["assetry", "resolve", "--kind", "png", "x"]).is_err());
    }
}
