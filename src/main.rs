//! assetry - fingerprinting asset pipeline for CSS and JavaScript.

mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use owo_colors::OwoColorize;

use assetry::config::PipelineConfig;
use assetry::session::Pipeline;
use assetry::{log, logger};
use cli::{Cli, Commands};

const DEFAULT_CONFIG: &str = "assetry.toml";

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let pipeline = Pipeline::new(config)?;

    match &cli.command {
        Commands::Tags { args } => cli::tags::run_tags(args, &pipeline),
        Commands::Resolve {
            asset,
            kind,
            pretty,
        } => cli::resolve::run_resolve(asset, *kind, *pretty, &pipeline),
        Commands::Check => check(&pipeline),
    }
}

/// Load the config file, or defaults rooted at the current directory when
/// no file was given and `assetry.toml` does not exist.
fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    if let Some(path) = path {
        return PipelineConfig::from_path(path)
            .with_context(|| format!("failed to load {}", path.display()));
    }

    let default = PathBuf::from(DEFAULT_CONFIG);
    if default.is_file() {
        return PipelineConfig::from_path(&default)
            .with_context(|| format!("failed to load {DEFAULT_CONFIG}"));
    }

    let mut config = PipelineConfig::default();
    let cwd = std::env::current_dir().context("failed to get current directory")?;
    config.normalize(&cwd);
    Ok(config)
}

/// Report the validated configuration and the selected backend.
fn check(pipeline: &Pipeline) -> Result<()> {
    let config = pipeline.config();

    log!("check"; "base_dir: {}", config.base_dir.display());
    log!("check"; "output: {}", config.output_root.join(&config.output_dir).display());
    log!("check"; "transform: {}", pipeline.resolver().transformer().fingerprint());
    println!("{}", "configuration ok".green());
    Ok(())
}
