//! `tags` command: register assets into a fresh session and print markup.

use anyhow::{Context, Result};

use assetry::address::SiteRoot;
use assetry::session::Pipeline;

use super::TagsArgs;

pub fn run_tags(args: &TagsArgs, pipeline: &Pipeline) -> Result<()> {
    let site_root = args
        .site_root
        .as_deref()
        .map(SiteRoot::parse)
        .transpose()
        .context("invalid --site-root")?;

    let mut session = pipeline.session(site_root);
    let mut helpers = pipeline.helpers(&mut session);
    for (path, media) in args.entries() {
        // rejected references are logged by the helper
        let _ = helpers.add_asset(path, media);
    }

    let markup = helpers.tags(args.order)?;
    if !markup.is_empty() {
        println!("{markup}");
    }
    Ok(())
}
