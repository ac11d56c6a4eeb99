//! `resolve` command: resolve one asset and print the artifact as JSON.

use anyhow::{Context, Result};

use assetry::asset::{AssetKind, AssetRef};
use assetry::session::Pipeline;

pub fn run_resolve(
    asset: &str,
    kind: Option<AssetKind>,
    pretty: bool,
    pipeline: &Pipeline,
) -> Result<()> {
    let reference = match kind {
        Some(kind) => AssetRef::new(asset, kind, None::<String>)?,
        None => AssetRef::infer(asset, None::<String>)?,
    };

    let artifact = pipeline
        .resolver()
        .resolve(&reference, None)
        .with_context(|| format!("failed to resolve `{asset}`"))?;

    let json = if pretty {
        serde_json::to_string_pretty(&artifact)?
    } else {
        serde_json::to_string(&artifact)?
    };
    println!("{json}");
    Ok(())
}
