use anyhow::{Context, Result};
use log::info;
use std::path::Path;

use crate::{
    error::ShimError,
    manifest::{LocalVariantOptions, Manifest, to_local_variant, with_entry_point},
    runtime::Runtime,
};

pub mod config;

use config::Config;

/// Rewrite the manifest at `manifest_path` into the local distribution variant.
#[tracing::instrument(skip(runtime))]
pub fn local<R: Runtime>(
    runtime: &R,
    manifest_path: &Path,
    options: &LocalVariantOptions,
) -> Result<()> {
    let manifest = Manifest::load(runtime, manifest_path)?;
    let original_name = manifest.name.clone().unwrap_or_default();

    let manifest = to_local_variant(manifest, options)
        .with_context(|| format!("Failed to convert {:?}", manifest_path))?;
    manifest.save(runtime, manifest_path)?;

    info!("Converted {:?} to the local variant", manifest_path);
    println!(
        "{} -> {}",
        original_name,
        manifest.name.as_deref().unwrap_or_default()
    );
    Ok(())
}

/// Set the manifest entry point to `entry`, or the default when absent.
#[tracing::instrument(skip(runtime))]
pub fn set_main<R: Runtime>(runtime: &R, manifest_path: &Path, entry: Option<&str>) -> Result<()> {
    let manifest = Manifest::load(runtime, manifest_path)?;
    let manifest = with_entry_point(manifest, entry);
    manifest.save(runtime, manifest_path)?;

    println!("main = {}", manifest.main.as_deref().unwrap_or_default());
    Ok(())
}

/// Print the download URL of every supported platform.
#[tracing::instrument(skip(config))]
pub fn urls<R: Runtime + 'static>(config: &Config<R>) -> Result<()> {
    let manifest = Manifest::load(config.runtime.as_ref(), &config.manifest_path)?;
    let version = manifest.require_version()?;

    for (key, url) in config.resolver.urls(version).iter() {
        println!("{}\t{}", key, url);
    }
    Ok(())
}

#[tracing::instrument(skip(config))]
pub async fn install<R: Runtime + 'static>(config: &Config<R>, dir: Option<&Path>) -> Result<()> {
    let wrapper = config.wrapper(dir)?;
    let unpacked = wrapper.install().await?;
    println!("Installed to {}", unpacked.display());
    Ok(())
}

/// Run the named binary and return its exit code.
#[tracing::instrument(skip(config, args))]
pub async fn run<R: Runtime + 'static>(
    config: &Config<R>,
    dir: Option<&Path>,
    name: &str,
    args: &[String],
) -> Result<i32> {
    let wrapper = config.wrapper(dir)?;
    wrapper.run(name, args).await
}

/// Verify that every release URL can be fetched.
#[tracing::instrument(skip(config))]
pub async fn check<R: Runtime + 'static>(config: &Config<R>) -> Result<()> {
    let wrapper = config.wrapper(None)?;
    let statuses = wrapper.check().await;

    for status in &statuses {
        match &status.error {
            None => println!("ok\t{}\t{}", status.key, status.url),
            Some(e) => println!("FAILED\t{}\t{}\t{}", status.key, status.url, e),
        }
    }

    let unreachable: Vec<String> = statuses
        .into_iter()
        .filter(|s| !s.is_ok())
        .map(|s| s.url)
        .collect();
    if !unreachable.is_empty() {
        return Err(ShimError::UnreachableUrls(unreachable).into());
    }
    Ok(())
}
