//! Manifest variants for the different distribution channels.

use anyhow::Result;
use log::debug;

use super::{Manifest, Section};
use crate::error::ShimError;

/// Package name of the local distribution variant.
pub const DEFAULT_LOCAL_NAME: &str = "mta-local";

/// Dependency that downloads the binary during `npm install`.
pub const DEFAULT_DOWNLOADER: &str = "binwrap";

/// Entry point used when no override is given.
pub const DEFAULT_ENTRY_POINT: &str = "index.js";

/// How to build the local distribution variant.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariantOptions {
    pub local_name: String,
    /// Move this dependency from `dependencies` to `devDependencies`.
    pub relocate_downloader: Option<String>,
}

impl Default for LocalVariantOptions {
    fn default() -> Self {
        Self {
            local_name: DEFAULT_LOCAL_NAME.to_string(),
            relocate_downloader: None,
        }
    }
}

impl LocalVariantOptions {
    pub fn relocating(downloader: impl Into<String>) -> Self {
        Self {
            relocate_downloader: Some(downloader.into()),
            ..Self::default()
        }
    }
}

/// Build the local variant: no `bin`, no install hook, renamed package.
///
/// The local package never downloads on install and never adds scripts to
/// `node_modules/.bin`. With `relocate_downloader`, the downloader dependency
/// is only needed at build time, so it moves to `devDependencies`.
///
/// Fails with [`ShimError::MissingField`] when `scripts` is absent and with
/// [`ShimError::MissingDependency`] when the dependency to relocate is not a
/// runtime dependency. On failure the input is dropped unchanged; nothing is
/// persisted.
#[tracing::instrument(skip(manifest))]
pub fn to_local_variant(mut manifest: Manifest, options: &LocalVariantOptions) -> Result<Manifest> {
    let scripts = manifest
        .scripts
        .as_mut()
        .ok_or_else(|| ShimError::MissingField("scripts".to_string()))?;

    if let Some(hook) = scripts.shift_remove("install") {
        debug!("Removed install hook {}", hook);
    }
    if manifest.bin.take().is_some() {
        debug!("Removed bin mapping");
    }
    manifest.name = Some(options.local_name.clone());

    if let Some(downloader) = &options.relocate_downloader {
        let version = manifest
            .dependencies
            .as_mut()
            .and_then(|deps| deps.shift_remove(downloader))
            .ok_or_else(|| ShimError::MissingDependency(downloader.clone()))?;

        debug!("Moving {}@{} to devDependencies", downloader, version);
        manifest
            .dev_dependencies
            .get_or_insert_with(Section::new)
            .insert(downloader.clone(), version);
    }

    Ok(manifest)
}

pub fn strip_for_local_distribution(manifest: Manifest) -> Result<Manifest> {
    to_local_variant(manifest, &LocalVariantOptions::default())
}

pub fn strip_for_local_distribution_and_relocate_downloader(manifest: Manifest) -> Result<Manifest> {
    to_local_variant(manifest, &LocalVariantOptions::relocating(DEFAULT_DOWNLOADER))
}

/// Set `main` to `entry` when it is given and non-empty, else to [`DEFAULT_ENTRY_POINT`].
pub fn with_entry_point(mut manifest: Manifest, entry: Option<&str>) -> Manifest {
    let entry = entry
        .filter(|e| !e.is_empty())
        .unwrap_or(DEFAULT_ENTRY_POINT);
    manifest.main = Some(entry.to_string());
    manifest
}
