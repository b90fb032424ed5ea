//! The `package.json` manifest.
//!
//! Fields the transforms care about are typed; every other key is kept in
//! `extra` and written back in its original position.

mod transform;

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::error::ShimError;
use crate::runtime::Runtime;

pub use transform::{
    DEFAULT_DOWNLOADER, DEFAULT_ENTRY_POINT, DEFAULT_LOCAL_NAME, LocalVariantOptions,
    strip_for_local_distribution, strip_for_local_distribution_and_relocate_downloader,
    to_local_variant, with_entry_point,
};

/// A string-keyed JSON object section such as `scripts` or `dependencies`.
pub type Section = Map<String, Value>;

/// The `bin` field: either a single executable path or a name-to-path mapping.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum BinField {
    Path(String),
    Map(Section),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin: Option<BinField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripts: Option<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Section>,
    #[serde(
        rename = "devDependencies",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub dev_dependencies: Option<Section>,
    #[serde(flatten)]
    pub extra: Section,

    /// Key order of the source document; keys not in it are appended.
    #[serde(skip)]
    key_order: Vec<String>,
}

impl Manifest {
    /// Parse a manifest from JSON text, remembering the order of its keys.
    pub fn parse(content: &str) -> Result<Self> {
        let document: Map<String, Value> =
            serde_json::from_str(content).context("Manifest is not a JSON object")?;
        let key_order = document.keys().cloned().collect();
        let mut manifest: Manifest = serde_json::from_value(Value::Object(document))
            .context("Manifest has an unexpected shape")?;
        manifest.key_order = key_order;
        Ok(manifest)
    }

    /// Serialize with 2-space indentation and no trailing newline.
    pub fn to_json_string(&self) -> Result<String> {
        let Value::Object(fields) = serde_json::to_value(self)? else {
            anyhow::bail!("Manifest did not serialize to a JSON object");
        };

        let mut ordered = Map::new();
        for key in &self.key_order {
            if let Some(value) = fields.get(key) {
                ordered.insert(key.clone(), value.clone());
            }
        }
        for (key, value) in &fields {
            if !ordered.contains_key(key) {
                ordered.insert(key.clone(), value.clone());
            }
        }

        Ok(serde_json::to_string_pretty(&Value::Object(ordered))?)
    }

    /// The package version, required to build release URLs.
    pub fn require_version(&self) -> Result<&str, ShimError> {
        self.version
            .as_deref()
            .ok_or_else(|| ShimError::MissingField("version".to_string()))
    }

    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read manifest {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse manifest {:?}", path))
    }

    /// Write the manifest through a sibling temp file so the target is
    /// either the old document or the new one. The temp file is removed when
    /// writing or renaming fails.
    ///
    /// The rename replaces `path` itself: a symlinked manifest becomes a
    /// regular file and takes default permissions.
    #[tracing::instrument(skip(self, runtime))]
    pub fn save<R: Runtime>(&self, runtime: &R, path: &Path) -> Result<()> {
        let json = self.to_json_string()?;
        let tmp_path = path.with_extension("json.tmp");
        debug!("Writing manifest to {:?} via {:?}", path, tmp_path);

        let written = runtime
            .write(&tmp_path, json.as_bytes())
            .and_then(|()| runtime.rename(&tmp_path, path));
        if let Err(e) = written {
            if runtime.exists(&tmp_path)
                && let Err(cleanup) = runtime.remove_file(&tmp_path)
            {
                debug!("Failed to remove {:?}: {}", tmp_path, cleanup);
            }
            return Err(e.context(format!("Failed to write manifest {:?}", path)));
        }
        Ok(())
    }
}
