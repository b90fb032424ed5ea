//! Release artifact resolution.
//!
//! Maps a package version and a platform key to the URL of the release
//! archive that carries the binary for that platform:
//!
//! ```text
//! <release url>/v<version>/cloud-mta_<version>_<suffix>
//! ```

use anyhow::{Result, anyhow, bail};
use std::str::FromStr;

use crate::error::ShimError;
use crate::platform::PlatformKey;

/// Where release archives are published.
pub const DEFAULT_RELEASE_URL: &str = "https://github.com/SAP/cloud-mta/releases/download";

/// File name prefix of every release archive.
pub const ARTIFACT_PREFIX: &str = "cloud-mta";

/// Archive suffix published for one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformArtifact {
    pub key: PlatformKey,
    pub suffix: String,
}

impl PlatformArtifact {
    pub fn new(os: &str, arch: &str, suffix: &str) -> Self {
        Self {
            key: PlatformKey::new(os, arch),
            suffix: suffix.to_string(),
        }
    }
}

/// Ordered list of platforms with a published archive, one entry per key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedPlatforms(Vec<PlatformArtifact>);

impl SupportedPlatforms {
    /// Platforms published by current releases, including Apple silicon.
    pub fn current() -> Self {
        Self(vec![
            PlatformArtifact::new("darwin", "arm64", "Darwin_arm64.tar.gz"),
            PlatformArtifact::new("darwin", "x64", "Darwin_amd64.tar.gz"),
            PlatformArtifact::new("linux", "x64", "Linux_amd64.tar.gz"),
            PlatformArtifact::new("win32", "x64", "Windows_amd64.tar.gz"),
        ])
    }

    /// Platforms published by older releases, which had no `darwin-arm64` build.
    pub fn legacy() -> Self {
        Self(vec![
            PlatformArtifact::new("darwin", "x64", "Darwin_amd64.tar.gz"),
            PlatformArtifact::new("linux", "x64", "Linux_amd64.tar.gz"),
            PlatformArtifact::new("win32", "x64", "Windows_amd64.tar.gz"),
        ])
    }

    pub fn from_entries(entries: Vec<PlatformArtifact>) -> Result<Self> {
        if entries.is_empty() {
            bail!("Platform list is empty");
        }
        for (i, entry) in entries.iter().enumerate() {
            if entries[..i].iter().any(|e| e.key == entry.key) {
                bail!("Platform {} is listed more than once", entry.key);
            }
        }
        Ok(Self(entries))
    }

    pub fn entries(&self) -> &[PlatformArtifact] {
        &self.0
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.iter().map(|e| e.key.to_string()).collect()
    }
}

impl Default for SupportedPlatforms {
    fn default() -> Self {
        Self::current()
    }
}

/// Accepts a preset name (`current`, `legacy`) or a comma separated list of
/// `<os>-<arch>=<suffix>` entries.
impl FromStr for SupportedPlatforms {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "current" => return Ok(Self::current()),
            "legacy" => return Ok(Self::legacy()),
            _ => {}
        }

        let entries = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| -> Result<PlatformArtifact> {
                let (key, suffix) = part
                    .split_once('=')
                    .ok_or_else(|| anyhow!("Invalid platform entry \"{}\", expected <os>-<arch>=<suffix>", part))?;
                let suffix = suffix.trim();
                if suffix.is_empty() {
                    bail!("Platform entry \"{}\" has an empty suffix", part);
                }
                Ok(PlatformArtifact {
                    key: key.trim().parse()?,
                    suffix: suffix.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::from_entries(entries)
    }
}

/// Download URL per platform key, in the order the platforms were declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlMap(Vec<(PlatformKey, String)>);

impl UrlMap {
    pub fn new(entries: Vec<(PlatformKey, String)>) -> Self {
        Self(entries)
    }

    /// URL for `key`, or [`ShimError::UnsupportedPlatform`].
    pub fn get(&self, key: &PlatformKey) -> Result<&str, ShimError> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, url)| url.as_str())
            .ok_or_else(|| ShimError::UnsupportedPlatform {
                key: key.to_string(),
                supported: self.keys(),
            })
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.iter().map(|(k, _)| k.to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PlatformKey, &str)> {
        self.0.iter().map(|(k, url)| (k, url.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Builds release URLs from a version string.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactResolver {
    release_url: String,
    platforms: SupportedPlatforms,
}

impl Default for ArtifactResolver {
    fn default() -> Self {
        Self::new(DEFAULT_RELEASE_URL, SupportedPlatforms::default())
    }
}

impl ArtifactResolver {
    pub fn new(release_url: &str, platforms: SupportedPlatforms) -> Self {
        Self {
            release_url: release_url.trim_end_matches('/').to_string(),
            platforms,
        }
    }

    pub fn platforms(&self) -> &SupportedPlatforms {
        &self.platforms
    }

    /// `<release url>/v<version>/cloud-mta_<version>_`
    pub fn base_url(&self, version: &str) -> String {
        format!(
            "{}/v{}/{}_{}_",
            self.release_url, version, ARTIFACT_PREFIX, version
        )
    }

    #[tracing::instrument(skip(self))]
    pub fn urls(&self, version: &str) -> UrlMap {
        let base = self.base_url(version);
        UrlMap::new(
            self.platforms
                .entries()
                .iter()
                .map(|entry| (entry.key.clone(), format!("{}{}", base, entry.suffix)))
                .collect(),
        )
    }
}
