//! Installs and runs the wrapped binaries for the host platform.
//!
//! Archives are unpacked into `<base_dir>/unpacked_bin`. The local package
//! has no install hook, so [`BinWrapper::run`] installs on first use.

use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::archive::ArchiveExtractor;
use crate::download::Downloader;
use crate::error::ShimError;
use crate::platform::{PlatformDetector, PlatformKey};
use crate::resolver::UrlMap;
use crate::runtime::Runtime;

/// Directory under the base directory that holds the unpacked binaries.
pub const UNPACKED_BIN_DIR: &str = "unpacked_bin";

/// The binary exposed by the package.
pub const DEFAULT_BINARY: &str = "mta";

#[derive(Debug, Clone)]
pub struct WrapperConfig {
    pub base_dir: PathBuf,
    pub binaries: Vec<String>,
    pub urls: UrlMap,
}

/// Outcome of probing one release URL.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlStatus {
    pub key: String,
    pub url: String,
    pub error: Option<String>,
}

impl UrlStatus {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

pub struct BinWrapper<R, D, E, P>
where
    R: Runtime + 'static,
    D: Downloader,
    E: ArchiveExtractor,
    P: PlatformDetector,
{
    runtime: Arc<R>,
    downloader: D,
    extractor: E,
    detector: P,
    config: WrapperConfig,
}

impl<R, D, E, P> BinWrapper<R, D, E, P>
where
    R: Runtime + 'static,
    D: Downloader,
    E: ArchiveExtractor,
    P: PlatformDetector,
{
    pub fn new(runtime: Arc<R>, downloader: D, extractor: E, detector: P, config: WrapperConfig) -> Self {
        Self {
            runtime,
            downloader,
            extractor,
            detector,
            config,
        }
    }

    pub fn config(&self) -> &WrapperConfig {
        &self.config
    }

    pub fn unpacked_dir(&self) -> PathBuf {
        self.config.base_dir.join(UNPACKED_BIN_DIR)
    }

    /// Where `name` lives once installed for the host platform.
    pub fn binary_path(&self, name: &str) -> PathBuf {
        let platform = self.detector.detect();
        self.unpacked_dir().join(platform.executable_name(name))
    }

    pub fn is_installed(&self) -> bool {
        self.config
            .binaries
            .iter()
            .all(|name| self.runtime.exists(&self.binary_path(name)))
    }

    /// Download and unpack the archive for the host platform, then verify
    /// that every configured binary is present. Returns the unpacked directory.
    #[tracing::instrument(skip(self))]
    pub async fn install(&self) -> Result<PathBuf> {
        let platform = self.detector.detect();
        let url = self.config.urls.get(&platform)?;
        debug!("Resolved {} to {}", platform, url);

        let archive_name = url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| anyhow!("Cannot derive an archive name from {}", url))?;
        if !self.extractor.can_handle(archive_name) {
            return Err(anyhow!("Unsupported archive format: {}", archive_name));
        }

        let runtime = self.runtime.as_ref();
        runtime.create_dir_all(&self.config.base_dir)?;
        let archive_path = self.config.base_dir.join(archive_name);

        let downloaded = self.downloader.download(url, &archive_path).await;
        let result = match downloaded {
            Ok(_) => self.unpack(&platform, &archive_path),
            Err(e) => Err(e.context(format!("Failed to download {}", url))),
        };

        if runtime.exists(&archive_path)
            && let Err(e) = runtime.remove_file(&archive_path)
        {
            debug!("Failed to remove {:?}: {}", archive_path, e);
        }

        let unpacked = result?;
        info!("Installed {} for {}", self.config.binaries.join(", "), platform);
        Ok(unpacked)
    }

    fn unpack(&self, platform: &PlatformKey, archive_path: &Path) -> Result<PathBuf> {
        let runtime = self.runtime.as_ref();
        let unpacked = self.unpacked_dir();

        let result = (|| -> Result<()> {
            if runtime.exists(&unpacked) {
                runtime.remove_dir_all(&unpacked)?;
            }
            runtime.create_dir_all(&unpacked)?;
            self.extractor.extract(runtime, archive_path, &unpacked)?;

            for name in &self.config.binaries {
                let path = unpacked.join(platform.executable_name(name));
                if !runtime.exists(&path) {
                    return Err(ShimError::BinaryNotFound {
                        name: name.clone(),
                        path: path.display().to_string(),
                    }
                    .into());
                }
                if !looks_native(runtime, &path, platform) {
                    warn!("{:?} does not look like a native executable for {}", path, platform);
                }
                runtime.set_permissions(&path, 0o755)?;
            }
            Ok(())
        })();

        match result {
            Ok(()) => Ok(unpacked),
            Err(e) => {
                if runtime.exists(&unpacked)
                    && let Err(cleanup) = runtime.remove_dir_all(&unpacked)
                {
                    debug!("Failed to clean up {:?}: {}", unpacked, cleanup);
                }
                Err(e)
            }
        }
    }

    /// Run `name` with `args`, installing first when it is missing.
    /// Returns the child's exit code.
    #[tracing::instrument(skip(self, args))]
    pub async fn run(&self, name: &str, args: &[String]) -> Result<i32> {
        if !self.config.binaries.iter().any(|b| b == name) {
            return Err(anyhow!(
                "Unknown binary \"{}\", expected one of: {}",
                name,
                self.config.binaries.join(", ")
            ));
        }

        let path = self.binary_path(name);
        if !self.runtime.exists(&path) {
            info!("{} is not installed yet, downloading it first", name);
            self.install().await?;
        }

        debug!("Spawning {:?} with {:?}", path, args);
        self.runtime
            .spawn(&path, args)
            .with_context(|| format!("Failed to run {}", name))
    }

    /// Probe every configured URL.
    #[tracing::instrument(skip(self))]
    pub async fn check(&self) -> Vec<UrlStatus> {
        let mut statuses = Vec::with_capacity(self.config.urls.len());
        for (key, url) in self.config.urls.iter() {
            let error = self.downloader.probe(url).await.err().map(|e| e.to_string());
            match &error {
                None => debug!("{} is reachable", url),
                Some(e) => warn!("{} is not reachable: {}", url, e),
            }
            statuses.push(UrlStatus {
                key: key.to_string(),
                url: url.to_string(),
                error,
            });
        }
        statuses
    }
}

/// Whether `path` parses as an executable format native to `platform`.
fn looks_native<R: Runtime>(runtime: &R, path: &Path, platform: &PlatformKey) -> bool {
    let mut buffer = Vec::new();
    if runtime
        .open(path)
        .and_then(|mut f| f.read_to_end(&mut buffer).map_err(Into::into))
        .is_err()
    {
        return false;
    }

    match (goblin::Object::parse(&buffer), platform.os.as_str()) {
        (Ok(goblin::Object::Elf(_)), "linux") => true,
        (Ok(goblin::Object::Mach(_)), "darwin") => true,
        (Ok(goblin::Object::PE(_)), "win32") => true,
        _ => false,
    }
}
