use anyhow::Result;
use log::debug;
use reqwest::{
    Client,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{
    archive::ArchiveExtractorImpl,
    download::HttpDownloader,
    http::{HttpClient, RetryPolicy},
    manifest::Manifest,
    platform::HostPlatformDetector,
    resolver::{ArtifactResolver, DEFAULT_RELEASE_URL, SupportedPlatforms},
    runtime::Runtime,
    wrapper::{BinWrapper, DEFAULT_BINARY, WrapperConfig},
};

/// Wrapper wired to the real network, archive formats and host detection.
pub type HostWrapper<R> = BinWrapper<R, HttpDownloader<R>, ArchiveExtractorImpl, HostPlatformDetector>;

/// Settings shared by every subcommand.
pub struct Config<R: Runtime> {
    pub runtime: Arc<R>,
    pub manifest_path: PathBuf,
    pub resolver: ArtifactResolver,
    pub http_client: HttpClient,
}

impl<R: Runtime + 'static> Config<R> {
    pub fn new(
        runtime: R,
        manifest_path: PathBuf,
        release_url: Option<String>,
        platforms: SupportedPlatforms,
    ) -> Result<Self> {
        Self::with_retry_policy(
            runtime,
            manifest_path,
            release_url,
            platforms,
            RetryPolicy::default(),
        )
    }

    pub fn with_retry_policy(
        runtime: R,
        manifest_path: PathBuf,
        release_url: Option<String>,
        platforms: SupportedPlatforms,
        policy: RetryPolicy,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Ok(token) = runtime.env_var("GITHUB_TOKEN")
            && !token.is_empty()
        {
            let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token))?;
            auth_value.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth_value);
            debug!("Using GITHUB_TOKEN for authentication: {}", mask_token(&token));
        }

        let client = Client::builder()
            .user_agent(concat!("mta-shim/", env!("MTA_SHIM_VERSION")))
            .default_headers(headers)
            .build()?;

        let release_url = release_url.unwrap_or_else(|| DEFAULT_RELEASE_URL.to_string());

        Ok(Self {
            runtime: Arc::new(runtime),
            manifest_path,
            resolver: ArtifactResolver::new(&release_url, platforms),
            http_client: HttpClient::with_policy(client, policy),
        })
    }

    /// Directory the manifest lives in; binaries are unpacked below it by default.
    pub fn package_dir(&self) -> PathBuf {
        match self.manifest_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Build the wrapper for the version declared in the manifest.
    pub fn wrapper(&self, base_dir: Option<&Path>) -> Result<HostWrapper<R>> {
        let manifest = Manifest::load(self.runtime.as_ref(), &self.manifest_path)?;
        let version = manifest.require_version()?;

        let config = WrapperConfig {
            base_dir: base_dir
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.package_dir()),
            binaries: vec![DEFAULT_BINARY.to_string()],
            urls: self.resolver.urls(version),
        };

        Ok(BinWrapper::new(
            Arc::clone(&self.runtime),
            HttpDownloader::new(Arc::clone(&self.runtime), self.http_client.clone()),
            ArchiveExtractorImpl::new(),
            HostPlatformDetector,
            config,
        ))
    }
}

/// Show only the first and last few characters of a token.
fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}
