use crate::http::HttpClient;
use crate::runtime::Runtime;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use std::path::Path;
use std::sync::Arc;

/// Fetches release archives and checks that they exist.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `url` to `dest`, returning the number of bytes written.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64>;

    /// Check that `url` can be fetched without downloading it.
    async fn probe(&self, url: &str) -> Result<()>;
}

/// Downloads over HTTP, creating files through the runtime.
pub struct HttpDownloader<R: Runtime> {
    runtime: Arc<R>,
    http_client: HttpClient,
}

impl<R: Runtime> HttpDownloader<R> {
    pub fn new(runtime: Arc<R>, http_client: HttpClient) -> Self {
        Self {
            runtime,
            http_client,
        }
    }

    pub fn http_client(&self) -> &HttpClient {
        &self.http_client
    }
}

#[async_trait]
impl<R: Runtime + 'static> Downloader for HttpDownloader<R> {
    #[tracing::instrument(skip(self, dest))]
    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        info!("Downloading {}...", url);

        let bytes = self
            .http_client
            .download_file(url, || {
                self.runtime
                    .create_file(dest)
                    .with_context(|| format!("Failed to create download file at {:?}", dest))
            })
            .await?;

        info!("Download complete.");
        Ok(bytes)
    }

    async fn probe(&self, url: &str) -> Result<()> {
        self.http_client.probe(url).await
    }
}
