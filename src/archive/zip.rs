use crate::runtime::Runtime;
use anyhow::{Context, Result};
use log::{debug, info};
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

use super::{ArchiveExtractor, extract_staged, safe_join};

/// Extractor for .zip archives
#[derive(Default)]
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn can_handle(&self, archive_name: &str) -> bool {
        archive_name.to_lowercase().ends_with(".zip")
    }

    fn extract<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<()> {
        debug!("Extracting zip archive to {:?}...", extract_to);

        // ZipArchive needs Read + Seek; Runtime::open only gives Read
        let mut buffer = Vec::new();
        runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?
            .read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read archive {:?}", archive_path))?;

        let mut archive = ZipArchive::new(std::io::Cursor::new(buffer))
            .context("Failed to parse ZIP archive")?;

        extract_staged(runtime, extract_to, |staging| {
            for i in 0..archive.len() {
                let mut entry = archive
                    .by_index(i)
                    .with_context(|| format!("Failed to read ZIP entry {}", i))?;

                let Some(full_path) = entry
                    .enclosed_name()
                    .and_then(|name| safe_join(staging, &name))
                else {
                    debug!("Skipping entry with invalid path {:?}", entry.name());
                    continue;
                };

                if entry.is_dir() {
                    runtime.create_dir_all(&full_path)?;
                    continue;
                }

                if let Some(parent) = full_path.parent() {
                    runtime.create_dir_all(parent)?;
                }
                let mut dest_file = runtime.create_file(&full_path)?;
                std::io::copy(&mut entry, &mut dest_file)
                    .with_context(|| format!("Failed to extract file {:?}", full_path))?;
                drop(dest_file);

                #[cfg(unix)]
                if let Some(mode) = entry.unix_mode()
                    && let Err(e) = runtime.set_permissions(&full_path, mode & 0o777)
                {
                    debug!("Failed to set permissions on {:?}: {}", full_path, e);
                }
            }
            Ok(())
        })?;

        info!("Extraction complete.");
        Ok(())
    }
}
