use crate::runtime::Runtime;
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use log::{debug, info};
use std::path::Path;
use tar::{Archive, EntryType};

use super::{ArchiveExtractor, extract_staged, safe_join};

/// Extractor for .tar.gz and .tgz archives
#[derive(Default)]
pub struct TarGzExtractor;

impl ArchiveExtractor for TarGzExtractor {
    fn can_handle(&self, archive_name: &str) -> bool {
        let name = archive_name.to_lowercase();
        name.ends_with(".tar.gz") || name.ends_with(".tgz")
    }

    fn extract<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<()> {
        debug!("Extracting tar.gz archive to {:?}...", extract_to);
        let file = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;

        let mut archive = Archive::new(GzDecoder::new(file));
        extract_staged(runtime, extract_to, |staging| {
            let entries = archive
                .entries()
                .with_context(|| format!("Failed to read archive {:?}", archive_path))?;

            for entry in entries {
                let mut entry = entry.context("Failed to read tar entry")?;
                let entry_path = entry.path().context("Invalid tar entry path")?.into_owned();

                let Some(full_path) = safe_join(staging, &entry_path) else {
                    debug!("Skipping entry with unsafe path {:?}", entry_path);
                    continue;
                };

                match entry.header().entry_type() {
                    EntryType::Directory => runtime.create_dir_all(&full_path)?,
                    EntryType::Regular | EntryType::Continuous => {
                        if let Some(parent) = full_path.parent() {
                            runtime.create_dir_all(parent)?;
                        }
                        let mut dest_file = runtime.create_file(&full_path)?;
                        std::io::copy(&mut entry, &mut dest_file)
                            .with_context(|| format!("Failed to extract file {:?}", full_path))?;
                        drop(dest_file);

                        if let Ok(mode) = entry.header().mode()
                            && let Err(e) = runtime.set_permissions(&full_path, mode & 0o777)
                        {
                            debug!("Failed to set permissions on {:?}: {}", full_path, e);
                        }
                    }
                    other => debug!("Skipping {:?} entry {:?}", other, entry_path),
                }
            }
            Ok(())
        })?;

        info!("Extraction complete.");
        Ok(())
    }
}
