//! Release archive extraction.
//!
//! Both formats unpack into a staging directory next to the destination and
//! then move the entries into place. When an archive wraps everything in a
//! single top-level directory, that directory's contents are moved instead.

mod tar_gz;
mod zip;

use crate::runtime::Runtime;
use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use std::path::{Component, Path, PathBuf};

pub use tar_gz::TarGzExtractor;
pub use zip::ZipExtractor;

/// Trait for format-specific archive extractors
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor: Send + Sync {
    /// Check if this extractor can handle the given archive name
    fn can_handle(&self, archive_name: &str) -> bool;

    /// Extract the archive into `extract_to`, which must exist
    fn extract<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<()>;
}

/// Dispatcher that selects the extractor from the archive name.
#[derive(Default)]
pub struct ArchiveExtractorImpl {
    tar_gz: TarGzExtractor,
    zip: ZipExtractor,
}

impl ArchiveExtractorImpl {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArchiveExtractor for ArchiveExtractorImpl {
    fn can_handle(&self, archive_name: &str) -> bool {
        self.tar_gz.can_handle(archive_name) || self.zip.can_handle(archive_name)
    }

    #[tracing::instrument(skip(self, runtime))]
    fn extract<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<()> {
        let name = archive_path.to_string_lossy();
        if self.tar_gz.can_handle(&name) {
            return self.tar_gz.extract(runtime, archive_path, extract_to);
        }
        if self.zip.can_handle(&name) {
            return self.zip.extract(runtime, archive_path, extract_to);
        }
        Err(anyhow!(
            "Unsupported archive format: {}",
            archive_path.display()
        ))
    }
}

/// Staging directory used while extracting into `extract_to`.
pub(crate) fn staging_dir(extract_to: &Path) -> Result<PathBuf> {
    let name = extract_to
        .file_name()
        .ok_or_else(|| anyhow!("Invalid extraction target {:?}", extract_to))?;
    Ok(extract_to.with_file_name(format!("{}.staging", name.to_string_lossy())))
}

/// Join an archive entry path onto `root`, rejecting absolute paths and `..`.
pub(crate) fn safe_join(root: &Path, entry: &Path) -> Option<PathBuf> {
    let mut joined = root.to_path_buf();
    for component in entry.components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (joined != root).then_some(joined)
}

/// Recreate an empty staging directory.
fn prepare_staging<R: Runtime>(runtime: &R, staging: &Path) -> Result<()> {
    if runtime.exists(staging) {
        runtime.remove_dir_all(staging)?;
    }
    runtime.create_dir_all(staging)
}

/// Unpack into a fresh staging directory with `unpack`, then move the staged
/// entries into `extract_to`. The staging directory is removed on failure.
pub(crate) fn extract_staged<R, F>(runtime: &R, extract_to: &Path, unpack: F) -> Result<()>
where
    R: Runtime,
    F: FnOnce(&Path) -> Result<()>,
{
    let staging = staging_dir(extract_to)?;
    prepare_staging(runtime, &staging)?;

    let result = unpack(&staging).and_then(|()| finish_staging(runtime, &staging, extract_to));
    if let Err(e) = result {
        if runtime.exists(&staging)
            && let Err(cleanup) = runtime.remove_dir_all(&staging)
        {
            debug!("Failed to clean up {:?}: {}", staging, cleanup);
        }
        return Err(e);
    }
    Ok(())
}

/// Move the staged entries into `extract_to` and remove the staging directory.
fn finish_staging<R: Runtime>(
    runtime: &R,
    staging: &Path,
    extract_to: &Path,
) -> Result<()> {
    let entries = runtime
        .read_dir(staging)
        .context("Failed to read staging directory")?;

    let source_dir = match entries.as_slice() {
        [] => bail!("Archive appears to be empty."),
        [single] if runtime.is_dir(single) => single.clone(),
        _ => staging.to_path_buf(),
    };

    debug!("Moving contents from {:?} to {:?}", source_dir, extract_to);
    for item in runtime.read_dir(&source_dir)? {
        let file_name = item
            .file_name()
            .ok_or_else(|| anyhow!("Invalid staged entry {:?}", item))?;
        let dest_path = extract_to.join(file_name);
        if runtime.exists(&dest_path) {
            if runtime.is_dir(&dest_path) {
                runtime.remove_dir_all(&dest_path)?;
            } else {
                runtime.remove_file(&dest_path)?;
            }
        }
        runtime.rename(&item, &dest_path)?;
    }

    runtime.remove_dir_all(staging)
}

#[cfg(test)]
pub(crate) mod test_archives {
    use anyhow::Result;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;

    /// Write a .tar.gz with `(path, content, mode)` entries.
    pub fn write_tar_gz(path: &Path, files: &[(&str, &str, u32)]) -> Result<()> {
        let file = File::create(path)?;
        let enc = GzEncoder::new(file, Compression::default());
        let mut tar = tar::Builder::new(enc);

        for (name, content, mode) in files {
            let mut header = tar::Header::new_gnu();
            header.set_path(name)?;
            header.set_size(content.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            tar.append(&header, content.as_bytes())?;
        }

        tar.into_inner()?.finish()?;
        Ok(())
    }

    /// Write a .zip with `(path, content)` entries.
    pub fn write_zip(path: &Path, files: &[(&str, &str)]) -> Result<()> {
        use ::zip::CompressionMethod;
        use ::zip::ZipWriter;
        use ::zip::write::FileOptions;

        let file = File::create(path)?;
        let mut zip = ZipWriter::new(file);
        let options: FileOptions<()> =
            FileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, content) in files {
            zip.start_file(*name, options)?;
            zip.write_all(content.as_bytes())?;
        }

        zip.finish()?;
        Ok(())
    }
}
