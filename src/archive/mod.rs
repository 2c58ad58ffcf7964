//! Archive extraction used by program profiles during the unpack step.

mod tar_gz;
mod zip;

use crate::error::Error;
use crate::runtime::Runtime;
use anyhow::{Context, Result, anyhow};
use log::debug;
use std::path::{Path, PathBuf};

pub use tar_gz::TarGzExtractor;
pub use zip::ZipExtractor;

/// Trait for format-specific archive extractors
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor: Send + Sync {
    /// Check if this extractor can handle the given archive format
    fn can_handle(&self, archive_path: &Path) -> bool;

    /// Extract the archive into `extract_to`, overwriting entries that already exist.
    ///
    /// An archive whose only top-level entry is a directory has that directory
    /// stripped, so `tool-1.0/bin/tool` lands at `extract_to/bin/tool`.
    fn extract(&self, runtime: &dyn Runtime, archive_path: &Path, extract_to: &Path)
    -> Result<()>;
}

/// Dispatcher that selects the appropriate extractor based on archive format.
pub struct ArchiveExtractorImpl {
    tar_gz: TarGzExtractor,
    zip: ZipExtractor,
}

impl Default for ArchiveExtractorImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveExtractorImpl {
    pub fn new() -> Self {
        Self {
            tar_gz: TarGzExtractor,
            zip: ZipExtractor,
        }
    }
}

impl ArchiveExtractor for ArchiveExtractorImpl {
    fn can_handle(&self, archive_path: &Path) -> bool {
        self.tar_gz.can_handle(archive_path) || self.zip.can_handle(archive_path)
    }

    #[tracing::instrument(skip(self, runtime, archive_path, extract_to))]
    fn extract(
        &self,
        runtime: &dyn Runtime,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<()> {
        let result = if self.tar_gz.can_handle(archive_path) {
            self.tar_gz.extract(runtime, archive_path, extract_to)
        } else if self.zip.can_handle(archive_path) {
            self.zip.extract(runtime, archive_path, extract_to)
        } else {
            Err(anyhow!(
                "Unsupported archive format: {}",
                archive_path.display()
            ))
        };
        result.with_context(|| {
            Error::Extraction(format!("cannot extract {}", archive_path.display()))
        })
    }
}

/// Sibling directory used as the first extraction target.
fn staging_dir_for(extract_to: &Path) -> PathBuf {
    let name = extract_to
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_string());
    extract_to.with_file_name(format!("{}_temp_extract", name))
}

/// Recreate an empty staging directory next to `extract_to`.
fn prepare_staging(runtime: &dyn Runtime, extract_to: &Path) -> Result<PathBuf> {
    let staging = staging_dir_for(extract_to);
    if runtime.exists(&staging) {
        runtime.remove_dir_all(&staging)?;
    }
    runtime.create_dir_all(&staging)?;
    debug!("Unpacking to temp dir: {:?}", staging);
    Ok(staging)
}

/// Move the unpacked contents of `staging` into `extract_to` and drop `staging`.
fn promote(runtime: &dyn Runtime, staging: &Path, extract_to: &Path) -> Result<()> {
    let entries = runtime
        .read_dir(staging)
        .context("Failed to read temp extraction directory")?;

    let Some(first) = entries.first() else {
        runtime.remove_dir_all(staging)?;
        return Err(anyhow!("Archive appears to be empty."));
    };

    let source_dir = if entries.len() == 1 && runtime.is_dir(first) {
        first.clone()
    } else {
        staging.to_path_buf()
    };

    runtime.create_dir_all(extract_to)?;
    debug!("Moving contents from {:?} to {:?}", source_dir, extract_to);
    for item in runtime.read_dir(&source_dir)? {
        let Some(file_name) = item.file_name() else {
            continue;
        };
        let dest_path = extract_to.join(file_name);
        if runtime.is_dir(&dest_path) {
            runtime.remove_dir_all(&dest_path)?;
        } else if runtime.exists(&dest_path) {
            runtime.remove_file(&dest_path)?;
        }
        runtime.rename(&item, &dest_path)?;
    }

    runtime.remove_dir_all(staging)?;
    Ok(())
}
