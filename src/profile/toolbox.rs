use crate::archive::ArchiveExtractor;
use crate::http::HttpClient;
use crate::platform::Platform;
use crate::runtime::Runtime;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared collaborators handed to every profile step.
#[derive(Clone)]
pub struct Toolbox {
    pub runtime: Arc<dyn Runtime>,
    pub http: HttpClient,
    pub extractor: Arc<dyn ArchiveExtractor>,
    pub platform: Platform,
}

impl Toolbox {
    pub fn new(
        runtime: Arc<dyn Runtime>,
        http: HttpClient,
        extractor: Arc<dyn ArchiveExtractor>,
        platform: Platform,
    ) -> Self {
        Self {
            runtime,
            http,
            extractor,
            platform,
        }
    }

    /// Extract `archive` into `dest` with the archive format picked from its name.
    pub fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        self.extractor.extract(self.runtime.as_ref(), archive, dest)
    }

    /// Copy `from` to `to`, creating the parent directory of `to`.
    pub fn copy_into(&self, from: &Path, to: &Path) -> Result<()> {
        if let Some(parent) = to.parent() {
            self.runtime.create_dir_all(parent)?;
        }
        self.runtime
            .copy(from, to)
            .with_context(|| format!("Failed to copy {:?} to {:?}", from, to))?;
        Ok(())
    }

    /// Paths matching a glob pattern, sorted.
    pub fn glob(&self, pattern: &Path) -> Result<Vec<PathBuf>> {
        let pattern = pattern.to_string_lossy();
        let mut found = glob::glob(&pattern)
            .with_context(|| format!("Invalid glob pattern {}", pattern))?
            .collect::<Result<Vec<_>, _>>()?;
        found.sort();
        Ok(found)
    }
}
