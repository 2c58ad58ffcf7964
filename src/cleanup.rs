use crate::runtime::Runtime;
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// RAII guard that removes registered paths when dropped.
///
/// Dropping the guard without calling [`CleanupGuard::success`] (an error return or a
/// cancelled future) deletes everything registered with it.
pub struct CleanupGuard {
    runtime: Arc<dyn Runtime>,
    paths: Vec<PathBuf>,
}

impl CleanupGuard {
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        Self {
            runtime,
            paths: Vec::new(),
        }
    }

    /// Add a path to be removed unless the operation succeeds
    pub fn add(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    /// Stop tracking `path`
    pub fn remove(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Mark the operation as successful, keeping every registered path
    pub fn success(mut self) {
        self.paths.clear();
    }

    fn cleanup(&self) {
        for path in self.paths.iter().rev() {
            debug!("Cleaning up: {:?}", path);
            let result = if self.runtime.is_dir(path) {
                self.runtime.remove_dir_all(path)
            } else if self.runtime.exists(path) {
                self.runtime.remove_file(path)
            } else {
                Ok(())
            };
            if let Err(e) = result {
                debug!("Failed to clean up {:?}: {}", path, e);
            }
        }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}
