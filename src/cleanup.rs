use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// RAII guard that removes every path still registered when it is dropped.
///
/// Installs stage into a temporary directory; if anything fails between
/// creating it and publishing it, dropping the guard removes it so no
/// half-populated directory is ever left behind.
pub struct CleanupGuard<'a, R: Runtime> {
    runtime: &'a R,
    paths: Vec<PathBuf>,
}

impl<'a, R: Runtime> CleanupGuard<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        Self {
            runtime,
            paths: Vec::new(),
        }
    }

    /// Register a path to be removed on failure
    pub fn add(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    /// Stop tracking a path (e.g. after it has been renamed away)
    pub fn remove(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }

    fn cleanup(&self) {
        for path in &self.paths {
            if !self.runtime.exists(path) {
                continue;
            }
            debug!("Cleaning up: {:?}", path);
            let result = if self.runtime.is_dir(path) {
                self.runtime.remove_dir_all(path)
            } else {
                self.runtime.remove_file(path)
            };
            if let Err(e) = result {
                warn!("Failed to clean up {:?}: {:#}", path, e);
            }
        }
    }
}

impl<R: Runtime> Drop for CleanupGuard<'_, R> {
    fn drop(&mut self) {
        self.cleanup();
    }
}
