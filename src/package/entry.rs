//! Entry point resolution for installed packages.

use log::{debug, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::runtime::{Runtime, is_path_under, path::join_portable};

/// Manifest file name at the root of every package.
pub const MANIFEST_FILE: &str = "package.json";

/// The subset of a package manifest this tool reads.
#[derive(Debug, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub main: Option<String>,
}

pub struct EntryResolver<'a, R: Runtime> {
    runtime: &'a R,
}

impl<'a, R: Runtime> EntryResolver<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        Self { runtime }
    }

    /// Nearest directory at or above `start` that contains a manifest.
    pub fn find_package_root(&self, start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|dir| self.runtime.is_file(&dir.join(MANIFEST_FILE)))
            .map(Path::to_path_buf)
    }

    /// Read and parse the manifest in `package_root`.
    pub fn read_manifest(&self, package_root: &Path) -> Option<Manifest> {
        let manifest_path = package_root.join(MANIFEST_FILE);
        let content = match self.runtime.read_to_string(&manifest_path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read {:?}: {:#}", manifest_path, e);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!("Failed to parse {:?}: {}", manifest_path, e);
                None
            }
        }
    }

    /// Absolute path of the file the package declares as `main`.
    ///
    /// `None` when no manifest is found above `start`, it declares no entry,
    /// or the entry points outside the package root.
    #[tracing::instrument(skip(self))]
    pub fn resolve(&self, start: &Path) -> Option<PathBuf> {
        let package_root = self.find_package_root(start)?;
        debug!("Found package root at {:?}", package_root);

        let manifest = self.read_manifest(&package_root)?;
        let main = manifest.main.filter(|m| !m.trim().is_empty())?;

        let entry = join_portable(&package_root, main.trim());
        if !is_path_under(&entry, &package_root) {
            warn!("Ignoring main {:?}: it points outside {:?}", main, package_root);
            return None;
        }
        Some(entry)
    }
}
