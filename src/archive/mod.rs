//! Package archive extraction.
//!
//! Registries ship package contents as gzip'd tarballs whose entries are
//! wrapped in a single top-level directory (`package/` on npm). Extraction
//! strips that wrapper so the package root lands directly in the target.

use anyhow::{Context, Result, anyhow};
use flate2::read::GzDecoder;
use log::debug;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};

use crate::runtime::Runtime;

/// Trait for archive extractors
pub trait Extractor: Send + Sync {
    /// Check if this extractor can handle the given archive
    fn can_handle(&self, archive_path: &Path) -> bool;

    /// Extract the archive into `extract_to`, which must already exist.
    /// Returns the number of files written.
    fn extract<R: Runtime>(&self, runtime: &R, archive_path: &Path, extract_to: &Path)
    -> Result<usize>;
}

/// Extractor for .tgz / .tar.gz archives
#[derive(Clone, Copy, Debug, Default)]
pub struct TarGzExtractor;

impl Extractor for TarGzExtractor {
    fn can_handle(&self, archive_path: &Path) -> bool {
        let name = archive_path.to_string_lossy().to_lowercase();
        name.ends_with(".tgz") || name.ends_with(".tar.gz")
    }

    #[tracing::instrument(skip(self, runtime))]
    fn extract<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<usize> {
        if !self.can_handle(archive_path) {
            return Err(anyhow!(
                "Unsupported archive format: {}",
                archive_path.display()
            ));
        }

        debug!("Extracting {:?} to {:?}...", archive_path, extract_to);
        let file = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;
        let mut archive = Archive::new(GzDecoder::new(file));

        let mut files = 0;
        for entry in archive.entries().context("Failed to read archive entries")? {
            let mut entry = entry.context("Failed to read archive entry")?;
            let raw_path = entry.path().context("Invalid entry path")?.into_owned();

            let Some(relative) = strip_wrapper(&raw_path) else {
                continue;
            };
            let full_path = extract_to.join(&relative);

            match entry.header().entry_type() {
                EntryType::Directory => {
                    if is_top_level(&raw_path) {
                        continue;
                    }
                    runtime.create_dir_all(&full_path)?;
                }
                EntryType::Regular | EntryType::Continuous => {
                    if let Some(parent) = full_path.parent() {
                        runtime.create_dir_all(parent)?;
                    }
                    let mut dest_file = runtime.create_file(&full_path)?;
                    std::io::copy(&mut entry, &mut dest_file)
                        .with_context(|| format!("Failed to extract file {:?}", full_path))?;
                    drop(dest_file);

                    #[cfg(unix)]
                    if let Ok(mode) = entry.header().mode()
                        && let Err(e) = runtime.set_permissions(&full_path, mode & 0o777)
                    {
                        debug!("Failed to set permissions on {:?}: {}", full_path, e);
                    }
                    files += 1;
                }
                other => {
                    debug!("Skipping {:?} entry {:?}", other, raw_path);
                }
            }
        }

        if files == 0 {
            return Err(anyhow!("Archive appears to be empty."));
        }

        debug!("Extracted {} file(s)", files);
        Ok(files)
    }
}

/// Map an archive entry path to its location relative to the package root.
///
/// Drops the wrapper directory, and rejects entries that would escape the
/// extraction root.
fn strip_wrapper(path: &Path) -> Option<PathBuf> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            _ => {
                debug!("Skipping entry with unsafe path {:?}", path);
                return None;
            }
        }
    }

    match parts.len() {
        0 => None,
        // A bare top-level name is either the wrapper itself or a loose file
        1 => Some(PathBuf::from(parts[0])),
        _ => Some(parts[1..].iter().collect()),
    }
}

/// True for the wrapper directory entry itself (`package/`).
fn is_top_level(path: &Path) -> bool {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
        == 1
}
