//! Inspection and cleanup of a package store.
//!
//! Store layout: `<store>/_<sanitized>@<version>@<name>`. Scoped names
//! (`@scope/pkg`) nest one level deeper, so the package root of
//! `@scope/pkg@1.0.0` is `<store>/_@scope_pkg@1.0.0@@scope/pkg`.

use anyhow::Result;
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

use super::cache::{STAGING_PREFIX, sanitize_name};
use super::entry::MANIFEST_FILE;
use super::version::VersionResolver;

/// One cached package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPackage {
    pub name: String,
    pub version: String,
    /// Package root (contains the manifest).
    pub path: PathBuf,
    /// Top-level store directory holding this version.
    pub entry_dir: PathBuf,
}

/// Something `prune` would remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PruneTarget {
    /// A version older than the newest cached one.
    Superseded(CachedPackage),
    /// An interrupted install.
    Staging(PathBuf),
    /// A version directory without a manifest.
    Broken(PathBuf),
}

impl PruneTarget {
    pub fn path(&self) -> &Path {
        match self {
            PruneTarget::Superseded(pkg) => &pkg.entry_dir,
            PruneTarget::Staging(path) | PruneTarget::Broken(path) => path,
        }
    }
}

pub struct PackageStore<'a, R: Runtime> {
    runtime: &'a R,
    store_dir: PathBuf,
}

impl<'a, R: Runtime> PackageStore<'a, R> {
    pub fn new(runtime: &'a R, store_dir: PathBuf) -> Self {
        Self { runtime, store_dir }
    }

    /// Every well-formed cached version, sorted by name then version.
    #[tracing::instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<CachedPackage>> {
        let (mut packages, _) = self.scan()?;
        packages.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| compare_versions(&a.version, &b.version))
        });
        Ok(packages)
    }

    /// What `prune` would remove, without touching anything.
    #[tracing::instrument(skip(self))]
    pub fn plan_prune(&self) -> Result<Vec<PruneTarget>> {
        let (packages, mut targets) = self.scan()?;

        let mut by_name: BTreeMap<String, Vec<CachedPackage>> = BTreeMap::new();
        for pkg in packages {
            by_name.entry(pkg.name.clone()).or_default().push(pkg);
        }

        for (name, versions) in by_name {
            let names: Vec<&str> = versions.iter().map(|p| p.version.as_str()).collect();
            let Some(newest) = VersionResolver::resolve_latest(&names) else {
                debug!("No comparable versions cached for {}; keeping all", name);
                continue;
            };
            debug!("Keeping {}@{}", name, newest);
            targets.extend(
                versions
                    .into_iter()
                    .filter(|p| p.version != newest)
                    .map(PruneTarget::Superseded),
            );
        }

        Ok(targets)
    }

    /// Remove superseded versions and leftovers of failed installs.
    pub fn prune(&self) -> Result<Vec<PruneTarget>> {
        let targets = self.plan_prune()?;
        for target in &targets {
            let path = target.path();
            info!("Removing {:?}", path);
            if self.runtime.is_dir(path) {
                self.runtime.remove_dir_all(path)?;
            } else if self.runtime.exists(path) {
                self.runtime.remove_file(path)?;
            }
        }
        Ok(targets)
    }

    fn scan(&self) -> Result<(Vec<CachedPackage>, Vec<PruneTarget>)> {
        let mut packages = Vec::new();
        let mut leftovers = Vec::new();

        if !self.runtime.exists(&self.store_dir) {
            debug!("Store {:?} does not exist", self.store_dir);
            return Ok((packages, leftovers));
        }

        for entry_dir in self.runtime.read_dir(&self.store_dir)? {
            let Some(file_name) = entry_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if file_name.starts_with(STAGING_PREFIX) {
                leftovers.push(PruneTarget::Staging(entry_dir.clone()));
                continue;
            }

            let Some((sanitized, version, head)) = parse_entry_name(file_name) else {
                continue;
            };
            if !self.runtime.is_dir(&entry_dir) {
                continue;
            }

            // Scoped packages keep their root one level down
            let roots = if head.starts_with('@') {
                self.runtime
                    .read_dir(&entry_dir)?
                    .into_iter()
                    .filter(|p| self.runtime.is_dir(p))
                    .filter_map(|p| {
                        let leaf = p.file_name()?.to_str()?.to_string();
                        Some((format!("{}/{}", head, leaf), p))
                    })
                    .collect::<Vec<_>>()
            } else {
                vec![(head.to_string(), entry_dir.clone())]
            };

            let Some((name, path)) = roots
                .into_iter()
                .find(|(name, _)| sanitize_name(name) == sanitized)
            else {
                leftovers.push(PruneTarget::Broken(entry_dir.clone()));
                continue;
            };

            if !self.runtime.is_file(&path.join(MANIFEST_FILE)) {
                leftovers.push(PruneTarget::Broken(entry_dir.clone()));
                continue;
            }

            packages.push(CachedPackage {
                name,
                version: version.to_string(),
                path,
                entry_dir,
            });
        }

        Ok((packages, leftovers))
    }
}

/// Split `_<sanitized>@<version>@<head>` into its parts.
///
/// `head` is the full name, or the scope for scoped packages.
fn parse_entry_name(file_name: &str) -> Option<(&str, &str, &str)> {
    let rest = file_name.strip_prefix('_')?;
    // A leading '@' belongs to the scope, not to a separator
    let skip = usize::from(rest.starts_with('@'));
    let sep = rest[skip..].find('@')? + skip;
    let (sanitized, rest) = (&rest[..sep], &rest[sep + 1..]);
    let (version, head) = rest.split_once('@')?;

    if sanitized.is_empty() || version.is_empty() || head.is_empty() {
        return None;
    }
    Some((sanitized, version, head))
}

fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    match (VersionResolver::parse(a), VersionResolver::parse(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}
