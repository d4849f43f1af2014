//! Package management module
//!
//! This module covers everything between a package name and a runnable
//! file on disk: version resolution, the versioned cache, entry point
//! lookup, and store maintenance.

mod cache;
mod entry;
mod store;
mod version;

pub use cache::{
    Package, PackageDescriptor, PostInstall, STAGING_PREFIX, cache_dir_name, cache_path,
    sanitize_name,
};
pub use entry::{EntryResolver, MANIFEST_FILE, Manifest};
pub use store::{CachedPackage, PackageStore, PruneTarget};
pub use version::{LATEST, VersionConstraint, VersionResolver};

#[cfg(test)]
pub use cache::MockPostInstall;
