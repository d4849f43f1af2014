//! Registry abstraction for published packages.
//!
//! A registry answers two questions: which versions of a package exist, and
//! where the contents of one of them can be downloaded from.

mod npm;

use anyhow::Result;
use async_trait::async_trait;
use crate::error::Error;
use crate::package::{LATEST, VersionResolver};

pub use npm::{DEFAULT_REGISTRY, MIRROR_REGISTRY, NpmRegistry};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Registry: Send + Sync {
    /// Base URL requests are made against.
    fn base_url(&self) -> &str;

    /// Published version strings for `name`.
    ///
    /// A package without versions yields an empty list; an unreachable
    /// registry or a non-success status is an error.
    async fn list_versions(&self, name: &str) -> Result<Vec<String>>;

    /// Packed contents of `name@version`.
    async fn fetch_tarball(&self, name: &str, version: &str) -> Result<Vec<u8>>;
}

/// Highest published version of `name`, or a resolution error.
#[tracing::instrument(skip(registry))]
pub async fn latest_version<G: Registry + ?Sized>(registry: &G, name: &str) -> Result<String> {
    let versions = registry.list_versions(name).await?;
    log::debug!("{} has {} published version(s)", name, versions.len());

    VersionResolver::resolve_latest(&versions).ok_or_else(|| {
        Error::Resolution {
            package: name.to_string(),
            requested: LATEST.to_string(),
        }
        .into()
    })
}
