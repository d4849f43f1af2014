//! Error taxonomy for the package cache and dispatch subsystem.
//!
//! Components return `anyhow::Result`; these typed errors travel inside it and
//! can be recovered with `downcast_ref` where a caller needs to tell them apart.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid descriptor fields or settings.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The registry could not be reached or answered with a non-success status.
    #[error("Registry unavailable for {package}: {reason}")]
    RegistryUnavailable { package: String, reason: String },

    /// No published version satisfies the request.
    #[error("No version of {package} satisfies '{requested}'")]
    Resolution { package: String, requested: String },

    /// Fetching package contents into the cache failed.
    #[error("Failed to install {package}@{version}: {reason}")]
    Install {
        package: String,
        version: String,
        reason: String,
    },

    /// No manifest, or a manifest without a `main` entry.
    #[error("No runnable entry point found in {}", .0.display())]
    EntryNotFound(PathBuf),

    /// The child process could not be created.
    #[error("Failed to spawn '{program}': {reason}")]
    Spawn { program: String, reason: String },
}

impl Error {
    /// Wraps another error's chain as an install failure.
    pub fn install(package: &str, version: &str, source: &anyhow::Error) -> Self {
        Error::Install {
            package: package.to_string(),
            version: version.to_string(),
            reason: format!("{:#}", source),
        }
    }
}
