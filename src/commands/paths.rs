use anyhow::Result;
use log::debug;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::runtime::Runtime;

/// Home directory name used when none is configured.
pub const DEFAULT_HOME_DIR: &str = ".scaff";

/// Resolve the tool's home directory.
///
/// An absolute override is used as is. A relative one, like the default,
/// is taken relative to the user's home directory.
#[tracing::instrument(skip(runtime))]
pub fn resolve_home<R: Runtime>(runtime: &R, home: Option<&Path>) -> Result<PathBuf> {
    if let Some(home) = home
        && home.is_absolute()
    {
        return Ok(home.to_path_buf());
    }

    let user_home = runtime.home_dir().ok_or_else(|| {
        Error::Configuration("could not determine the user's home directory".into())
    })?;
    let home = user_home.join(home.unwrap_or(Path::new(DEFAULT_HOME_DIR)));
    debug!("Using home directory {:?}", home);
    Ok(home)
}

/// Where cached packages are installed: `{home}/dependencies`.
pub fn dependencies_dir(home: &Path) -> PathBuf {
    home.join("dependencies")
}

/// Versioned store: `{home}/dependencies/node_modules`.
pub fn store_dir(home: &Path) -> PathBuf {
    dependencies_dir(home).join("node_modules")
}

/// Resolve a local package path against the working directory.
pub fn resolve_target_path<R: Runtime>(runtime: &R, target: &Path) -> Result<PathBuf> {
    if target.is_absolute() {
        Ok(target.to_path_buf())
    } else {
        Ok(crate::runtime::normalize_path(&runtime.current_dir()?.join(target)))
    }
}
