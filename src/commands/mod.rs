use anyhow::Result;
use log::debug;

use crate::{dispatch::DispatchPayload, runtime::Runtime};

pub mod cache;
pub mod config;
mod exec;
mod paths;
mod update_check;

pub use config::{Config, Settings};
pub use exec::{COMMAND_PACKAGES, exec, package_for};
pub use paths::{DEFAULT_HOME_DIR, dependencies_dir, resolve_home, store_dir};
pub use update_check::{SELF_PACKAGE, check_for_update};

/// Version of this build.
pub const VERSION: &str = env!("SCAFF_VERSION");

/// Run a package-backed command and return the child's exit code.
#[tracing::instrument(skip(runtime, settings, payload))]
pub async fn run<R: Runtime>(
    runtime: R,
    settings: &Settings,
    payload: DispatchPayload,
) -> Result<i32> {
    let config = Config::new(runtime, settings)?;
    debug!("Using home directory {:?}", config.home);

    if config.update_check {
        check_for_update(&config.registry, SELF_PACKAGE, VERSION).await;
    }

    exec(&config, &payload).await
}

/// List cached packages on stdout.
#[tracing::instrument(skip(runtime, settings))]
pub fn cache_list<R: Runtime>(runtime: R, settings: &Settings) -> Result<()> {
    let home = resolve_home(&runtime, settings.home.as_deref())?;
    cache::list(&runtime, &store_dir(&home), &mut std::io::stdout().lock())
}

/// Prune the cache, reporting on stdout.
#[tracing::instrument(skip(runtime, settings))]
pub fn cache_prune<R: Runtime>(runtime: R, settings: &Settings, dry_run: bool) -> Result<()> {
    let home = resolve_home(&runtime, settings.home.as_deref())?;
    cache::prune(&runtime, &store_dir(&home), dry_run, &mut std::io::stdout().lock())
}
