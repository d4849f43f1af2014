use log::{debug, warn};

use crate::{package::VersionResolver, registry::Registry};

/// Registry name this tool is published under: its own crate name.
pub const SELF_PACKAGE: &str = env!("CARGO_PKG_NAME");

/// Newer release of this tool within the current major version, if any.
///
/// Advisory only: every failure is logged at debug level and yields `None`.
#[tracing::instrument(skip(registry))]
pub async fn check_for_update<G: Registry + ?Sized>(
    registry: &G,
    package: &str,
    current: &str,
) -> Option<String> {
    let Some(current_version) = VersionResolver::parse(current) else {
        debug!("Skipping update check; '{}' is not a version", current);
        return None;
    };

    let versions = match registry.list_versions(package).await {
        Ok(versions) => versions,
        Err(e) => {
            debug!("Update check failed: {:#}", e);
            return None;
        }
    };

    let newest = VersionResolver::resolve_compatible(current, &versions)?;
    let newer = VersionResolver::parse(&newest).is_some_and(|v| v > current_version);
    if !newer {
        debug!("{} {} is up to date", package, current);
        return None;
    }

    warn!(
        "A newer version of {} is available: {} (current: {}). Reinstall {} to update.",
        package, newest, current, package
    );
    Some(newest)
}
