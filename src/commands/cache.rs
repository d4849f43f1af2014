use anyhow::Result;
use log::debug;
use std::io::Write;
use std::path::Path;

use crate::{
    package::{PackageStore, PruneTarget},
    runtime::{Runtime, path::display_relative},
};

/// Print every cached package version, one per line.
#[tracing::instrument(skip(runtime, out))]
pub fn list<R: Runtime, W: Write>(runtime: &R, store_dir: &Path, out: &mut W) -> Result<()> {
    let store = PackageStore::new(runtime, store_dir.to_path_buf());
    let packages = store.list()?;

    if packages.is_empty() {
        writeln!(out, "No packages cached.")?;
        return Ok(());
    }

    debug!("Found {} cached version(s)", packages.len());
    for pkg in packages {
        writeln!(
            out,
            "{} {} {}",
            pkg.name,
            pkg.version,
            display_relative(&pkg.path, store_dir)
        )?;
    }
    Ok(())
}

/// Remove superseded versions and install leftovers.
#[tracing::instrument(skip(runtime, out))]
pub fn prune<R: Runtime, W: Write>(
    runtime: &R,
    store_dir: &Path,
    dry_run: bool,
    out: &mut W,
) -> Result<()> {
    let store = PackageStore::new(runtime, store_dir.to_path_buf());
    let targets = if dry_run {
        store.plan_prune()?
    } else {
        store.prune()?
    };

    if targets.is_empty() {
        writeln!(out, "Nothing to prune.")?;
        return Ok(());
    }

    let verb = if dry_run { "Would remove" } else { "Removed" };
    for target in &targets {
        let what = match target {
            PruneTarget::Superseded(pkg) => format!("{}@{}", pkg.name, pkg.version),
            PruneTarget::Staging(path) => {
                format!("unfinished install {}", display_relative(path, store_dir))
            }
            PruneTarget::Broken(path) => {
                format!("incomplete entry {}", display_relative(path, store_dir))
            }
        };
        writeln!(out, "{} {}", verb, what)?;
    }
    Ok(())
}
