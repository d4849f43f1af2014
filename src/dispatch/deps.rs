use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::{debug, info};
use std::path::Path;
use tokio::process::Command;

use crate::package::PostInstall;

/// npm's launcher; a batch shim on Windows, which std escapes for `cmd.exe`.
#[cfg(windows)]
const NPM_PROGRAM: &str = "npm.cmd";
#[cfg(not(windows))]
const NPM_PROGRAM: &str = "npm";

/// Installs a package's production dependencies with npm.
#[derive(Debug, Clone)]
pub struct NpmDependencyInstaller {
    program: String,
}

impl NpmDependencyInstaller {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

impl Default for NpmDependencyInstaller {
    fn default() -> Self {
        Self::new(NPM_PROGRAM)
    }
}

#[async_trait]
impl PostInstall for NpmDependencyInstaller {
    #[tracing::instrument(skip(self))]
    async fn run(&self, package_dir: &Path) -> Result<()> {
        info!("Installing dependencies in {:?}...", package_dir);
        let output = Command::new(&self.program)
            .args(["install", "--omit=dev", "--no-audit", "--no-fund"])
            .current_dir(package_dir)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.program))?;

        debug!("{} stdout: {}", self.program, String::from_utf8_lossy(&output.stdout));
        if !output.status.success() {
            return Err(anyhow!(
                "{} install exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }
}
