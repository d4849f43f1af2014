use anyhow::Result;
use log::{debug, info};

use crate::{
    archive::Extractor,
    dispatch::{DispatchPayload, Dispatcher, NpmDependencyInstaller},
    error::Error,
    package::{LATEST, Package, PackageDescriptor},
    registry::Registry,
    runtime::Runtime,
};

use super::config::Config;
use super::paths::{dependencies_dir, store_dir};

/// Subcommand name to the package that implements it.
pub const COMMAND_PACKAGES: &[(&str, &str)] = &[("init", "@imooc-cli/init")];

pub fn package_for(command: &str) -> Result<&'static str> {
    COMMAND_PACKAGES
        .iter()
        .find(|(name, _)| *name == command)
        .map(|(_, package)| *package)
        .ok_or_else(|| {
            Error::Configuration(format!("no package handles command '{}'", command)).into()
        })
}

/// Make sure the package behind `payload.command` is present, then run it.
///
/// Returns the child's exit code.
#[tracing::instrument(skip(config, payload), fields(command = %payload.command))]
pub async fn exec<R: Runtime, G: Registry, E: Extractor + Clone>(
    config: &Config<R, G, E>,
    payload: &DispatchPayload,
) -> Result<i32> {
    let package_name = package_for(&payload.command)?;
    debug!("Command {} is handled by {}", payload.command, package_name);

    let descriptor = match &config.target_path {
        Some(target) => {
            info!("Using local package at {:?}", target);
            PackageDescriptor::new(package_name, LATEST, target.clone(), None)?
        }
        None => PackageDescriptor::new(
            package_name,
            LATEST,
            dependencies_dir(&config.home),
            Some(store_dir(&config.home)),
        )?,
    };

    let installer = NpmDependencyInstaller::default();
    let mut package = Package::new(
        &config.runtime,
        &config.registry,
        config.extractor.clone(),
        descriptor,
    );
    if config.install_deps {
        package = package.with_post_install(&installer);
    }

    if package.descriptor().is_cached() {
        if package.exists().await? {
            package.update().await?;
        } else {
            package.install().await?;
        }
    }

    let entry = match package.entry_path() {
        Some(entry) => entry,
        None => {
            let root = package.install_path().unwrap_or_default();
            return Err(Error::EntryNotFound(root).into());
        }
    };
    debug!("Entry point: {:?}", entry);

    Dispatcher::new(&config.runtime, config.interpreter.clone())
        .dispatch(Some(&entry), payload)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::TarGzExtractor;
    use crate::archive::tests::tgz;
    use crate::dispatch::Interpreter;
    use crate::package::cache_path;
    use crate::registry::MockRegistry;
    use crate::runtime::RealRuntime;
    use std::path::Path;
    use tempfile::tempdir;

    fn config_for(
        home: &Path,
        registry: MockRegistry,
        target_path: Option<std::path::PathBuf>,
        interpreter: Interpreter,
    ) -> Config<RealRuntime, MockRegistry, TarGzExtractor> {
        Config {
            runtime: RealRuntime,
            registry,
            extractor: TarGzExtractor,
            home: home.to_path_buf(),
            target_path,
            interpreter,
            install_deps: false,
            update_check: false,
        }
    }

    /// Exits with the number stored in the entry file.
    #[cfg(unix)]
    fn exit_with_entry_contents() -> Interpreter {
        Interpreter::new("sh", vec!["-c".to_string(), r#"exit "$(cat "$0")""#.to_string()])
    }

    #[test]
    fn test_package_for() {
        assert_eq!(package_for("init").unwrap(), "@imooc-cli/init");
        let err = package_for("publish").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Configuration(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_installs_then_dispatches() {
        let home = tempdir().unwrap();

        // --- Setup ---
        let mut registry = MockRegistry::new();
        registry
            .expect_list_versions()
            .returning(|_| Ok(vec!["1.0.0".to_string(), "1.1.2".to_string()]));
        let bytes = tgz(&[
            (
                "package/package.json",
                r#"{"name": "@imooc-cli/init", "main": "lib/index.js"}"#,
                0o644,
            ),
            ("package/lib/index.js", "3", 0o644),
        ]);
        registry
            .expect_fetch_tarball()
            .times(1)
            .returning(move |_, _| Ok(bytes.clone()));
        let config = config_for(home.path(), registry, None, exit_with_entry_contents());

        // --- Execute ---
        let code = exec(&config, &DispatchPayload::new("init").arg("my-app"))
            .await
            .unwrap();

        // --- Verify ---
        assert_eq!(code, 3);
        let installed = cache_path(&store_dir(home.path()), "@imooc-cli/init", "1.1.2");
        assert!(installed.join("lib").join("index.js").is_file());

        // Second run finds the cached version and only checks for updates
        let code = exec(&config, &DispatchPayload::new("init")).await.unwrap();
        assert_eq!(code, 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_with_target_path_skips_registry() {
        let home = tempdir().unwrap();
        let local = tempdir().unwrap();
        std::fs::write(local.path().join("package.json"), r#"{"main": "index.js"}"#).unwrap();
        std::fs::write(local.path().join("index.js"), "2").unwrap();

        // No expectations: any registry call panics
        let config = config_for(
            home.path(),
            MockRegistry::new(),
            Some(local.path().to_path_buf()),
            exit_with_entry_contents(),
        );

        let code = exec(&config, &DispatchPayload::new("init")).await.unwrap();
        assert_eq!(code, 2);
        assert!(!store_dir(home.path()).exists());
    }

    #[tokio::test]
    async fn test_exec_target_path_without_main() {
        let home = tempdir().unwrap();
        let local = tempdir().unwrap();
        std::fs::write(local.path().join("package.json"), r#"{"name": "no-entry"}"#).unwrap();

        let config = config_for(
            home.path(),
            MockRegistry::new(),
            Some(local.path().to_path_buf()),
            Interpreter::new("/nonexistent/scaff-runner", vec![]),
        );

        let err = exec(&config, &DispatchPayload::new("init")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::EntryNotFound(p)) if p == local.path()
        ));
    }

    #[tokio::test]
    async fn test_exec_registry_failure_is_reported() {
        let home = tempdir().unwrap();
        let mut registry = MockRegistry::new();
        registry.expect_list_versions().returning(|name| {
            Err(Error::RegistryUnavailable {
                package: name.to_string(),
                reason: "connection refused".into(),
            }
            .into())
        });

        let config = config_for(
            home.path(),
            registry,
            None,
            Interpreter::new("/nonexistent/scaff-runner", vec![]),
        );

        let err = exec(&config, &DispatchPayload::new("init")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::RegistryUnavailable { .. })
        ));
    }
}
