//! Versioned package cache entries.
//!
//! A [`Package`] ties one requested package to a location on disk. With a
//! store directory every resolved version gets its own directory,
//! `<store>/_<sanitized name>@<version>@<name>`, so several versions can sit
//! side by side. Without one the package lives directly at its target path.
//!
//! Installs are staged next to their destination and renamed into place only
//! once complete, so an interrupted or failed install never produces a
//! directory that [`Package::exists`] would accept.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::archive::Extractor;
use crate::cleanup::CleanupGuard;
use crate::error::Error;
use crate::registry::{Registry, latest_version};
use crate::runtime::Runtime;

use super::entry::EntryResolver;
use super::version::{LATEST, VersionResolver};

/// Prefix of in-progress install directories.
pub const STAGING_PREFIX: &str = ".staging-";

/// Package name made safe for a single path component.
pub fn sanitize_name(name: &str) -> String {
    name.replace('/', "_")
}

/// Directory name (relative to the store) for `name@version`.
pub fn cache_dir_name(name: &str, version: &str) -> String {
    format!("_{}@{}@{}", sanitize_name(name), version, name)
}

/// Cache location of `name@version` under `store_dir`.
pub fn cache_path(store_dir: &Path, name: &str, version: &str) -> PathBuf {
    store_dir.join(cache_dir_name(name, version))
}

/// Step run inside a freshly extracted package before it is published,
/// e.g. installing its own dependencies.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostInstall: Send + Sync {
    async fn run(&self, package_dir: &Path) -> Result<()>;
}

/// What to fetch and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    name: String,
    version: String,
    target_path: PathBuf,
    store_dir: Option<PathBuf>,
}

impl PackageDescriptor {
    pub fn new(
        name: &str,
        version: &str,
        target_path: PathBuf,
        store_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Configuration("package name must not be empty".into()).into());
        }
        let version = version.trim();
        if version.is_empty() {
            return Err(Error::Configuration(format!(
                "no version requested for package {}",
                name
            ))
            .into());
        }
        if target_path.as_os_str().is_empty() {
            return Err(Error::Configuration(format!(
                "no target path for package {}",
                name
            ))
            .into());
        }

        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
            target_path,
            store_dir,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requested version; a concrete one once resolved.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn store_dir(&self) -> Option<&Path> {
        self.store_dir.as_deref()
    }

    pub fn is_cached(&self) -> bool {
        self.store_dir.is_some()
    }

    pub fn is_resolved(&self) -> bool {
        !VersionResolver::is_latest(&self.version)
    }
}

pub struct Package<'a, R: Runtime, G: Registry, E: Extractor> {
    runtime: &'a R,
    registry: &'a G,
    extractor: E,
    descriptor: PackageDescriptor,
    post_install: Option<&'a dyn PostInstall>,
}

impl<'a, R: Runtime, G: Registry, E: Extractor> Package<'a, R, G, E> {
    pub fn new(
        runtime: &'a R,
        registry: &'a G,
        extractor: E,
        descriptor: PackageDescriptor,
    ) -> Self {
        Self {
            runtime,
            registry,
            extractor,
            descriptor,
            post_install: None,
        }
    }

    pub fn with_post_install(mut self, step: &'a dyn PostInstall) -> Self {
        self.post_install = Some(step);
        self
    }

    pub fn descriptor(&self) -> &PackageDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Concrete version, if one has been resolved.
    pub fn resolved_version(&self) -> Option<&str> {
        self.descriptor
            .is_resolved()
            .then(|| self.descriptor.version())
    }

    /// Cache directory of the resolved version (caching enabled only).
    pub fn cache_path(&self) -> Option<PathBuf> {
        let store_dir = self.descriptor.store_dir()?;
        let version = self.resolved_version()?;
        Some(cache_path(store_dir, self.name(), version))
    }

    /// Directory the package contents live in, once known.
    pub fn install_path(&self) -> Option<PathBuf> {
        if self.descriptor.is_cached() {
            self.cache_path()
        } else {
            Some(self.descriptor.target_path().to_path_buf())
        }
    }

    /// Create the store and resolve `latest` to a concrete version.
    #[tracing::instrument(skip(self), fields(package = %self.descriptor.name))]
    pub async fn prepare(&mut self) -> Result<()> {
        if let Some(store_dir) = self.descriptor.store_dir()
            && !self.runtime.exists(store_dir)
        {
            debug!("Creating store directory {:?}", store_dir);
            self.runtime.create_dir_all(store_dir)?;
        }

        if !self.descriptor.is_resolved() {
            let version = latest_version(self.registry, self.name()).await?;
            debug!("Resolved {}@{} to {}", self.name(), LATEST, version);
            self.descriptor.version = version;
        }
        Ok(())
    }

    /// Whether the package is present on disk.
    ///
    /// With caching enabled this resolves `latest` first (a registry call)
    /// since the version decides which directory is checked. Without caching
    /// only the target path is inspected.
    #[tracing::instrument(skip(self), fields(package = %self.descriptor.name))]
    pub async fn exists(&mut self) -> Result<bool> {
        if self.descriptor.is_cached() {
            self.prepare().await?;
        }
        let path = self.install_path().context("Package version is unresolved")?;
        let exists = self.runtime.exists(&path);
        debug!("{:?} exists: {}", path, exists);
        Ok(exists)
    }

    /// Fetch the package into its cache path (or target path).
    ///
    /// Only call when [`Package::exists`] returned false.
    #[tracing::instrument(skip(self), fields(package = %self.descriptor.name))]
    pub async fn install(&mut self) -> Result<PathBuf> {
        self.prepare().await?;
        let dest = self.install_path().context("Package version is unresolved")?;
        let version = self.descriptor.version().to_string();
        self.install_into(&version, &dest).await?;
        Ok(dest)
    }

    /// Install the newest published version alongside existing ones.
    ///
    /// Returns true if a new version was installed. Never overwrites an
    /// existing version directory; with nothing new published this is a no-op.
    #[tracing::instrument(skip(self), fields(package = %self.descriptor.name))]
    pub async fn update(&mut self) -> Result<bool> {
        let Some(store_dir) = self.descriptor.store_dir().map(Path::to_path_buf) else {
            debug!("Caching disabled for {}; nothing to update", self.name());
            return Ok(false);
        };

        self.prepare().await?;
        let latest = latest_version(self.registry, self.name()).await?;
        let latest_path = cache_path(&store_dir, self.name(), &latest);

        if self.runtime.exists(&latest_path) {
            debug!("{}@{} is already cached", self.name(), latest);
            return Ok(false);
        }

        info!(
            "Updating {} from {} to {}...",
            self.name(),
            self.descriptor.version(),
            latest
        );
        self.install_into(&latest, &latest_path).await?;
        self.descriptor.version = latest;
        Ok(true)
    }

    /// Entry point of the installed package.
    pub fn entry_path(&self) -> Option<PathBuf> {
        let root = self.install_path()?;
        EntryResolver::new(self.runtime).resolve(&root)
    }

    async fn install_into(&self, version: &str, dest: &Path) -> Result<()> {
        let name = self.name();
        info!("Installing {}@{} into {:?}...", name, version, dest);

        let parent = dest
            .parent()
            .with_context(|| format!("Install path {:?} has no parent directory", dest))?;
        self.runtime
            .create_dir_all(parent)
            .map_err(|e| install_error(name, version, e))?;

        let stem = format!(
            "{}{}@{}-{}",
            STAGING_PREFIX,
            sanitize_name(name),
            version,
            std::process::id()
        );
        let staging = parent.join(&stem);
        let tarball = parent.join(format!("{}.tgz", stem));

        let mut guard = CleanupGuard::new(self.runtime);
        guard.add(staging.clone());
        guard.add(tarball.clone());

        self.stage(name, version, &staging, &tarball)
            .await
            .map_err(|e| install_error(name, version, e))?;

        // Another invocation may have published the same version meanwhile
        if self.runtime.exists(dest) {
            info!("{}@{} was installed concurrently; keeping it", name, version);
            return Ok(());
        }

        if let Err(e) = self.runtime.rename(&staging, dest) {
            if self.runtime.exists(dest) {
                info!("{}@{} was installed concurrently; keeping it", name, version);
                return Ok(());
            }
            return Err(install_error(name, version, e));
        }
        guard.remove(&staging);

        info!("Installed {}@{}", name, version);
        Ok(())
    }

    async fn stage(&self, name: &str, version: &str, staging: &Path, tarball: &Path) -> Result<()> {
        if self.runtime.exists(staging) {
            self.runtime.remove_dir_all(staging)?;
        }
        self.runtime.create_dir_all(staging)?;

        let bytes = self.registry.fetch_tarball(name, version).await?;
        debug!("Fetched {} bytes for {}@{}", bytes.len(), name, version);
        {
            let mut file = self.runtime.create_file(tarball)?;
            file.write_all(&bytes)
                .and_then(|()| file.flush())
                .with_context(|| format!("Failed to write {:?}", tarball))?;
        }

        self.extractor
            .extract(self.runtime, tarball, staging)
            .with_context(|| format!("Failed to unpack {}@{}", name, version))?;

        if let Some(step) = self.post_install {
            step.run(staging).await?;
        }
        Ok(())
    }
}

/// Keep typed errors as they are; wrap anything else as an install failure.
fn install_error(name: &str, version: &str, e: anyhow::Error) -> anyhow::Error {
    if e.downcast_ref::<Error>().is_some() {
        e
    } else {
        Error::install(name, version, &e).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::TarGzExtractor;
    use crate::archive::tests::tgz;
    use crate::registry::MockRegistry;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    fn sample_tarball() -> Vec<u8> {
        tgz(&[
            (
                "package/package.json",
                r#"{"name": "sample-template", "main": "lib/index.js"}"#,
                0o644,
            ),
            ("package/lib/index.js", "module.exports = () => {}", 0o644),
        ])
    }

    /// Registry serving `versions` and answering every tarball request
    /// with the sample tarball.
    fn registry_with(
        versions: Arc<Mutex<Vec<String>>>,
        fetches: Arc<Mutex<Vec<String>>>,
    ) -> MockRegistry {
        let mut registry = MockRegistry::new();
        registry
            .expect_list_versions()
            .returning(move |_| Ok(versions.lock().unwrap().clone()));
        let bytes = sample_tarball();
        registry
            .expect_fetch_tarball()
            .returning(move |_, version| {
                fetches.lock().unwrap().push(version.to_string());
                Ok(bytes.clone())
            });
        registry
    }

    fn shared(versions: &[&str]) -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(versions.iter().map(|v| v.to_string()).collect()))
    }

    fn cached_descriptor(root: &Path, name: &str, version: &str) -> PackageDescriptor {
        PackageDescriptor::new(
            name,
            version,
            root.join("dependencies"),
            Some(root.join("dependencies").join("node_modules")),
        )
        .unwrap()
    }

    #[test]
    fn test_cache_dir_name() {
        assert_eq!(
            cache_dir_name("sample-template", "1.2.0"),
            "_sample-template@1.2.0@sample-template"
        );
        assert_eq!(
            cache_dir_name("@imooc-cli/init", "1.1.2"),
            "_@imooc-cli_init@1.1.2@@imooc-cli/init"
        );
    }

    #[test]
    fn test_cache_path_is_stable_and_unique() {
        let store = Path::new("/home/user/.scaff/dependencies/node_modules");
        let a = cache_path(store, "sample-template", "1.0.0");
        assert_eq!(a, cache_path(store, "sample-template", "1.0.0"));

        let paths: HashSet<PathBuf> = ["1.0.0", "1.0.1", "1.1.0", "2.0.0-rc.1", "10.0.0"]
            .iter()
            .map(|v| cache_path(store, "sample-template", v))
            .collect();
        assert_eq!(paths.len(), 5);

        // Names that sanitize alike still differ through the raw name suffix
        assert_ne!(
            cache_path(store, "@a/b", "1.0.0"),
            cache_path(store, "@a_b", "1.0.0")
        );
    }

    #[test]
    fn test_descriptor_validation() {
        let err = PackageDescriptor::new("", "latest", PathBuf::from("/t"), None).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Configuration(_))));

        let err = PackageDescriptor::new("pkg", " ", PathBuf::from("/t"), None).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Configuration(_))));

        let err = PackageDescriptor::new("pkg", "latest", PathBuf::new(), None).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Configuration(_))));

        let desc = PackageDescriptor::new("pkg", "latest", PathBuf::from("/t"), None).unwrap();
        assert!(!desc.is_resolved());
        assert!(!desc.is_cached());
    }

    #[tokio::test]
    async fn test_exists_without_cache_makes_no_network_call() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/work/local-template")))
            .returning(|_| true);
        // No expectations: any registry call panics
        let registry = MockRegistry::new();

        let descriptor = PackageDescriptor::new(
            "sample-template",
            "latest",
            PathBuf::from("/work/local-template"),
            None,
        )
        .unwrap();
        let mut package = Package::new(&runtime, &registry, TarGzExtractor, descriptor);

        assert!(package.exists().await.unwrap());
        assert_eq!(package.resolved_version(), None);
    }

    #[tokio::test]
    async fn test_exists_resolves_latest_before_checking() {
        let dir = tempdir().unwrap();
        let fetches = Arc::new(Mutex::new(Vec::new()));
        let registry = registry_with(shared(&["1.0.0", "1.2.0", "1.1.5"]), fetches);

        let mut package = Package::new(
            &RealRuntime,
            &registry,
            TarGzExtractor,
            cached_descriptor(dir.path(), "sample-template", "latest"),
        );

        assert!(!package.exists().await.unwrap());
        assert_eq!(package.resolved_version(), Some("1.2.0"));
        assert!(dir.path().join("dependencies/node_modules").is_dir());
        assert!(
            package
                .cache_path()
                .unwrap()
                .ends_with("_sample-template@1.2.0@sample-template")
        );
    }

    #[tokio::test]
    async fn test_install_then_exists() {
        let dir = tempdir().unwrap();
        let fetches = Arc::new(Mutex::new(Vec::new()));
        let registry = registry_with(shared(&["1.0.0", "1.2.0", "1.1.5"]), fetches.clone());

        let mut package = Package::new(
            &RealRuntime,
            &registry,
            TarGzExtractor,
            cached_descriptor(dir.path(), "sample-template", "latest"),
        );

        assert!(!package.exists().await.unwrap());
        let installed = package.install().await.unwrap();

        assert_eq!(Some(installed.clone()), package.cache_path());
        assert!(package.exists().await.unwrap());
        assert_eq!(package.cache_path(), Some(installed.clone()));
        assert_eq!(*fetches.lock().unwrap(), vec!["1.2.0"]);
        assert_eq!(package.entry_path(), Some(installed.join("lib").join("index.js")));

        // Staging leftovers are gone
        let store = dir.path().join("dependencies/node_modules");
        let leftovers: Vec<_> = std::fs::read_dir(&store)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(STAGING_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_install_scoped_package() {
        let dir = tempdir().unwrap();
        let registry = registry_with(shared(&["1.1.2"]), Arc::new(Mutex::new(Vec::new())));

        let mut package = Package::new(
            &RealRuntime,
            &registry,
            TarGzExtractor,
            cached_descriptor(dir.path(), "@imooc-cli/init", "latest"),
        );
        let installed = package.install().await.unwrap();

        assert!(installed.ends_with("_@imooc-cli_init@1.1.2@@imooc-cli/init"));
        assert!(installed.join("package.json").is_file());
    }

    #[tokio::test]
    async fn test_install_explicit_version_skips_version_lookup() {
        let dir = tempdir().unwrap();
        let mut registry = MockRegistry::new();
        let bytes = sample_tarball();
        registry
            .expect_fetch_tarball()
            .with(eq("sample-template"), eq("1.0.0"))
            .times(1)
            .returning(move |_, _| Ok(bytes.clone()));

        let mut package = Package::new(
            &RealRuntime,
            &registry,
            TarGzExtractor,
            cached_descriptor(dir.path(), "sample-template", "1.0.0"),
        );
        let installed = package.install().await.unwrap();
        assert!(installed.ends_with("_sample-template@1.0.0@sample-template"));
    }

    #[tokio::test]
    async fn test_failed_download_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let mut registry = MockRegistry::new();
        registry
            .expect_list_versions()
            .returning(|_| Ok(vec!["1.0.0".to_string()]));
        registry
            .expect_fetch_tarball()
            .returning(|_, _| Err(anyhow::anyhow!("connection reset by peer")));

        let mut package = Package::new(
            &RealRuntime,
            &registry,
            TarGzExtractor,
            cached_descriptor(dir.path(), "sample-template", "latest"),
        );

        let err = package.install().await.unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Install { .. })));
        assert!(!package.exists().await.unwrap());

        let store = dir.path().join("dependencies/node_modules");
        assert_eq!(std::fs::read_dir(&store).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_tarball_is_written_through_runtime() {
        let store = PathBuf::from("/home/user/.scaff/dependencies/node_modules");
        let tarball = store.join(format!(
            "{}sample-template@1.0.0-{}.tgz",
            STAGING_PREFIX,
            std::process::id()
        ));

        let mut runtime = MockRuntime::new();
        let existing = store.clone();
        runtime.expect_exists().returning(move |p| p == existing);
        runtime.expect_create_dir_all().returning(|_| Ok(()));
        runtime
            .expect_create_file()
            .with(eq(tarball))
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("No space left on device")));

        let mut registry = MockRegistry::new();
        registry
            .expect_fetch_tarball()
            .times(1)
            .returning(|_, _| Ok(sample_tarball()));

        let descriptor = PackageDescriptor::new(
            "sample-template",
            "1.0.0",
            PathBuf::from("/home/user/.scaff/dependencies"),
            Some(store),
        )
        .unwrap();
        let mut package = Package::new(&runtime, &registry, TarGzExtractor, descriptor);

        let err = package.install().await.unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Install { .. })));
    }

    #[tokio::test]
    async fn test_corrupt_tarball_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let mut registry = MockRegistry::new();
        registry
            .expect_list_versions()
            .returning(|_| Ok(vec!["1.0.0".to_string()]));
        registry
            .expect_fetch_tarball()
            .returning(|_, _| Ok(b"not a tarball".to_vec()));

        let mut package = Package::new(
            &RealRuntime,
            &registry,
            TarGzExtractor,
            cached_descriptor(dir.path(), "sample-template", "latest"),
        );

        let err = package.install().await.unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Install { .. })));
        assert!(!package.cache_path().unwrap().exists());
        let store = dir.path().join("dependencies/node_modules");
        assert_eq!(std::fs::read_dir(&store).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failed_post_install_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let registry = registry_with(shared(&["1.0.0"]), Arc::new(Mutex::new(Vec::new())));
        let mut step = MockPostInstall::new();
        step.expect_run()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("npm install exited with 1")));

        let mut package = Package::new(
            &RealRuntime,
            &registry,
            TarGzExtractor,
            cached_descriptor(dir.path(), "sample-template", "latest"),
        )
        .with_post_install(&step);

        assert!(package.install().await.is_err());
        assert!(!package.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_post_install_runs_in_staging_dir() {
        let dir = tempdir().unwrap();
        let registry = registry_with(shared(&["1.0.0"]), Arc::new(Mutex::new(Vec::new())));
        let mut step = MockPostInstall::new();
        step.expect_run()
            .withf(|dir: &Path| {
                dir.file_name()
                    .map(|n| n.to_string_lossy().starts_with(STAGING_PREFIX))
                    .unwrap_or(false)
                    && dir.join("package.json").is_file()
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut package = Package::new(
            &RealRuntime,
            &registry,
            TarGzExtractor,
            cached_descriptor(dir.path(), "sample-template", "latest"),
        )
        .with_post_install(&step);

        let installed = package.install().await.unwrap();
        assert!(installed.join("package.json").is_file());
    }

    #[tokio::test]
    async fn test_install_resolution_failure_on_empty_registry() {
        let dir = tempdir().unwrap();
        let mut registry = MockRegistry::new();
        registry.expect_list_versions().returning(|_| Ok(vec![]));

        let mut package = Package::new(
            &RealRuntime,
            &registry,
            TarGzExtractor,
            cached_descriptor(dir.path(), "sample-template", "latest"),
        );

        let err = package.install().await.unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Resolution { .. })));
    }

    #[tokio::test]
    async fn test_install_without_cache_uses_target_path() {
        let dir = tempdir().unwrap();
        let registry = registry_with(shared(&["2.0.0"]), Arc::new(Mutex::new(Vec::new())));
        let target = dir.path().join("local").join("template");

        let descriptor =
            PackageDescriptor::new("sample-template", "latest", target.clone(), None).unwrap();
        let mut package = Package::new(&RealRuntime, &registry, TarGzExtractor, descriptor);

        assert!(!package.exists().await.unwrap());
        let installed = package.install().await.unwrap();

        assert_eq!(installed, target);
        assert!(package.exists().await.unwrap());
        assert_eq!(package.entry_path(), Some(target.join("lib").join("index.js")));
    }

    #[tokio::test]
    async fn test_update_installs_new_version_side_by_side() {
        let dir = tempdir().unwrap();
        let versions = shared(&["1.0.0"]);
        let fetches = Arc::new(Mutex::new(Vec::new()));
        let registry = registry_with(versions.clone(), fetches.clone());

        let mut package = Package::new(
            &RealRuntime,
            &registry,
            TarGzExtractor,
            cached_descriptor(dir.path(), "sample-template", "latest"),
        );
        let old_path = package.install().await.unwrap();

        versions.lock().unwrap().push("1.1.0".to_string());
        assert!(package.update().await.unwrap());

        assert_eq!(package.resolved_version(), Some("1.1.0"));
        let new_path = package.cache_path().unwrap();
        assert_ne!(old_path, new_path);
        assert!(old_path.is_dir());
        assert!(new_path.is_dir());
        assert_eq!(*fetches.lock().unwrap(), vec!["1.0.0", "1.1.0"]);
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let dir = tempdir().unwrap();
        let fetches = Arc::new(Mutex::new(Vec::new()));
        let registry = registry_with(shared(&["1.0.0", "1.2.0"]), fetches.clone());

        let mut package = Package::new(
            &RealRuntime,
            &registry,
            TarGzExtractor,
            cached_descriptor(dir.path(), "sample-template", "latest"),
        );
        package.install().await.unwrap();

        assert!(!package.update().await.unwrap());
        let first = package.resolved_version().map(String::from);
        assert!(!package.update().await.unwrap());

        assert_eq!(package.resolved_version().map(String::from), first);
        assert_eq!(*fetches.lock().unwrap(), vec!["1.2.0"]);
        let store = dir.path().join("dependencies/node_modules");
        assert_eq!(std::fs::read_dir(&store).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_update_without_cache_is_noop() {
        let runtime = MockRuntime::new();
        let registry = MockRegistry::new();
        let descriptor =
            PackageDescriptor::new("sample-template", "latest", PathBuf::from("/work/t"), None)
                .unwrap();
        let mut package = Package::new(&runtime, &registry, TarGzExtractor, descriptor);

        assert!(!package.update().await.unwrap());
    }

    #[tokio::test]
    async fn test_install_when_published_concurrently() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("dependencies/node_modules");
        let dest = cache_path(&store, "sample-template", "1.0.0");

        let mut registry = MockRegistry::new();
        registry
            .expect_list_versions()
            .returning(|_| Ok(vec!["1.0.0".to_string()]));
        let bytes = sample_tarball();
        let racing_dest = dest.clone();
        registry.expect_fetch_tarball().returning(move |_, _| {
            // Another process finishes first
            std::fs::create_dir_all(racing_dest.join("lib")).unwrap();
            std::fs::write(racing_dest.join("package.json"), r#"{"main": "lib/index.js"}"#)
                .unwrap();
            Ok(bytes.clone())
        });

        let mut package = Package::new(
            &RealRuntime,
            &registry,
            TarGzExtractor,
            cached_descriptor(dir.path(), "sample-template", "latest"),
        );

        let installed = package.install().await.unwrap();
        assert_eq!(installed, dest);
        assert!(dest.join("package.json").is_file());
        // Our staged copy was discarded
        assert_eq!(std::fs::read_dir(&store).unwrap().count(), 1);
    }
}
