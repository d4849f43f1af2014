use anyhow::Result;
use log::{debug, warn};
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;

use crate::{
    archive::{Extractor, TarGzExtractor},
    dispatch::{DEFAULT_RUNNER, Interpreter},
    error::Error,
    http::{DEFAULT_REQUEST_TIMEOUT, HttpClient, RetryPolicy},
    registry::{DEFAULT_REGISTRY, MIRROR_REGISTRY, NpmRegistry, Registry},
    runtime::Runtime,
};

use super::paths::{resolve_home, resolve_target_path};

/// Options gathered from the command line and environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub home: Option<PathBuf>,
    pub target_path: Option<PathBuf>,
    pub registry: Option<String>,
    pub mirror: bool,
    pub runner: String,
    pub install_deps: bool,
    pub update_check: bool,
    pub timeout: Duration,
    pub retries: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            home: None,
            target_path: None,
            registry: None,
            mirror: false,
            runner: DEFAULT_RUNNER.to_string(),
            install_deps: false,
            update_check: true,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            retries: 0,
        }
    }
}

impl Settings {
    /// Registry base URL: explicit value, then mirror preset, then default.
    pub fn registry_url(&self) -> &str {
        match &self.registry {
            Some(url) if !url.trim().is_empty() => url.trim(),
            _ if self.mirror => MIRROR_REGISTRY,
            _ => DEFAULT_REGISTRY,
        }
    }
}

pub struct Config<R: Runtime, G: Registry, E: Extractor> {
    pub runtime: R,
    pub registry: G,
    pub extractor: E,
    pub home: PathBuf,
    pub target_path: Option<PathBuf>,
    pub interpreter: Interpreter,
    pub install_deps: bool,
    pub update_check: bool,
}

impl<R: Runtime> Config<R, NpmRegistry, TarGzExtractor> {
    pub fn new(runtime: R, settings: &Settings) -> Result<Self> {
        if runtime.is_privileged() {
            warn!("Running with administrator privileges; cached files will be owned by that account");
        }

        let home = resolve_home(&runtime, settings.home.as_deref())?;
        let target_path = settings
            .target_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| resolve_target_path(&runtime, p))
            .transpose()?;

        let registry_url = settings.registry_url();
        Url::parse(registry_url).map_err(|e| {
            Error::Configuration(format!("invalid registry URL '{}': {}", registry_url, e))
        })?;
        debug!("Using registry {}", registry_url);

        let http_client = HttpClient::with_timeout(settings.timeout)?
            .retry_policy(RetryPolicy::with_retries(settings.retries));
        let registry = NpmRegistry::new(http_client, registry_url);

        Ok(Self {
            runtime,
            registry,
            extractor: TarGzExtractor,
            home,
            target_path,
            interpreter: Interpreter::node(&settings.runner),
            install_deps: settings.install_deps,
            update_check: settings.update_check,
        })
    }
}
