//! npm-compatible registry client.

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info};

use crate::error::Error;
use crate::http::HttpClient;

use super::Registry;

/// Public npm registry.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

/// Mirror for users behind slow links to the public registry.
pub const MIRROR_REGISTRY: &str = "https://registry.npmmirror.com";

/// Registry document types (internal).
mod api {
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Deserialize, Debug, Default)]
    pub struct Packument {
        #[serde(default)]
        pub versions: BTreeMap<String, VersionDoc>,
    }

    #[derive(Deserialize, Debug, Default)]
    pub struct VersionDoc {
        #[serde(default)]
        pub dist: Option<Dist>,
    }

    #[derive(Deserialize, Debug)]
    pub struct Dist {
        pub tarball: String,
    }
}

pub struct NpmRegistry {
    http_client: HttpClient,
    base_url: String,
}

impl NpmRegistry {
    pub fn new(http_client: HttpClient, base_url: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Document URL for a package; the scope separator is percent-encoded.
    pub fn package_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name.replace('/', "%2F"))
    }

    async fn fetch_packument(&self, name: &str) -> Result<api::Packument> {
        let url = self.package_url(name);
        debug!("Fetching package document from {}...", url);
        self.http_client
            .get_json::<api::Packument>(&url)
            .await
            .map_err(|e| {
                Error::RegistryUnavailable {
                    package: name.to_string(),
                    reason: format!("{:#}", e),
                }
                .into()
            })
    }
}

#[async_trait]
impl Registry for NpmRegistry {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    #[tracing::instrument(skip(self))]
    async fn list_versions(&self, name: &str) -> Result<Vec<String>> {
        let packument = self.fetch_packument(name).await?;
        Ok(packument.versions.into_keys().collect())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_tarball(&self, name: &str, version: &str) -> Result<Vec<u8>> {
        let packument = self.fetch_packument(name).await?;

        let tarball_url = packument
            .versions
            .get(version)
            .and_then(|doc| doc.dist.as_ref())
            .map(|dist| dist.tarball.clone())
            .ok_or_else(|| Error::Resolution {
                package: name.to_string(),
                requested: version.to_string(),
            })?;

        info!("Downloading {}@{}...", name, version);
        self.http_client
            .download(&tarball_url)
            .await
            .map_err(|e| Error::install(name, version, &e).into())
    }
}
