//! HTTP client with bounded timeouts, opt-in retries and error classification.

use anyhow::{Context, Result};
use log::{debug, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::retry::{NonRetryableError, RetryPolicy, check_retryable};

/// Timeout for metadata requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for a whole tarball transfer.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryPolicy,
}

impl HttpClient {
    /// Wraps a reqwest Client; its own timeout bounds metadata requests.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
        }
    }

    /// Builds a client with the given metadata timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("scaff/", env!("SCAFF_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::new(client))
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Performs a GET request and deserializes the JSON response.
    #[tracing::instrument(skip(self))]
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET JSON from {}...", url);

        self.with_retry("GET JSON", || async {
            let response = self
                .client
                .get(url)
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await
                .context("Failed to send request")?;

            let response = response.error_for_status().map_err(check_retryable)?;

            response
                .json::<T>()
                .await
                .context("Failed to parse JSON response")
        })
        .await
    }

    /// Downloads a response body, bounded by [`DOWNLOAD_TIMEOUT`].
    ///
    /// Every attempt starts from an empty buffer, so a retried transfer never
    /// carries bytes over from a failed one.
    #[tracing::instrument(skip(self))]
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Downloading file from {}...", url);
        self.with_retry("Download", || self.download_once(url)).await
    }

    async fn download_once(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .context("Failed to start download request")?;

        let mut response = response.error_for_status().map_err(check_retryable)?;

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .context("Failed to read chunk from download stream")?
        {
            body.extend_from_slice(&chunk);
        }

        debug!("Downloaded {} bytes", body.len());
        Ok(body)
    }

    /// Executes an async operation under the configured retry policy.
    async fn with_retry<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !is_retryable_error(&e) || attempt >= max_attempts {
                        debug!("{}: giving up after attempt {}: {}", operation_name, attempt, e);
                        return Err(e);
                    }
                    warn!(
                        "{}: attempt {}/{} failed ({}), retrying in {:?}...",
                        operation_name, attempt, max_attempts, e, self.retry.delay
                    );
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn is_retryable_error(e: &anyhow::Error) -> bool {
    e.downcast_ref::<NonRetryableError>().is_none()
}
