// src/source/index.rs

//! Package index client
//!
//! The index is a plain file tree served over HTTP: the entry for package
//! `name` lives at `<index>/pkg/<name>/metadata.json` and names the
//! package's source repository in its `repo` field.

use crate::error::{Error, Result};
use crate::package::{PackageMetadata, PackageName};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts for a request that fails to connect
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// HTTP client for the package index
#[derive(Debug, Clone)]
pub struct IndexClient {
    client: Client,
    base_url: String,
}

impl IndexClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("foampm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Environment(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of a package's index entry
    pub fn metadata_url(&self, name: &PackageName) -> String {
        format!("{}/pkg/{}/metadata.json", self.base_url, name)
    }

    /// Fetch a package's index entry
    pub async fn metadata(&self, name: &PackageName) -> Result<PackageMetadata> {
        let url = self.metadata_url(name);
        let failed = |cause: String| Error::FetchFailed {
            package: name.to_string(),
            cause,
        };

        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            debug!("Fetching {} (attempt {})", url, attempt);

            match self.client.get(&url).send().await {
                Ok(response) => break response,
                Err(e) if attempt >= MAX_RETRIES => {
                    return Err(failed(format!("failed after {} attempts: {}", attempt, e)));
                }
                Err(e) => {
                    warn!("Request to {} failed, retrying: {}", url, e);
                    tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
                }
            }
        };

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(Error::PackageNotFound {
                    name: name.to_string(),
                });
            }
            status if !status.is_success() => {
                return Err(failed(format!("HTTP {} from {}", status, url)));
            }
            _ => {}
        }

        // The index serves metadata as text/plain
        let body = response
            .text()
            .await
            .map_err(|e| failed(format!("failed to read {}: {}", url, e)))?;

        PackageMetadata::from_json(&body).map_err(|e| failed(format!("invalid index entry: {}", e)))
    }
}
