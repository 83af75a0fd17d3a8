//! Discovery backend client

use async_trait::async_trait;
use lbsync_core::{DiscoveryConfig, LbsyncError, LbsyncResult, RawMetadata};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use std::sync::Arc;
use tracing::debug;

/// Source of raw service metadata
///
/// Implementations perform exactly one fetch per call and never retry; the reconciler's
/// poll cadence is the retry policy.
#[async_trait]
pub trait DiscoveryClient: Send + Sync {
    /// Fetch the current service document
    async fn fetch_raw(&self) -> LbsyncResult<RawMetadata>;
}

#[async_trait]
impl<T: DiscoveryClient + ?Sized> DiscoveryClient for Arc<T> {
    async fn fetch_raw(&self) -> LbsyncResult<RawMetadata> {
        (**self).fetch_raw().await
    }
}

/// Discovery client for the platform's HTTP service API
pub struct HttpDiscoveryClient {
    client: reqwest::Client,
    url: String,
    auth: Option<String>,
}

impl HttpDiscoveryClient {
    /// Create a client for the configured service URL
    pub fn new(config: &DiscoveryConfig) -> LbsyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| LbsyncError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            auth: config.auth.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DiscoveryClient for HttpDiscoveryClient {
    async fn fetch_raw(&self) -> LbsyncResult<RawMetadata> {
        let mut request = self.client.get(&self.url).header(ACCEPT, "application/json");
        if let Some(auth) = &self.auth {
            request = request.header(AUTHORIZATION, auth);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LbsyncError::DiscoveryUnavailable(format!("{}: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LbsyncError::DiscoveryUnavailable(format!(
                "{} returned {}",
                self.url, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| LbsyncError::DiscoveryUnavailable(format!("{}: {}", self.url, e)))?;

        let metadata: RawMetadata = serde_json::from_str(&body)
            .map_err(|e| LbsyncError::MalformedResponse(format!("{}: {}", self.url, e)))?;

        debug!(
            url = %self.url,
            links = metadata.linked_to_service.len(),
            envvars = metadata.calculated_envvars.len(),
            "Fetched service metadata"
        );

        Ok(metadata)
    }
}
