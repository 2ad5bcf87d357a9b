//! HTTP Marketplace Fetcher
//!
//! The production `MarketplaceFetcher`: JSON sources are fetched over
//! HTTP with a per-source timeout; git sources are shallow-cloned and
//! scanned for `SKILL.md` files.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::fetch::{payload, repo_scan};
use crate::types::{MarketplaceFetcher, MarketplaceSource, SkillCandidate, SourceError, SourceFormat};

/// Marketplace reader backed by `reqwest` and the system `git` binary.
pub struct HttpFetcher {
    http: Client,
    default_timeout_secs: u64,
}

impl HttpFetcher {
    /// Create a new fetcher. `default_timeout_secs` applies to sources
    /// that do not configure their own timeout.
    pub fn new(default_timeout_secs: u64) -> Self {
        Self {
            http: Client::new(),
            default_timeout_secs,
        }
    }

    fn timeout_for(&self, source: &MarketplaceSource) -> u64 {
        if source.timeout_secs > 0 {
            source.timeout_secs
        } else {
            self.default_timeout_secs
        }
    }

    /// GET a JSON source endpoint and parse the payload into candidates.
    async fn fetch_json_source(
        &self,
        source: &MarketplaceSource,
    ) -> Result<Vec<SkillCandidate>, SourceError> {
        let response = self
            .http
            .get(&source.endpoint)
            .timeout(Duration::from_secs(self.timeout_for(source)))
            .send()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;

        payload::parse_payload(&value, &source.id)
    }
}

#[async_trait]
impl MarketplaceFetcher for HttpFetcher {
    async fn fetch_source(
        &self,
        source: &MarketplaceSource,
    ) -> Result<Vec<SkillCandidate>, SourceError> {
        match source.format {
            SourceFormat::Json => self.fetch_json_source(source).await,
            SourceFormat::Git => {
                let endpoint = source.endpoint.clone();
                let timeout = self.timeout_for(source);
                // Cloning shells out to git; keep it off the async workers.
                tokio::task::spawn_blocking(move || repo_scan::clone_and_scan(&endpoint, timeout))
                    .await
                    .map_err(|e| SourceError::Clone(e.to_string()))?
            }
        }
    }
}
