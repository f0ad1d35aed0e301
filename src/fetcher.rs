//! Resilient fetching through the proxy directory.

use crate::directory::ProxyDirectory;
use crate::error::{AttemptFailure, ProxyExhausted};
use crate::fingerprint::{is_blocked, random_headers};
use crate::proxy::ProxyRecord;

use log::{info, warn};
use std::sync::Arc;
use std::time::Instant;

/// A successful proxied fetch.
#[derive(Debug)]
pub struct FetchResponse {
    /// Response body text.
    pub body: String,
    /// HTTP status (always 2xx).
    pub status: reqwest::StatusCode,
    /// Endpoint the response came through.
    pub endpoint: String,
}

/// Fetches urls through the directory's endpoints, retrying across proxies
/// up to the configured attempt budget.
#[derive(Clone)]
pub struct Fetcher {
    directory: Arc<ProxyDirectory>,
}

impl Fetcher {
    pub fn new(directory: Arc<ProxyDirectory>) -> Self {
        Self { directory }
    }

    /// Fetch `url` through a proxy, trying up to the attempt budget of
    /// distinct endpoints. Every failed attempt quarantines the endpoint it
    /// used. Fails with [`ProxyExhausted`] when the budget runs out or no
    /// endpoints exist at all.
    pub async fn fetch(&self, url: &str, prefer_fast: bool) -> Result<FetchResponse, ProxyExhausted> {
        let config = &self.directory.config;
        self.directory.usage().record_request();
        let started = Instant::now();
        let mut last_error: Option<AttemptFailure> = None;

        for attempt in 0..config.max_attempts {
            let Some(record) = self.directory.select(prefer_fast) else {
                self.directory.usage().record_failure();
                return Err(self.exhausted(url, attempt, "no proxy endpoints loaded".into()));
            };
            info!(
                "Attempt {}/{}: trying proxy {} for {}",
                attempt + 1,
                config.max_attempts,
                record.endpoint,
                url
            );

            record.limiter.until_ready().await;

            let attempt_start = Instant::now();
            match self.try_once(url, &record).await {
                Ok(response) => {
                    self.directory.usage().record_success();
                    info!(
                        "Fetched {} via {} in {:.2}s (attempt {})",
                        url,
                        record.endpoint,
                        started.elapsed().as_secs_f64(),
                        attempt + 1
                    );
                    return Ok(response);
                }
                Err(failure) => {
                    warn!(
                        "{} with {} after {:.2}s (attempt {}/{})",
                        failure,
                        record.endpoint,
                        attempt_start.elapsed().as_secs_f64(),
                        attempt + 1,
                        config.max_attempts
                    );
                    self.directory.mark_bad(&record.endpoint);
                    last_error = Some(failure);
                }
            }
        }

        self.directory.usage().record_failure();
        let cause = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".into());
        warn!(
            "All {} proxy attempts failed for {} ({})",
            config.max_attempts, url, cause
        );
        Err(self.exhausted(url, config.max_attempts, cause))
    }

    /// One attempt through one endpoint. TLS verification is deliberately
    /// relaxed on this path: the proxy layer is already untrusted and many
    /// exit nodes man-in-the-middle certificates.
    async fn try_once(
        &self,
        url: &str,
        record: &ProxyRecord,
    ) -> Result<FetchResponse, AttemptFailure> {
        let proxy = record
            .to_reqwest_proxy()
            .map_err(|e| AttemptFailure::Transport(e.to_string()))?;

        let client = reqwest::Client::builder()
            .proxy(proxy)
            .timeout(self.directory.config.search_timeout)
            .default_headers(random_headers())
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| AttemptFailure::Transport(e.to_string()))?;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| AttemptFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptFailure::HttpStatus(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AttemptFailure::Transport(e.to_string()))?;

        if is_blocked(&body) {
            return Err(AttemptFailure::Blocked);
        }

        Ok(FetchResponse {
            body,
            status,
            endpoint: record.endpoint.clone(),
        })
    }

    fn exhausted(&self, url: &str, attempts: usize, last_error: String) -> ProxyExhausted {
        let (total, available) = self.directory.counts();
        ProxyExhausted {
            url: url.to_string(),
            attempts,
            available,
            total,
            last_error,
        }
    }
}
