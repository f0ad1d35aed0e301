//! Proxy endpoint records and catalogue rows.

use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;

pub(crate) type EndpointLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Health status of a proxy endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyStatus {
    /// The endpoint is usable for selection.
    Working,
    /// The endpoint failed a fetch attempt during this run.
    Failed,
}

impl ProxyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyStatus::Working => "working",
            ProxyStatus::Failed => "failed",
        }
    }
}

/// Where a record came from. Only catalogue-sourced records are ever written
/// back on persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Loaded from the persisted catalogue file.
    Catalogue,
    /// Loaded from the built-in fallback list.
    Fallback,
}

/// One row of the proxy catalogue file. Fields the directory does not
/// interpret are carried as strings so they survive a persist round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogueRow {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub isp: String,
    #[serde(default)]
    pub response_time_ms: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tested_at: String,
}

/// One proxy endpoint tracked by the directory.
#[derive(Debug, Clone)]
pub struct ProxyRecord {
    /// Host part of the endpoint identity.
    pub host: String,
    /// Port part of the endpoint identity.
    pub port: String,
    /// Full endpoint URI, e.g. "socks5://198.51.100.7:1080". Unique within
    /// a directory.
    pub endpoint: String,
    /// Where this record was loaded from.
    pub provenance: Provenance,
    /// Measured latency in milliseconds, 0.0 if unknown.
    pub latency_ms: f64,
    /// Current health status.
    pub status: ProxyStatus,
    /// Timestamp of the last out-of-band health test, verbatim from the
    /// catalogue (empty for fallback records).
    pub tested_at: String,
    /// The raw catalogue row, kept for lossless persistence. `None` for
    /// fallback records.
    pub row: Option<CatalogueRow>,
    /// Rate limiter to control requests per second through this endpoint.
    pub limiter: Arc<EndpointLimiter>,
}

impl ProxyRecord {
    /// Build a record from a catalogue row. Returns `None` for rows missing
    /// host or port.
    pub fn from_row(row: CatalogueRow, max_rps: f64) -> Option<Self> {
        let host = row.ip.trim().to_string();
        let port = row.port.trim().to_string();
        if host.is_empty() || port.is_empty() {
            return None;
        }
        let latency_ms = row.response_time_ms.trim().parse::<f64>().unwrap_or(0.0);
        let tested_at = row.tested_at.clone();
        Some(Self {
            endpoint: format!("socks5://{}:{}", host, port),
            host,
            port,
            provenance: Provenance::Catalogue,
            latency_ms,
            status: ProxyStatus::Working,
            tested_at,
            row: Some(row),
            limiter: new_limiter(max_rps),
        })
    }

    /// Build a record from a built-in fallback endpoint URI. Returns `None`
    /// if the URI does not carry a host:port pair.
    pub fn from_fallback(endpoint: &str, max_rps: f64) -> Option<Self> {
        let stripped = endpoint.trim().trim_start_matches("socks5://");
        let (host, port) = stripped.split_once(':')?;
        if host.is_empty() || port.is_empty() {
            return None;
        }
        Some(Self {
            host: host.to_string(),
            port: port.to_string(),
            endpoint: format!("socks5://{}:{}", host, port),
            provenance: Provenance::Fallback,
            latency_ms: 0.0,
            status: ProxyStatus::Working,
            tested_at: String::new(),
            row: None,
            limiter: new_limiter(max_rps),
        })
    }

    /// Convert the endpoint URI to a reqwest::Proxy.
    pub fn to_reqwest_proxy(&self) -> Result<reqwest::Proxy, reqwest::Error> {
        reqwest::Proxy::all(&self.endpoint)
    }

    /// Flip this record to failed, mirroring the change into the raw row so
    /// a later persist writes it out.
    pub(crate) fn mark_failed(&mut self) {
        self.status = ProxyStatus::Failed;
        if let Some(row) = self.row.as_mut() {
            row.status = ProxyStatus::Failed.as_str().to_string();
        }
    }
}

fn new_limiter(max_rps: f64) -> Arc<EndpointLimiter> {
    let per_second = NonZeroU32::new(max_rps.ceil() as u32).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_second(per_second)))
}
