//! # webharvest
//!
//! Resilient web content acquisition through a rotating SOCKS5 proxy pool.
//!
//! Given a topic, this crate issues a search through a pool of untrusted,
//! frequently-failing SOCKS5 proxies, resolves the result links, fetches the
//! pages in parallel and reduces each one to a bounded amount of relevant
//! text. Proxy health is tracked, failing endpoints are quarantined, and
//! health changes are persisted back to the proxy catalogue.

pub mod acquire;
pub mod config;
pub mod directory;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod fingerprint;
pub mod proxy;
pub mod scrape;
pub mod search;
pub mod stats;

pub use acquire::Acquirer;
pub use config::{AcquireConfig, AcquireConfigBuilder};
pub use directory::{DirectoryStats, ProxyDirectory};
pub use error::ProxyExhausted;
pub use extract::{extract_links, SearchLink};
pub use fetcher::{FetchResponse, Fetcher};
pub use proxy::{CatalogueRow, Provenance, ProxyRecord, ProxyStatus};
pub use scrape::{PageScraper, ScrapedPage};
pub use search::SearchMode;
pub use stats::{UsageSnapshot, UsageStats};
