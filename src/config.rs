//! Configuration for the acquisition pipeline.

use std::path::PathBuf;
use std::time::Duration;

/// Keywords a content fragment must contain (case-insensitively) to be kept
/// during content reduction.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "services", "CEO", "founder", "clients", "products", "solutions", "funding",
];

/// Configuration for the proxy directory, fetcher and page scraper.
#[derive(Debug, Clone)]
pub struct AcquireConfig {
    /// Path to the persisted proxy catalogue (csv).
    pub catalogue_path: PathBuf,
    /// Number of proxy endpoints tried for a single logical fetch.
    pub max_attempts: usize,
    /// Timeout for one proxied search request.
    pub search_timeout: Duration,
    /// First-tier timeout for a page fetch.
    pub page_timeout: Duration,
    /// Second-tier timeout used for the single retry after a page timeout.
    pub page_retry_timeout: Duration,
    /// Declared content lengths above this are abandoned without reading.
    pub max_body_bytes: u64,
    /// Character budget for reduced page content.
    pub content_char_budget: usize,
    /// Upper bound on concurrent scrape workers (capped at link count).
    pub max_workers: usize,
    /// Log a low-supply warning when live endpoints fall below this floor.
    pub min_available_floor: usize,
    /// Probability of picking from the fastest third when `prefer_fast` is set.
    pub fast_bias: f64,
    /// Maximum requests per second per proxy endpoint.
    pub max_requests_per_second: f64,
    /// Topical keyword set for content reduction.
    pub keywords: Vec<String>,
    /// Minimum non-whitespace characters for a fragment to qualify.
    pub min_fragment_chars: usize,
    /// Minimum word count before the boilerplate heuristic applies.
    pub boilerplate_min_words: usize,
}

impl AcquireConfig {
    /// Create a new configuration builder.
    pub fn builder() -> AcquireConfigBuilder {
        AcquireConfigBuilder::new()
    }
}

impl Default for AcquireConfig {
    fn default() -> Self {
        AcquireConfigBuilder::new().build()
    }
}

/// Builder for `AcquireConfig`.
pub struct AcquireConfigBuilder {
    catalogue_path: Option<PathBuf>,
    max_attempts: Option<usize>,
    search_timeout: Option<Duration>,
    page_timeout: Option<Duration>,
    page_retry_timeout: Option<Duration>,
    max_body_bytes: Option<u64>,
    content_char_budget: Option<usize>,
    max_workers: Option<usize>,
    min_available_floor: Option<usize>,
    fast_bias: Option<f64>,
    max_requests_per_second: Option<f64>,
    keywords: Option<Vec<String>>,
    min_fragment_chars: Option<usize>,
    boilerplate_min_words: Option<usize>,
}

impl AcquireConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            catalogue_path: None,
            max_attempts: None,
            search_timeout: None,
            page_timeout: None,
            page_retry_timeout: None,
            max_body_bytes: None,
            content_char_budget: None,
            max_workers: None,
            min_available_floor: None,
            fast_bias: None,
            max_requests_per_second: None,
            keywords: None,
            min_fragment_chars: None,
            boilerplate_min_words: None,
        }
    }

    /// Set the path of the proxy catalogue csv.
    pub fn catalogue_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalogue_path = Some(path.into());
        self
    }

    /// Set the attempt budget for one logical fetch.
    pub fn max_attempts(mut self, count: usize) -> Self {
        self.max_attempts = Some(count);
        self
    }

    /// Set the timeout for one proxied search request.
    pub fn search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = Some(timeout);
        self
    }

    /// Set the first-tier page fetch timeout.
    pub fn page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = Some(timeout);
        self
    }

    /// Set the second-tier page fetch timeout.
    pub fn page_retry_timeout(mut self, timeout: Duration) -> Self {
        self.page_retry_timeout = Some(timeout);
        self
    }

    /// Set the declared-content-length cap for page bodies.
    pub fn max_body_bytes(mut self, bytes: u64) -> Self {
        self.max_body_bytes = Some(bytes);
        self
    }

    /// Set the character budget for reduced page content.
    pub fn content_char_budget(mut self, chars: usize) -> Self {
        self.content_char_budget = Some(chars);
        self
    }

    /// Set the upper bound on concurrent scrape workers.
    pub fn max_workers(mut self, count: usize) -> Self {
        self.max_workers = Some(count);
        self
    }

    /// Set the low-supply warning floor.
    pub fn min_available_floor(mut self, count: usize) -> Self {
        self.min_available_floor = Some(count);
        self
    }

    /// Set the probability of picking from the fastest third of endpoints.
    pub fn fast_bias(mut self, probability: f64) -> Self {
        self.fast_bias = Some(probability);
        self
    }

    /// Set the maximum requests per second per proxy endpoint.
    pub fn max_requests_per_second(mut self, rps: f64) -> Self {
        self.max_requests_per_second = Some(rps);
        self
    }

    /// Set the topical keyword set for content reduction.
    pub fn keywords(mut self, keywords: Vec<impl Into<String>>) -> Self {
        self.keywords = Some(keywords.into_iter().map(Into::into).collect());
        self
    }

    /// Set the minimum non-whitespace characters for a qualifying fragment.
    pub fn min_fragment_chars(mut self, chars: usize) -> Self {
        self.min_fragment_chars = Some(chars);
        self
    }

    /// Set the minimum word count before the boilerplate heuristic applies.
    pub fn boilerplate_min_words(mut self, words: usize) -> Self {
        self.boilerplate_min_words = Some(words);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> AcquireConfig {
        AcquireConfig {
            catalogue_path: self
                .catalogue_path
                .unwrap_or_else(|| PathBuf::from("working_proxies.csv")),
            max_attempts: self.max_attempts.unwrap_or(3),
            search_timeout: self.search_timeout.unwrap_or(Duration::from_secs(36)),
            page_timeout: self.page_timeout.unwrap_or(Duration::from_secs(5)),
            page_retry_timeout: self.page_retry_timeout.unwrap_or(Duration::from_secs(3)),
            max_body_bytes: self.max_body_bytes.unwrap_or(2_000_000),
            content_char_budget: self.content_char_budget.unwrap_or(2000),
            max_workers: self.max_workers.unwrap_or(10),
            min_available_floor: self.min_available_floor.unwrap_or(10),
            fast_bias: self.fast_bias.unwrap_or(0.8),
            max_requests_per_second: self.max_requests_per_second.unwrap_or(5.0),
            keywords: self
                .keywords
                .unwrap_or_else(|| DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()),
            min_fragment_chars: self.min_fragment_chars.unwrap_or(10),
            boilerplate_min_words: self.boilerplate_min_words.unwrap_or(5),
        }
    }
}

impl Default for AcquireConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let config = AcquireConfig::builder().build();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.search_timeout, Duration::from_secs(36));
        assert_eq!(config.page_timeout, Duration::from_secs(5));
        assert_eq!(config.page_retry_timeout, Duration::from_secs(3));
        assert_eq!(config.max_body_bytes, 2_000_000);
        assert_eq!(config.content_char_budget, 2000);
        assert_eq!(config.max_workers, 10);
        assert!(!config.keywords.is_empty());
    }

    #[test]
    fn builder_overrides() {
        let config = AcquireConfig::builder()
            .catalogue_path("proxies.csv")
            .max_attempts(5)
            .content_char_budget(500)
            .keywords(vec!["rust", "tokio"])
            .build();
        assert_eq!(config.catalogue_path, PathBuf::from("proxies.csv"));
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.content_char_budget, 500);
        assert_eq!(config.keywords, vec!["rust", "tokio"]);
    }
}
