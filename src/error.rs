//! Error types for the webharvest crate.

use thiserror::Error;

/// Error returned when a fetch could not be completed through any proxy.
///
/// This is an infrastructure failure, never a statement about the content
/// behind the requested url.
#[derive(Debug, Error)]
#[error(
    "all {attempts} proxy attempts failed for {url} \
     (available: {available}/{total}, last error: {last_error})"
)]
pub struct ProxyExhausted {
    /// The url that was being fetched.
    pub url: String,
    /// Number of attempts made before giving up (0 if no endpoints existed).
    pub attempts: usize,
    /// Live endpoints remaining in the directory at failure time.
    pub available: usize,
    /// Total endpoints in the directory at failure time.
    pub total: usize,
    /// Description of the last observed failure.
    pub last_error: String,
}

/// Classification of a single failed fetch attempt. Drives retry accounting
/// only; individual attempt failures are never surfaced to callers.
#[derive(Debug, Clone, Error)]
pub(crate) enum AttemptFailure {
    /// The response carried a non-2xx status.
    #[error("HTTP {0}")]
    HttpStatus(u16),
    /// A 2xx response whose body matched the block-signature set.
    #[error("blocked by target (anti-bot challenge)")]
    Blocked,
    /// Connect, timeout or proxy-layer failure.
    #[error("transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_exhausted_display_carries_diagnostics() {
        let err = ProxyExhausted {
            url: "https://duckduckgo.com/html/?q=x".into(),
            attempts: 3,
            available: 4,
            total: 12,
            last_error: "HTTP 503".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("3 proxy attempts"));
        assert!(msg.contains("4/12"));
        assert!(msg.contains("HTTP 503"));
    }
}
