//! Process-wide usage counters for the acquisition pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters written by the fetcher and directory, read-only to callers.
/// Reset only at process start (counters begin at zero with the directory).
#[derive(Debug, Default)]
pub struct UsageStats {
    /// Logical fetches started, regardless of outcome.
    pub total_requests: AtomicUsize,
    /// Fetches that returned an unblocked 2xx body.
    pub successful_requests: AtomicUsize,
    /// Fetches that exhausted their attempt budget.
    pub failed_requests: AtomicUsize,
    /// Distinct endpoints marked bad during this run.
    pub proxies_marked_bad: AtomicUsize,
}

impl UsageStats {
    pub(crate) fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_marked_bad(&self) {
        self.proxies_marked_bad.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of the counters.
    pub fn snapshot(&self) -> UsageSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let successful = self.successful_requests.load(Ordering::Relaxed);
        UsageSnapshot {
            total_requests: total,
            successful_requests: successful,
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            proxies_marked_bad: self.proxies_marked_bad.load(Ordering::Relaxed),
            success_rate: if total > 0 {
                successful as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        }
    }
}

/// Point-in-time view of `UsageStats`.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub proxies_marked_bad: usize,
    /// Percentage of total requests that succeeded.
    pub success_rate: f64,
}
