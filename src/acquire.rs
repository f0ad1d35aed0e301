//! Acquisition orchestrator: search, extract, scrape.

use crate::config::AcquireConfig;
use crate::directory::ProxyDirectory;
use crate::error::ProxyExhausted;
use crate::extract::extract_links;
use crate::fetcher::Fetcher;
use crate::scrape::{PageScraper, ScrapedPage};
use crate::search::{build_query, search_url, SearchMode};

use log::info;
use std::sync::Arc;
use std::time::Instant;

/// Ties the fetcher, extractor and scraper together. Pure sequencing; the
/// components it drives already degrade gracefully on partial failure.
pub struct Acquirer {
    directory: Arc<ProxyDirectory>,
    fetcher: Fetcher,
    scraper: PageScraper,
}

impl Acquirer {
    /// Build an orchestrator with its own directory instance.
    pub fn new(config: AcquireConfig) -> Self {
        Self::with_directory(Arc::new(ProxyDirectory::new(config)))
    }

    /// Build an orchestrator over an existing (possibly shared) directory.
    pub fn with_directory(directory: Arc<ProxyDirectory>) -> Self {
        let scraper = PageScraper::new(directory.config.clone());
        let fetcher = Fetcher::new(Arc::clone(&directory));
        Self {
            directory,
            fetcher,
            scraper,
        }
    }

    /// The directory backing this orchestrator, for stats and reloads.
    pub fn directory(&self) -> &Arc<ProxyDirectory> {
        &self.directory
    }

    /// Search for a topic and return raw per-page content. A blocked search
    /// or a batch of failed pages yields an empty list; `ProxyExhausted`
    /// from the search fetch is propagated unchanged.
    pub async fn acquire(
        &self,
        topic: &str,
        mode: SearchMode,
        max_links: usize,
    ) -> Result<Vec<ScrapedPage>, ProxyExhausted> {
        let query = build_query(topic, mode);
        let url = search_url(&query, 0);
        info!("Searching for '{}'", topic);
        self.acquire_url(&url, max_links).await
    }

    /// Acquire against an explicit search url.
    pub async fn acquire_url(
        &self,
        search_url: &str,
        max_links: usize,
    ) -> Result<Vec<ScrapedPage>, ProxyExhausted> {
        let started = Instant::now();
        let response = self.fetcher.fetch(search_url, true).await?;
        let links = extract_links(&response.body, max_links);
        let pages = self.scraper.scrape(links).await;
        info!(
            "Acquired {} pages in {:.2}s",
            pages.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(pages)
    }
}
