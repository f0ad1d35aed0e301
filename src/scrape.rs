//! Concurrent page scraping and content reduction.

use crate::config::AcquireConfig;
use crate::extract::SearchLink;
use crate::fingerprint::random_headers;

use futures::stream::{self, StreamExt};
use log::debug;
use scraper::{Html, Selector};
use std::collections::HashSet;

/// Structural selectors tried in priority order during content reduction.
/// Primary-content containers come first; bare paragraphs are the fallback.
const CONTENT_SELECTORS: &[&str] = &[
    "main p, main div",
    "article p, article div",
    ".content p, .content div, .main-content p, .main-content div",
    "p, div",
];

/// Phrases that mark a fragment as navigational or boilerplate.
const BOILERPLATE_PHRASES: &[&str] = &[
    "click here",
    "privacy",
    "terms",
    "login",
    "subscribe",
    "©",
    "all rights reserved",
];

/// One scraped page: reduced content never exceeds the configured character
/// budget. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedPage {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub content: String,
}

/// Fetches candidate links in parallel and reduces each page to a bounded
/// amount of relevant text.
#[derive(Clone)]
pub struct PageScraper {
    config: AcquireConfig,
}

impl PageScraper {
    pub fn new(config: AcquireConfig) -> Self {
        Self { config }
    }

    /// Scrape every link with a bounded pool of concurrent tasks, gathering
    /// results as they complete. Pages that fail to fetch or yield no
    /// qualifying content are silently dropped; the output is an unordered
    /// subset of the input.
    pub async fn scrape(&self, links: Vec<SearchLink>) -> Vec<ScrapedPage> {
        if links.is_empty() {
            return Vec::new();
        }
        let workers = self.config.max_workers.min(links.len()).max(1);
        stream::iter(links)
            .map(|link| self.scrape_one(link))
            .buffer_unordered(workers)
            .filter_map(|page| async move { page })
            .collect()
            .await
    }

    /// Fetch and reduce one page. Each call builds its own client, so no
    /// connection state is shared across workers.
    async fn scrape_one(&self, link: SearchLink) -> Option<ScrapedPage> {
        let client = reqwest::Client::builder()
            .default_headers(random_headers())
            .build()
            .ok()?;

        let html = self.fetch_page(&client, &link.url).await?;
        let content = self.reduce_content(&html);
        if content.is_empty() {
            debug!("No qualifying content in {}", link.url);
            return None;
        }
        Some(ScrapedPage {
            url: link.url,
            title: link.title,
            snippet: link.snippet,
            content,
        })
    }

    /// Two-tier fetch: the short first-tier timeout, and on timeout only, a
    /// single retry at the even shorter second tier. Any other failure
    /// abandons the page.
    async fn fetch_page(&self, client: &reqwest::Client, url: &str) -> Option<String> {
        match self.fetch_page_once(client, url, self.config.page_timeout).await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => {
                debug!("Timeout fetching {}, retrying at shorter timeout", url);
                self.fetch_page_once(client, url, self.config.page_retry_timeout)
                    .await
                    .ok()
                    .flatten()
            }
            Err(e) => {
                debug!("Abandoning {}: {}", url, e);
                None
            }
        }
    }

    /// `Ok(None)` means the page responded but is not worth reading:
    /// non-2xx status or a declared body larger than the bandwidth cap.
    async fn fetch_page_once(
        &self,
        client: &reqwest::Client,
        url: &str,
        timeout: std::time::Duration,
    ) -> Result<Option<String>, reqwest::Error> {
        let response = client.get(url).timeout(timeout).send().await?;

        if let Some(declared) = response.content_length() {
            if declared > self.config.max_body_bytes {
                debug!("Skipping {} ({} declared bytes)", url, declared);
                return Ok(None);
            }
        }
        if !response.status().is_success() {
            return Ok(None);
        }
        response.text().await.map(Some)
    }

    /// Reduce a page to qualifying text fragments: scanned through the
    /// selector cascade, deduplicated by exact text, concatenated with
    /// single spaces, never exceeding the character budget. The cascade
    /// short-circuits once the budget is met.
    pub fn reduce_content(&self, html: &str) -> String {
        if html.is_empty() {
            return String::new();
        }

        let budget = self.config.content_char_budget;
        let document = Html::parse_document(html);
        let mut fragments: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut total = 0usize;

        'cascade: for selector_str in CONTENT_SELECTORS {
            let Ok(selector) = Selector::parse(selector_str) else {
                continue;
            };
            for element in document.select(&selector) {
                let text = element
                    .text()
                    .flat_map(str::split_whitespace)
                    .collect::<Vec<_>>()
                    .join(" ");

                let solid_chars = text.chars().filter(|c| !c.is_whitespace()).count();
                if solid_chars < self.config.min_fragment_chars {
                    continue;
                }
                let lower = text.to_lowercase();
                if self.is_boilerplate(&text, &lower) || !self.contains_keyword(&lower) {
                    continue;
                }
                if !seen.insert(text.clone()) {
                    continue;
                }
                total += text.chars().count();
                fragments.push(text);
                if total >= budget {
                    break 'cascade;
                }
            }
            if total >= budget {
                break;
            }
        }

        let joined = fragments.join(" ");
        if joined.chars().count() > budget {
            joined.chars().take(budget).collect()
        } else {
            joined
        }
    }

    /// Navigational/boilerplate heuristic: a known phrase combined with a
    /// minimum word count. Very short fragments are left to the keyword
    /// check instead.
    fn is_boilerplate(&self, text: &str, lower: &str) -> bool {
        if text.split_whitespace().count() < self.config.boilerplate_min_words {
            return false;
        }
        BOILERPLATE_PHRASES.iter().any(|p| lower.contains(p))
    }

    fn contains_keyword(&self, lower: &str) -> bool {
        self.config
            .keywords
            .iter()
            .any(|k| lower.contains(&k.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AcquireConfig;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn scraper() -> PageScraper {
        PageScraper::new(AcquireConfig::default())
    }

    fn link(url: &str) -> SearchLink {
        SearchLink {
            url: url.to_string(),
            title: "Title".into(),
            snippet: "Snippet".into(),
        }
    }

    /// Serve one HTTP/1.1 response on a loopback port, then close.
    async fn serve_once(status_line: &'static str, headers: String, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!("{}\r\n{}Connection: close\r\n\r\n{}", status_line, headers, body);
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}/", addr)
    }

    fn page_with_keywords() -> String {
        "<html><body><main>\
         <p>Acme Corp provides consulting services to enterprise clients across Europe.</p>\
         <p>Click here to subscribe to our newsletter and accept the privacy terms today.</p>\
         <p>The founder started the company in 2012 after leaving a research lab.</p>\
         </main></body></html>"
            .to_string()
    }

    #[test]
    fn reduce_keeps_keyword_fragments_and_drops_boilerplate() {
        let content = scraper().reduce_content(&page_with_keywords());
        assert!(content.contains("consulting services"));
        assert!(content.contains("founder"));
        assert!(!content.contains("subscribe"));
    }

    #[test]
    fn reduce_respects_character_budget() {
        let config = AcquireConfig::builder().content_char_budget(50).build();
        let scraper = PageScraper::new(config);
        let content = scraper.reduce_content(&page_with_keywords());
        assert!(content.chars().count() <= 50);
        assert!(!content.is_empty());
    }

    #[test]
    fn reduce_deduplicates_exact_fragments() {
        let html = "<html><body>\
            <p>Our services cover everything enterprise clients need.</p>\
            <p>Our services cover everything enterprise clients need.</p>\
            </body></html>";
        let content = scraper().reduce_content(html);
        assert_eq!(
            content.matches("services cover everything").count(),
            1
        );
    }

    #[test]
    fn reduce_skips_short_and_keywordless_fragments() {
        let html = "<html><body>\
            <p>services</p>\
            <p>A long paragraph about gardening with no relevant topical words at all.</p>\
            </body></html>";
        assert!(scraper().reduce_content(html).is_empty());
        assert!(scraper().reduce_content("").is_empty());
    }

    #[tokio::test]
    async fn scrape_returns_subset_with_bounded_content() {
        let good = serve_once(
            "HTTP/1.1 200 OK",
            "Content-Type: text/html\r\n".to_string(),
            page_with_keywords(),
        )
        .await;
        let results = scraper()
            .scrape(vec![link(&good), link("http://127.0.0.1:9/")])
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, good);
        assert!(results[0].content.contains("services"));
        assert!(results[0].content.chars().count() <= 2000);
    }

    #[tokio::test]
    async fn oversized_declared_body_is_abandoned() {
        let url = serve_once(
            "HTTP/1.1 200 OK",
            "Content-Type: text/html\r\nContent-Length: 3000000\r\n".to_string(),
            String::new(),
        )
        .await;
        let results = scraper().scrape(vec![link(&url)]).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn non_success_status_is_abandoned() {
        let url = serve_once(
            "HTTP/1.1 503 Service Unavailable",
            "Content-Type: text/html\r\n".to_string(),
            page_with_keywords(),
        )
        .await;
        let results = scraper().scrape(vec![link(&url)]).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn unresponsive_server_times_out_without_error() {
        // Accepts the connection but never answers; both timeout tiers
        // expire and the page degrades to "not produced".
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _held = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let config = AcquireConfig::builder()
            .page_timeout(Duration::from_millis(200))
            .page_retry_timeout(Duration::from_millis(100))
            .build();
        let results = PageScraper::new(config)
            .scrape(vec![link(&format!("http://{}/", addr))])
            .await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn empty_link_list_scrapes_nothing() {
        assert!(scraper().scrape(Vec::new()).await.is_empty());
    }
}
