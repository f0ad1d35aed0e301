//! Request fingerprinting countermeasures and block-signature detection.
//!
//! Every outbound request gets a freshly randomized header set so no two
//! requests are required to look alike to the search endpoint.

use rand::seq::IndexedRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Curated desktop/mobile user-agent pool.
pub const USER_AGENTS: &[&str] = &[
    // Chrome Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/122.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0 Safari/537.36",
    // Chrome Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_3) AppleWebKit/537.36 Chrome/122.0 Safari/537.36",
    // Firefox Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0",
    "Mozilla/5.0 (Windows NT 10.0; rv:118.0) Gecko/20100101 Firefox/118.0",
    // Safari macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 12_6) AppleWebKit/605.1.15 Version/16.1 Safari/605.1.15",
    // Mobile Android
    "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 Chrome/121.0 Mobile Safari/537.36",
    // Mobile iPhone
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Version/17.0 Mobile/15E148 Safari/604.1",
];

const LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.8",
    "en-CA,en;q=0.8",
    "en-AU,en;q=0.8",
    "en-IN,en;q=0.8",
];

const REFERERS: &[&str] = &[
    "https://duckduckgo.com/",
    "https://www.google.com/",
    "https://www.bing.com/",
    "https://search.brave.com/",
];

/// Phrases whose presence in a response body marks it as an anti-bot
/// challenge rather than real content. Checked case-insensitively. This is
/// policy, expected to grow over time.
pub const BLOCK_SIGNATURES: &[&str] = &[
    "unfortunately, bots use duckduckgo too",
    "please complete the following challenge",
    "select all squares containing a duck",
    "anomaly-modal__puzzle",
    "error-lite@duckduckgo.com",
    "cloudflare",
    "captcha",
];

/// True if the body matches the block-signature set.
pub fn is_blocked(body: &str) -> bool {
    let lower = body.to_lowercase();
    BLOCK_SIGNATURES.iter().any(|sig| lower.contains(sig))
}

/// Build a randomized header set for one outbound request.
///
/// Accept is restricted to HTML/XML/plain text so servers skip image, css
/// and media payloads; only the text is scraped anyway.
pub fn random_headers() -> HeaderMap {
    let mut rng = rand::rng();
    let mut headers = HeaderMap::new();

    let ua = USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0]);
    let lang = LANGUAGES.choose(&mut rng).copied().unwrap_or(LANGUAGES[0]);

    headers.insert(reqwest::header::USER_AGENT, HeaderValue::from_static(ua));
    headers.insert(reqwest::header::ACCEPT_LANGUAGE, HeaderValue::from_static(lang));
    headers.insert(
        reqwest::header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,text/plain;q=0.8"),
    );
    insert_choice(&mut headers, &mut rng, "cache-control", &["max-age=0", "no-cache", "no-store"]);
    insert_choice(&mut headers, &mut rng, "sec-fetch-site", &["same-origin", "none", "cross-site"]);
    insert_choice(&mut headers, &mut rng, "sec-fetch-mode", &["navigate", "no-cors"]);
    insert_choice(&mut headers, &mut rng, "sec-fetch-dest", &["document", "empty"]);
    insert_choice(&mut headers, &mut rng, "connection", &["keep-alive", "close"]);

    if rng.random_bool(0.5) {
        insert_choice(&mut headers, &mut rng, "upgrade-insecure-requests", &["1"]);
    }
    if rng.random_bool(0.5) {
        insert_choice(&mut headers, &mut rng, "sec-fetch-user", &["?1"]);
    }
    if rng.random_bool(0.7) {
        insert_choice(&mut headers, &mut rng, "referer", REFERERS);
    }
    if rng.random_bool(0.5) {
        insert_choice(&mut headers, &mut rng, "dnt", &["1", "0"]);
    }
    if rng.random_bool(0.4) {
        insert_choice(&mut headers, &mut rng, "pragma", &["no-cache"]);
    }
    if rng.random_bool(0.3) {
        insert_choice(&mut headers, &mut rng, "te", &["trailers"]);
    }

    headers
}

fn insert_choice(headers: &mut HeaderMap, rng: &mut impl Rng, name: &'static str, pool: &[&'static str]) {
    if let Some(value) = pool.choose(rng) {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
}
