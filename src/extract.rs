//! Search-result link extraction.

use crate::fingerprint::is_blocked;

use log::debug;
use scraper::{Html, Selector};
use std::collections::HashSet;

/// One candidate link from a search-results page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchLink {
    /// Destination url, unwrapped from the redirect parameter when present.
    pub url: String,
    /// Anchor text of the result.
    pub title: String,
    /// Result snippet, empty when the page carries none.
    pub snippet: String,
}

/// Parse a search-results page into at most `max_links` candidate links, in
/// document order, deduplicated by destination url.
///
/// A body matching the block-signature set yields an empty sequence; callers
/// treat that as a blocked search, not zero results.
pub fn extract_links(html: &str, max_links: usize) -> Vec<SearchLink> {
    let mut out = Vec::new();
    if html.is_empty() || max_links == 0 || is_blocked(html) {
        return out;
    }

    let document = Html::parse_document(html);
    let anchor_selector = match Selector::parse("a.result__a") {
        Ok(s) => s,
        Err(_) => return out,
    };
    let snippets: Vec<String> = match Selector::parse("a.result__snippet") {
        Ok(selector) => document
            .select(&selector)
            .map(|el| collapse_text(el.text()))
            .collect(),
        Err(_) => Vec::new(),
    };

    let mut seen = HashSet::new();
    for (index, anchor) in document.select(&anchor_selector).enumerate() {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let url = resolve_real_url(href);
        if !seen.insert(url.clone()) {
            continue;
        }
        out.push(SearchLink {
            url,
            title: collapse_text(anchor.text()),
            snippet: snippets.get(index).cloned().unwrap_or_default(),
        });
        if out.len() >= max_links {
            break;
        }
    }

    debug!("Extracted {} candidate links", out.len());
    out
}

/// Decode the destination behind a `uddg` redirect parameter, falling back
/// to the href verbatim.
fn resolve_real_url(href: &str) -> String {
    if let Some((_, query)) = href.split_once('?') {
        let query = query.split('#').next().unwrap_or(query);
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if key == "uddg" {
                return value.into_owned();
            }
        }
    }
    href.to_string()
}

fn collapse_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
