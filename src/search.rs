//! Search query construction for the DuckDuckGo html endpoint.

/// Base url of the html (no-javascript) search endpoint.
pub const SEARCH_BASE: &str = "https://duckduckgo.com/html/";

/// Templated query phrases per search mode, combined into one query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Company/lead enrichment queries.
    Lead,
    /// Topic research queries.
    Research,
    /// Generic news/update queries.
    #[default]
    General,
}

impl SearchMode {
    fn templates(&self) -> &'static [&'static str] {
        match self {
            SearchMode::Lead => &[
                "{topic} company profile",
                "{topic} services",
                "{topic} CEO founder",
                "hiring",
                "{topic} LinkedIn",
                "Instagram",
                "Facebook",
            ],
            SearchMode::Research => &[
                "What is {topic}",
                "{topic} latest advancements",
                "{topic} benefits and challenges",
                "{topic} statistics",
            ],
            SearchMode::General => &[
                "{topic} about",
                "{topic} latest news",
                "{topic} key updates",
            ],
        }
    }
}

/// Build the combined query for a topic: mode templates with the topic
/// substituted, joined with `+`.
pub fn build_query(topic: &str, mode: SearchMode) -> String {
    mode.templates()
        .iter()
        .map(|t| t.replace("{topic}", topic))
        .collect::<Vec<_>>()
        .join(" + ")
}

/// Format the search url for a query and result offset.
pub fn search_url(query: &str, offset: usize) -> String {
    let params = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("q", query)
        .append_pair("s", &offset.to_string())
        .finish();
    format!("{}?{}", SEARCH_BASE, params)
}
