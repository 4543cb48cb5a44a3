//! # Search Tools
//!
//! The [`SearchTool`] contract consumed by the search executor, and the web
//! search tool that backs it. `WebSearchTool` can search Tavily (when an API
//! key is configured) or scrape DuckDuckGo's HTML endpoint for free.
//!
//! `WebSearchTool` is used two ways:
//! - directly as a `SearchTool`, returning formatted hits
//! - as a rig `Tool` handed to the search agent in [`crate::agent`], which
//!   summarises the hits into a dense analyst brief

use async_trait::async_trait;
use rig::completion::ToolDefinition;
use rig::tool::Tool;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::tavily::{TavilyClient, TavilyError};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Minimum gap between the starts of two DuckDuckGo requests.
const DUCKDUCKGO_SPACING: Duration = Duration::from_millis(500);

// =============================================================================
// ERRORS
// =============================================================================

/// Why a single search produced no summary.
///
/// The executor logs these and moves on; they never fail a batch.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Failed to perform web search: {0}")]
    SearchFailed(String),

    #[error("Rate limited by search provider, please wait")]
    RateLimited,

    #[error("No search results found for query: {0}")]
    NoResults(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Tavily error: {0}")]
    Tavily(#[from] TavilyError),

    #[error("Search agent failed: {0}")]
    Agent(String),
}

// =============================================================================
// SEARCH TOOL CONTRACT
// =============================================================================

/// Runs one planned search and returns a text summary of what was found.
#[async_trait]
pub trait SearchTool: Send + Sync {
    async fn search(&self, query: &str, reason: &str) -> Result<String, SearchError>;
}

/// A single hit returned by a search backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Where `WebSearchTool` sends its queries.
#[derive(Debug, Clone)]
pub enum SearchBackend {
    DuckDuckGo,
    Tavily(TavilyClient),
}

impl SearchBackend {
    fn name(&self) -> &'static str {
        match self {
            SearchBackend::DuckDuckGo => "duckduckgo",
            SearchBackend::Tavily(_) => "tavily",
        }
    }
}

// =============================================================================
// REQUEST SPACING
// =============================================================================

/// Hands out request start times at least `interval` apart.
///
/// Callers reserve the next free slot under the lock and sleep outside it,
/// so a concurrent batch is released one request per interval.
#[derive(Debug)]
pub struct RequestSpacing {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestSpacing {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Wait for this caller's slot.
    pub async fn wait(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}

// =============================================================================
// WEB SEARCH TOOL
// =============================================================================

/// Clones share one [`RequestSpacing`], so every agent built from the same
/// tool respects the same DuckDuckGo pacing.
#[derive(Debug, Clone)]
pub struct WebSearchTool {
    backend: SearchBackend,
    max_results: usize,
    spacing: Arc<RequestSpacing>,
}

impl WebSearchTool {
    pub fn new(backend: SearchBackend, max_results: usize) -> Self {
        Self {
            backend,
            max_results,
            spacing: Arc::new(RequestSpacing::new(DUCKDUCKGO_SPACING)),
        }
    }

    /// Tavily when a key is supplied, DuckDuckGo otherwise.
    pub fn from_api_key(tavily_api_key: Option<&str>, max_results: usize) -> Self {
        let backend = match tavily_api_key {
            Some(key) if !key.trim().is_empty() => SearchBackend::Tavily(TavilyClient::new(key)),
            _ => SearchBackend::DuckDuckGo,
        };
        Self::new(backend, max_results)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Query the configured backend for raw hits.
    pub async fn search_hits(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        info!(query = %query, backend = self.backend.name(), "Performing web search");

        let hits = match &self.backend {
            SearchBackend::Tavily(client) => client.search(query, self.max_results).await?,
            SearchBackend::DuckDuckGo => self.search_duckduckgo(query).await?,
        };

        if hits.is_empty() {
            warn!(query = %query, "No search results found");
        } else {
            info!(query = %query, count = hits.len(), "Search completed");
        }

        Ok(hits)
    }

    async fn search_duckduckgo(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        self.spacing.wait().await;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;

        let url = format!(
            "https://html.duckduckgo.com/html/?q={}",
            urlencoding::encode(query)
        );

        debug!(url = %url, "Fetching search results");

        let response = client.get(&url).send().await?;

        if !response.status().is_success() {
            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(SearchError::RateLimited);
            }
            return Err(SearchError::SearchFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        Ok(parse_duckduckgo_html(&body, self.max_results))
    }
}

#[async_trait]
impl SearchTool for WebSearchTool {
    async fn search(&self, query: &str, _reason: &str) -> Result<String, SearchError> {
        let hits = self.search_hits(query).await?;

        if hits.is_empty() {
            return Err(SearchError::NoResults(query.to_string()));
        }

        Ok(format_hits(query, &hits))
    }
}

/// Render hits as markdown for an LLM or a human.
pub fn format_hits(query: &str, hits: &[SearchHit]) -> String {
    let formatted: String = hits
        .iter()
        .enumerate()
        .map(|(i, hit)| format!("{}. **{}**\n   URL: {}\n   {}\n", i + 1, hit.title, hit.url, hit.snippet))
        .collect::<Vec<_>>()
        .join("\n");

    format!("## Search Results for: {}\n\n{}", query, formatted)
}

/// Pull result links out of a DuckDuckGo HTML page.
///
/// Result anchors carry the target in an encoded `uddg=` redirect parameter;
/// the visible `result__snippet` text that follows becomes the snippet.
fn parse_duckduckgo_html(html: &str, max_results: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    let mut seen = HashSet::new();

    for segment in html.split("uddg=").skip(1) {
        if hits.len() >= max_results {
            break;
        }

        let Some(end) = segment.find(['&', '"', '\'']) else {
            continue;
        };
        let Ok(decoded) = urlencoding::decode(&segment[..end]) else {
            continue;
        };
        let url = decoded.into_owned();

        if !url.starts_with("http") || url.contains("duckduckgo.com") || !seen.insert(url.clone()) {
            continue;
        }

        let snippet = extract_snippet(segment).unwrap_or_else(|| "Search result from DuckDuckGo".to_string());

        hits.push(SearchHit {
            title: extract_domain(&url).unwrap_or_else(|| "Result".to_string()),
            url,
            snippet,
        });
    }

    hits
}

fn extract_snippet(segment: &str) -> Option<String> {
    let start = segment.find("result__snippet")?;
    let after_tag = &segment[start..];
    let open = after_tag.find('>')? + 1;
    let close = after_tag[open..].find("</a>")?;

    let text = strip_tags(&after_tag[open..open + close]);
    (!text.is_empty()).then_some(text)
}

fn strip_tags(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for c in fragment.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn extract_domain(url: &str) -> Option<String> {
    url.split("//")
        .nth(1)?
        .split('/')
        .next()
        .map(|s| s.to_string())
}

// =============================================================================
// RIG TOOL TRAIT IMPLEMENTATION
// =============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct SearchArgs {
    pub query: String,
}

/// Lets a rig agent call the web search while it writes its summary.
impl Tool for WebSearchTool {
    const NAME: &'static str = "web_search";

    type Args = SearchArgs;
    type Output = String;
    type Error = SearchError;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Search the web for current information. Returns titles, URLs and snippets.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query to run"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let hits = self.search_hits(&args.query).await?;

        if hits.is_empty() {
            return Ok(format!("No results found for: {}", args.query));
        }

        Ok(format_hits(&args.query, &hits))
    }
}
