//! Tavily search client
//!
//! Web-search backend used when `TAVILY_API_KEY` is configured. Failures are
//! reduced to three kinds (transport, HTTP status, undecodable body) and
//! only transport errors, 429 and 5xx are retried.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::tools::SearchHit;

const SEARCH_ENDPOINT: &str = "https://api.tavily.com/search";

/// Tavily rejects `max_results` above this.
const MAX_RESULTS_LIMIT: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum TavilyError {
    /// The request never produced a response (connect failure, timeout).
    #[error("Tavily unreachable: {0}")]
    Transport(String),

    #[error("Tavily returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Tavily response could not be decoded: {0}")]
    Decode(String),
}

impl TavilyError {
    pub fn is_retryable(&self) -> bool {
        match self {
            TavilyError::Transport(_) => true,
            TavilyError::Status { code, .. } => *code == 429 || *code >= 500,
            TavilyError::Decode(_) => false,
        }
    }
}

/// How often and how patiently to retry retryable failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): base, 2x base, 4x base...
    fn delay(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(10);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Serialize)]
struct SearchBody<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
    include_answer: bool,
}

#[derive(Deserialize)]
struct SearchReply {
    #[serde(default)]
    results: Vec<ReplyItem>,
}

#[derive(Deserialize)]
struct ReplyItem {
    title: String,
    url: String,
    content: String,
}

impl From<ReplyItem> for SearchHit {
    fn from(item: ReplyItem) -> Self {
        SearchHit {
            title: item.title,
            url: item.url,
            snippet: item.content,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TavilyClient {
    api_key: String,
    http: Client,
    endpoint: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl TavilyClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            http: Client::new(),
            endpoint: SEARCH_ENDPOINT.to_string(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    /// Send searches to `{base_url}/search` instead of the public API.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.endpoint = format!("{}/search", base_url.into().trim_end_matches('/'));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry.base_delay = delay;
        self
    }

    /// Run an advanced-depth search, retrying transient failures.
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, TavilyError> {
        let body = SearchBody {
            query,
            max_results: max_results.clamp(1, MAX_RESULTS_LIMIT),
            search_depth: "advanced",
            include_answer: false,
        };

        let mut retries = 0;
        loop {
            let error = match self.post(&body).await {
                Ok(hits) => return Ok(hits),
                Err(e) => e,
            };

            if !error.is_retryable() || retries >= self.retry.max_retries {
                return Err(error);
            }

            retries += 1;
            let delay = self.retry.delay(retries);
            warn!(retries, delay_ms = delay.as_millis() as u64, error = %error, "Tavily search failed, retrying");
            tokio::time::sleep(delay).await;
        }
    }

    async fn post(&self, body: &SearchBody<'_>) -> Result<Vec<SearchHit>, TavilyError> {
        debug!(query = body.query, endpoint = %self.endpoint, "Tavily search");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| TavilyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TavilyError::Status {
                code: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let reply: SearchReply = response
            .json()
            .await
            .map_err(|e| TavilyError::Decode(e.to_string()))?;

        Ok(reply.results.into_iter().map(SearchHit::from).collect())
    }
}
