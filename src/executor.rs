//! Parallel search execution
//!
//! Fans a [`SearchPlan`] out to the search tool and gathers whatever comes
//! back. Individual failures are logged and skipped; a batch never fails.

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::model::{SearchPlan, SearchResult};
use crate::tools::SearchTool;

/// Runs every search in a plan concurrently.
#[derive(Clone)]
pub struct SearchExecutor {
    tool: Arc<dyn SearchTool>,
}

impl SearchExecutor {
    pub fn new(tool: Arc<dyn SearchTool>) -> Self {
        Self { tool }
    }

    /// Execute all searches at once and return the successful results in
    /// completion order.
    ///
    /// The result has at most `plan.len()` entries. Dropping the returned
    /// future drops every in-flight search with it.
    pub async fn execute(&self, plan: &SearchPlan) -> Vec<SearchResult> {
        let total = plan.len();
        if total == 0 {
            return Vec::new();
        }

        info!(total, "Executing searches");

        let mut tasks = FuturesUnordered::new();
        for item in &plan.searches {
            let tool = Arc::clone(&self.tool);
            tasks.push(async move {
                let outcome = tool.search(&item.query, &item.reason).await;
                (item, outcome)
            });
        }

        let mut results = Vec::with_capacity(total);
        let mut finished = 0;

        while let Some((item, outcome)) = tasks.next().await {
            finished += 1;
            match outcome {
                Ok(summary) => results.push(summary),
                Err(e) => warn!(query = %item.query, error = %e, "Search failed, skipping"),
            }
            debug!("Searching... {}/{} completed", finished, total);
        }

        info!(succeeded = results.len(), total, "Search batch complete");
        results
    }
}
