//! # Agent Module
//!
//! rig-core backed implementations of the pipeline's external collaborators:
//!
//! - [`RigReasoner`]: one preamble-specialised Ollama agent per output shape,
//!   asked for JSON and decoded into the typed result
//! - [`AgentSearchTool`]: an agent armed with the `web_search` tool that turns
//!   raw hits into a dense analyst summary

use async_trait::async_trait;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::ollama;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::ReasoningError;
use crate::model::{ClarifyingQuestions, EnrichedQuery, Evaluation, Report, SearchPlan, SearchResult};
use crate::prompts::{PromptBuilder, ResearchPrompts};
use crate::reasoning::{self, OutputShape, ReasoningService};
use crate::tools::{SearchError, SearchTool, WebSearchTool};

/// Points rig's Ollama client at the configured host.
///
/// rig reads `OLLAMA_API_BASE_URL` when a client is built from the
/// environment, so this runs once before any agent is created.
fn export_ollama_host(config: &Config) {
    std::env::set_var("OLLAMA_API_BASE_URL", &config.ollama_host);
}

// =============================================================================
// REASONING
// =============================================================================

/// Reasoning service backed by a local Ollama model.
pub struct RigReasoner {
    config: Config,
}

impl RigReasoner {
    pub fn new(config: Config) -> Self {
        export_ollama_host(&config);
        Self { config }
    }

    /// Run a single-turn prompt against a fresh agent with `preamble`.
    async fn complete(&self, shape: OutputShape, preamble: &str, input: &str) -> Result<String, ReasoningError> {
        let client = ollama::Client::from_env();

        let agent = client
            .agent(&self.config.model)
            .preamble(preamble)
            .temperature(f64::from(self.config.temperature))
            .build();

        debug!(shape = %shape, model = %self.config.model, input_len = input.len(), "Sending reasoning request");

        let response = agent
            .prompt(input)
            .await
            .map_err(|e| ReasoningError::Request(e.to_string()))?;

        debug!(shape = %shape, response_len = response.len(), "Reasoning response received");
        Ok(response)
    }
}

#[async_trait]
impl ReasoningService for RigReasoner {
    async fn clarify(&self, query: &str) -> Result<ClarifyingQuestions, ReasoningError> {
        let raw = self
            .complete(
                OutputShape::ClarifyingQuestions,
                &ResearchPrompts::clarifier(),
                &PromptBuilder::clarify(query),
            )
            .await?;
        reasoning::parse_questions(&raw)
    }

    async fn plan(&self, query: &EnrichedQuery) -> Result<SearchPlan, ReasoningError> {
        let raw = self
            .complete(OutputShape::SearchPlan, &ResearchPrompts::planner(), &PromptBuilder::plan(query))
            .await?;
        let plan: SearchPlan = reasoning::parse_structured(OutputShape::SearchPlan, &raw)?;
        info!(count = plan.len(), "Planned searches");
        Ok(plan)
    }

    async fn plan_refinement(
        &self,
        query: &EnrichedQuery,
        evaluation: &Evaluation,
        existing: &str,
    ) -> Result<SearchPlan, ReasoningError> {
        let raw = self
            .complete(
                OutputShape::SearchPlan,
                &ResearchPrompts::refinement_planner(),
                &PromptBuilder::refinement(query, evaluation, existing),
            )
            .await?;
        let plan: SearchPlan = reasoning::parse_structured(OutputShape::SearchPlan, &raw)?;
        info!(count = plan.len(), "Planned refinement searches");
        Ok(plan)
    }

    async fn write(
        &self,
        query: &EnrichedQuery,
        results: &[SearchResult],
        previous: Option<&Evaluation>,
    ) -> Result<Report, ReasoningError> {
        let raw = self
            .complete(
                OutputShape::Report,
                &ResearchPrompts::writer(),
                &PromptBuilder::write(query, results, previous),
            )
            .await?;
        let report: Report = reasoning::parse_structured(OutputShape::Report, &raw)?;
        info!(words = report.word_count(), "Report written");
        Ok(report)
    }

    async fn evaluate(
        &self,
        query: &EnrichedQuery,
        report: &Report,
        context: &str,
    ) -> Result<Evaluation, ReasoningError> {
        let raw = self
            .complete(
                OutputShape::Evaluation,
                &ResearchPrompts::evaluator(),
                &PromptBuilder::evaluate(query, report, context),
            )
            .await?;
        let evaluation = reasoning::parse_evaluation(&raw)?;
        info!(
            average = evaluation.average_score(),
            acceptable = evaluation.is_acceptable,
            "Evaluation complete"
        );
        Ok(evaluation)
    }
}

// =============================================================================
// SEARCH
// =============================================================================

/// Search tool that lets an agent run the web search and summarise it.
pub struct AgentSearchTool {
    config: Config,
    web_search: WebSearchTool,
}

impl AgentSearchTool {
    pub fn new(config: Config, web_search: WebSearchTool) -> Self {
        export_ollama_host(&config);
        Self { config, web_search }
    }
}

#[async_trait]
impl SearchTool for AgentSearchTool {
    async fn search(&self, query: &str, reason: &str) -> Result<String, SearchError> {
        let client = ollama::Client::from_env();

        let agent = client
            .agent(&self.config.model)
            .preamble(&ResearchPrompts::searcher())
            .temperature(f64::from(self.config.temperature))
            .tool(self.web_search.clone())
            .build();

        let summary = agent
            .prompt(PromptBuilder::search(query, reason))
            .multi_turn(self.config.search_agent_turns)
            .await
            .map_err(|e| SearchError::Agent(e.to_string()))?;

        if summary.trim().is_empty() {
            return Err(SearchError::NoResults(query.to_string()));
        }

        debug!(query = %query, summary_len = summary.len(), "Search summarised");
        Ok(summary)
    }
}
