//! # Deep Research Agent
//!
//! An autonomous research pipeline built on the Rig framework: clarify the
//! query, plan web searches, run them in parallel, draft a report, have it
//! critiqued, and close the gaps until the report is good enough or the
//! iteration budget runs out.
//!
//! ## Layout
//!
//! - [`session`]: the conversational state machine (idle, clarifying,
//!   researching, done)
//! - [`pipeline`]: one research run as a lazy stream of progress events
//! - [`executor`]: concurrent search fan-out that tolerates failures
//! - [`reasoning`], [`agent`]: the typed reasoning contract and its
//!   Ollama-backed implementation
//! - [`tools`], [`tavily`]: web search backends
//! - [`delivery`]: where finished reports go
//! - [`config`]: environment-driven configuration

pub mod agent;
pub mod config;
pub mod delivery;
pub mod error;
pub mod executor;
pub mod model;
pub mod pipeline;
pub mod prompts;
pub mod reasoning;
pub mod session;
pub mod tavily;
pub mod tools;

pub use config::Config;
pub use delivery::{DeliveryTool, FileDelivery, WebhookDelivery};
pub use error::{DeliveryError, ReasoningError, ResearchError};
pub use executor::SearchExecutor;
pub use model::{
    ClarifyingQuestions, EnrichedQuery, Evaluation, PipelinePhase, Report, ResearchEvent,
    SearchItem, SearchPlan, SearchResult,
};
pub use pipeline::{PipelineOrchestrator, MAX_ITERATIONS};
pub use reasoning::{OutputShape, ReasoningService};
pub use session::{ResearchSession, SessionOutput, SessionPhase, SessionState};
pub use tools::{SearchError, SearchTool, WebSearchTool};
