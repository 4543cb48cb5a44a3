//! Reasoning service contract
//!
//! The pipeline's "thinking" happens behind [`ReasoningService`]: one method
//! per output shape, each returning a typed value or a typed failure. The
//! rig-backed implementation lives in [`crate::agent`]; tests substitute
//! scripted implementations.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;

use crate::error::ReasoningError;
use crate::model::{ClarifyingQuestions, EnrichedQuery, Evaluation, Report, SearchPlan, SearchResult};

/// The structured output a reasoning call is expected to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    ClarifyingQuestions,
    SearchPlan,
    Report,
    Evaluation,
}

impl fmt::Display for OutputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputShape::ClarifyingQuestions => "clarifying-questions",
            OutputShape::SearchPlan => "search-plan",
            OutputShape::Report => "report",
            OutputShape::Evaluation => "evaluation",
        };
        f.write_str(name)
    }
}

/// Source of clarifying questions, search plans, reports and evaluations.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Questions that would sharpen `query` before research starts.
    async fn clarify(&self, query: &str) -> Result<ClarifyingQuestions, ReasoningError>;

    /// The initial search plan for a run.
    async fn plan(&self, query: &EnrichedQuery) -> Result<SearchPlan, ReasoningError>;

    /// A smaller plan targeting the gaps in `evaluation`.
    ///
    /// `existing` is a bounded view of the results gathered so far.
    async fn plan_refinement(
        &self,
        query: &EnrichedQuery,
        evaluation: &Evaluation,
        existing: &str,
    ) -> Result<SearchPlan, ReasoningError>;

    /// Draft a report from every accumulated result, revising against
    /// `previous` when present.
    async fn write(
        &self,
        query: &EnrichedQuery,
        results: &[SearchResult],
        previous: Option<&Evaluation>,
    ) -> Result<Report, ReasoningError>;

    /// Judge `report`. `context` is a bounded view of the search results.
    async fn evaluate(
        &self,
        query: &EnrichedQuery,
        report: &Report,
        context: &str,
    ) -> Result<Evaluation, ReasoningError>;
}

/// Decode a model reply into `T`.
///
/// Tolerates markdown code fences and prose around the JSON object. Each
/// `{` is tried in turn and only the first complete value after it is
/// decoded, so braces in trailing prose are ignored. When no candidate
/// decodes, the first decode error is a schema violation for `shape`.
pub fn parse_structured<T: DeserializeOwned>(
    shape: OutputShape,
    raw: &str,
) -> Result<T, ReasoningError> {
    let mut first_error = None;

    for (start, _) in raw.match_indices('{') {
        let mut values = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<T>();
        match values.next() {
            Some(Ok(value)) => return Ok(value),
            Some(Err(e)) => {
                first_error.get_or_insert_with(|| e.to_string());
            }
            None => {}
        }
    }

    let message = first_error.unwrap_or_else(|| "no JSON object in response".to_string());
    Err(ReasoningError::schema(shape, message))
}

/// Decode and check the invariants serde cannot express.
pub fn parse_evaluation(raw: &str) -> Result<Evaluation, ReasoningError> {
    let evaluation: Evaluation = parse_structured(OutputShape::Evaluation, raw)?;

    if let Some((name, score)) = evaluation.out_of_range_score() {
        return Err(ReasoningError::schema(
            OutputShape::Evaluation,
            format!("{} score {} is outside 1-10", name, score),
        ));
    }

    Ok(evaluation)
}

pub fn parse_questions(raw: &str) -> Result<ClarifyingQuestions, ReasoningError> {
    let questions: ClarifyingQuestions = parse_structured(OutputShape::ClarifyingQuestions, raw)?;

    if questions.questions.iter().all(|q| q.trim().is_empty()) {
        return Err(ReasoningError::schema(
            OutputShape::ClarifyingQuestions,
            "no questions returned",
        ));
    }

    Ok(questions)
}
