//! # Research Data Model
//!
//! The values that flow through one research run: the enriched query, search
//! plans and their results, the report, and the evaluation that judges it.
//!
//! Everything the reasoning service produces derives `Deserialize` so the
//! structured output of a model call decodes straight into these types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of search results embedded in a bounded prompt view.
pub const MAX_RESULTS_IN_VIEW: usize = 8;

/// Character cap for the search-result view given to the evaluator.
pub const EVALUATION_CONTEXT_CHARS: usize = 5000;

/// Character cap for the search-result view given to the refinement planner.
pub const REFINEMENT_CONTEXT_CHARS: usize = 3000;

/// One dense text summary returned by a search.
pub type SearchResult = String;

// =============================================================================
// QUERY
// =============================================================================

/// The original query merged with the user's clarification answers.
///
/// Built once per pipeline run and never mutated afterwards; every reasoning
/// call in the run receives the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedQuery(String);

impl EnrichedQuery {
    /// Combine a query with clarification answers.
    ///
    /// Blank answers mean the user skipped clarification, in which case the
    /// original query is used verbatim.
    pub fn new(query: &str, answers: &str) -> Self {
        if answers.trim().is_empty() {
            Self(query.to_string())
        } else {
            Self(format!(
                "Original query: {}\n\nAdditional context from user:\n{}",
                query, answers
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EnrichedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// REASONING SHAPES
// =============================================================================

/// Questions asked before research starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarifyingQuestions {
    pub questions: Vec<String>,
}

/// A single planned web search.
///
/// `reason` never changes how the search runs; it only enriches the prompt
/// given to the search tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    pub query: String,
    pub reason: String,
}

impl SearchItem {
    pub fn new(query: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            reason: reason.into(),
        }
    }
}

/// A set of searches to run concurrently. Order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPlan {
    pub searches: Vec<SearchItem>,
}

impl SearchPlan {
    pub fn new(searches: Vec<SearchItem>) -> Self {
        Self { searches }
    }

    pub fn len(&self) -> usize {
        self.searches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.searches.is_empty()
    }

    /// One `- query (reason)` line per planned search.
    pub fn describe(&self) -> String {
        self.searches
            .iter()
            .map(|s| format!("- {} ({})", s.query, s.reason))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A drafted research report. Each write replaces the previous draft whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub short_summary: String,
    pub markdown_report: String,
    pub follow_up_questions: Vec<String>,
}

impl Report {
    pub fn word_count(&self) -> usize {
        self.markdown_report.split_whitespace().count()
    }
}

/// The evaluator's verdict on one draft.
///
/// `is_acceptable` is the evaluator's own decision and is taken as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub completeness_score: u8,
    pub depth_score: u8,
    pub accuracy_score: u8,
    pub structure_score: u8,
    pub insight_score: u8,
    pub summary_of_evaluation: String,
    pub is_acceptable: bool,
    #[serde(default)]
    pub gaps: Vec<String>,
    #[serde(default)]
    pub additional_search_queries: Vec<String>,
    #[serde(default)]
    pub revision_instructions: String,
}

impl Evaluation {
    /// The five dimension scores in a fixed order.
    pub fn scores(&self) -> [(&'static str, u8); 5] {
        [
            ("Completeness", self.completeness_score),
            ("Depth", self.depth_score),
            ("Accuracy", self.accuracy_score),
            ("Structure", self.structure_score),
            ("Insight", self.insight_score),
        ]
    }

    pub fn average_score(&self) -> f32 {
        let total: u32 = self.scores().iter().map(|(_, s)| u32::from(*s)).sum();
        total as f32 / 5.0
    }

    /// Returns the name of the first score outside 1..=10, if any.
    pub fn out_of_range_score(&self) -> Option<(&'static str, u8)> {
        self.scores()
            .into_iter()
            .find(|(_, score)| !(1..=10).contains(score))
    }

    /// `Completeness: 7/10 | Depth: 6/10 | ...`
    pub fn score_line(&self) -> String {
        self.scores()
            .iter()
            .map(|(name, score)| format!("{}: {}/10", name, score))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

// =============================================================================
// PROGRESS EVENTS
// =============================================================================

/// An event emitted by a pipeline run.
///
/// A run emits any number of `Status` events, then exactly one `Report`
/// followed by exactly one `FollowUp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum ResearchEvent {
    Status(String),
    Report(String),
    FollowUp(Vec<String>),
}

impl ResearchEvent {
    pub fn status(message: impl Into<String>) -> Self {
        ResearchEvent::Status(message.into())
    }
}

/// The pipeline stages that can fail a run. Searching and delivery degrade
/// instead of failing, so they have no phase here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    Plan,
    Write,
    Evaluate,
    Refine,
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelinePhase::Plan => "plan",
            PipelinePhase::Write => "write",
            PipelinePhase::Evaluate => "evaluate",
            PipelinePhase::Refine => "refine",
        };
        f.write_str(name)
    }
}

// =============================================================================
// PROMPT VIEWS
// =============================================================================

/// A bounded, lossy projection of accumulated search results for a prompt.
///
/// Joins at most [`MAX_RESULTS_IN_VIEW`] results and cuts the text to
/// `max_chars` characters. The canonical result list is left untouched.
pub fn results_view(results: &[SearchResult], max_chars: usize) -> String {
    let joined = results
        .iter()
        .take(MAX_RESULTS_IN_VIEW)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n---\n");
    truncate_chars(&joined, max_chars).to_string()
}

/// Cut `text` to at most `max_chars` characters without splitting a char.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluation(scores: [u8; 5]) -> Evaluation {
        Evaluation {
            completeness_score: scores[0],
            depth_score: scores[1],
            accuracy_score: scores[2],
            structure_score: scores[3],
            insight_score: scores[4],
            summary_of_evaluation: "ok".to_string(),
            is_acceptable: false,
            gaps: vec![],
            additional_search_queries: vec![],
            revision_instructions: String::new(),
        }
    }

    #[test]
    fn test_enriched_query_without_answers_is_verbatim() {
        let query = EnrichedQuery::new("impact of remote work on urban housing", "");
        assert_eq!(query.as_str(), "impact of remote work on urban housing");

        let blank = EnrichedQuery::new("rust async", "   \n");
        assert_eq!(blank.as_str(), "rust async");
    }

    #[test]
    fn test_enriched_query_with_answers() {
        let query = EnrichedQuery::new("rust async", "Focus on tokio, 2024 onwards");
        assert!(query.as_str().contains("Original query: rust async"));
        assert!(query.as_str().contains("Focus on tokio, 2024 onwards"));
        assert!(query.to_string().contains("Additional context from user:"));
    }

    #[test]
    fn test_search_plan_describe() {
        let plan = SearchPlan::new(vec![
            SearchItem::new("a", "first"),
            SearchItem::new("b", "second"),
        ]);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.describe(), "- a (first)\n- b (second)");
    }

    #[test]
    fn test_report_word_count() {
        let report = Report {
            short_summary: String::new(),
            markdown_report: "## Title\n\nOne two  three\tfour".to_string(),
            follow_up_questions: vec![],
        };
        assert_eq!(report.word_count(), 6);
    }

    #[test]
    fn test_evaluation_scores() {
        let eval = evaluation([8, 7, 6, 9, 5]);
        assert!((eval.average_score() - 7.0).abs() < f32::EPSILON);
        assert_eq!(
            eval.score_line(),
            "Completeness: 8/10 | Depth: 7/10 | Accuracy: 6/10 | Structure: 9/10 | Insight: 5/10"
        );
        assert!(eval.out_of_range_score().is_none());

        let bad = evaluation([8, 0, 6, 11, 5]);
        assert_eq!(bad.out_of_range_score(), Some(("Depth", 0)));
    }

    #[test]
    fn test_evaluation_optional_fields_default() {
        let json = r#"{
            "completeness_score": 8, "depth_score": 8, "accuracy_score": 8,
            "structure_score": 8, "insight_score": 8,
            "summary_of_evaluation": "Solid.", "is_acceptable": true
        }"#;
        let eval: Evaluation = serde_json::from_str(json).unwrap();
        assert!(eval.gaps.is_empty());
        assert!(eval.revision_instructions.is_empty());
    }

    #[test]
    fn test_pipeline_phase_display() {
        assert_eq!(PipelinePhase::Plan.to_string(), "plan");
        assert_eq!(PipelinePhase::Refine.to_string(), "refine");
    }

    #[test]
    fn test_research_event_wire_format() {
        let json = serde_json::to_value(ResearchEvent::FollowUp(vec!["q".to_string()])).unwrap();
        assert_eq!(json["type"], "follow_up");
        assert_eq!(json["content"][0], "q");

        let json = serde_json::to_value(ResearchEvent::status("Planning")).unwrap();
        assert_eq!(json["type"], "status");
    }

    #[test]
    fn test_results_view_caps_count_and_length() {
        let results: Vec<SearchResult> = (0..12).map(|i| format!("result-{}", i)).collect();
        let view = results_view(&results, 10_000);
        assert!(view.contains("result-7"));
        assert!(!view.contains("result-8"));

        let long = vec!["x".repeat(6000)];
        assert_eq!(results_view(&long, EVALUATION_CONTEXT_CHARS).chars().count(), 5000);
        assert_eq!(results_view(&long, REFINEMENT_CONTEXT_CHARS).chars().count(), 3000);
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(results_view(&[], 100), "");
    }
}
