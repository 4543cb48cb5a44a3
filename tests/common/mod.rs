//! Scripted in-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use deep_research_agent::{
    ClarifyingQuestions, DeliveryError, DeliveryTool, EnrichedQuery, Evaluation, OutputShape,
    PipelineOrchestrator, ReasoningError, ReasoningService, Report, ResearchError, ResearchEvent,
    SearchError, SearchExecutor, SearchItem, SearchPlan, SearchResult, SearchTool,
};

pub const QUERY: &str = "impact of remote work on urban housing";

/// One recorded reasoning call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Clarify(String),
    Plan(String),
    Refine { existing_chars: usize },
    /// `previous` is the summary of the evaluation handed to the writer.
    Write { results: usize, previous: Option<String> },
    /// `report` is the markdown of the draft under evaluation.
    Evaluate { context_chars: usize, report: String },
}

pub fn plan_of(prefix: &str, n: usize) -> SearchPlan {
    SearchPlan::new(
        (1..=n)
            .map(|i| SearchItem::new(format!("{} {}", prefix, i), format!("angle {}", i)))
            .collect(),
    )
}

pub fn evaluation(acceptable: bool) -> Evaluation {
    Evaluation {
        completeness_score: if acceptable { 8 } else { 6 },
        depth_score: if acceptable { 8 } else { 5 },
        accuracy_score: 8,
        structure_score: 8,
        insight_score: 7,
        summary_of_evaluation: if acceptable {
            "Thorough and well sourced.".to_string()
        } else {
            "Lacks recent data.".to_string()
        },
        is_acceptable: acceptable,
        gaps: if acceptable {
            vec![]
        } else {
            vec!["missing 2024 data".to_string()]
        },
        additional_search_queries: vec!["urban rents 2024".to_string()],
        revision_instructions: "Add 2024 figures.".to_string(),
    }
}

// =============================================================================
// REASONING
// =============================================================================

/// Reasoner that follows a script and records every call it receives.
pub struct ScriptedReasoner {
    questions: Vec<String>,
    initial_plan: SearchPlan,
    refinement_plan: SearchPlan,
    verdicts: Mutex<VecDeque<bool>>,
    fail_on: Option<OutputShape>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedReasoner {
    pub fn new() -> Self {
        Self {
            questions: vec![
                "Which cities or regions matter most?".to_string(),
                "Are you interested in rents, prices or both?".to_string(),
                "What timeframe should the research cover?".to_string(),
            ],
            initial_plan: plan_of("initial", 7),
            refinement_plan: plan_of("gap", 4),
            verdicts: Mutex::new(VecDeque::new()),
            fail_on: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Acceptance verdicts in evaluation order; once used up, every
    /// evaluation is unacceptable.
    pub fn with_verdicts(self, verdicts: &[bool]) -> Self {
        *self.verdicts.lock().unwrap() = verdicts.iter().copied().collect();
        self
    }

    pub fn with_initial_plan(mut self, plan: SearchPlan) -> Self {
        self.initial_plan = plan;
        self
    }

    pub fn with_refinement_plan(mut self, plan: SearchPlan) -> Self {
        self.refinement_plan = plan;
        self
    }

    pub fn failing_on(mut self, shape: OutputShape) -> Self {
        self.fail_on = Some(shape);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(usize, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Write { results, previous } => Some((results, previous.is_some())),
                _ => None,
            })
            .collect()
    }

    pub fn evaluated_reports(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Evaluate { report, .. } => Some(report),
                _ => None,
            })
            .collect()
    }

    /// Evaluation summaries the writer was given, one per write.
    pub fn write_feedback(&self) -> Vec<Option<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Write { previous, .. } => Some(previous),
                _ => None,
            })
            .collect()
    }

    pub fn planned_queries(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Plan(q) => Some(q),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, shape: OutputShape) -> Result<(), ReasoningError> {
        if self.fail_on == Some(shape) {
            return Err(ReasoningError::schema(shape, "model returned prose"));
        }
        Ok(())
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoner {
    async fn clarify(&self, query: &str) -> Result<ClarifyingQuestions, ReasoningError> {
        self.record(Call::Clarify(query.to_string()));
        self.check(OutputShape::ClarifyingQuestions)?;
        Ok(ClarifyingQuestions {
            questions: self.questions.clone(),
        })
    }

    async fn plan(&self, query: &EnrichedQuery) -> Result<SearchPlan, ReasoningError> {
        self.record(Call::Plan(query.as_str().to_string()));
        self.check(OutputShape::SearchPlan)?;
        Ok(self.initial_plan.clone())
    }

    async fn plan_refinement(
        &self,
        _query: &EnrichedQuery,
        _evaluation: &Evaluation,
        existing: &str,
    ) -> Result<SearchPlan, ReasoningError> {
        self.record(Call::Refine {
            existing_chars: existing.chars().count(),
        });
        self.check(OutputShape::SearchPlan)?;
        Ok(self.refinement_plan.clone())
    }

    async fn write(
        &self,
        _query: &EnrichedQuery,
        results: &[SearchResult],
        previous: Option<&Evaluation>,
    ) -> Result<Report, ReasoningError> {
        self.record(Call::Write {
            results: results.len(),
            previous: previous.map(|e| e.summary_of_evaluation.clone()),
        });
        self.check(OutputShape::Report)?;

        let draft = self.writes().len();
        Ok(Report {
            short_summary: format!("Draft {}", draft),
            markdown_report: format!("# Draft {}\n\nBased on {} sources.", draft, results.len()),
            follow_up_questions: vec!["How do rural markets compare?".to_string()],
        })
    }

    async fn evaluate(
        &self,
        _query: &EnrichedQuery,
        report: &Report,
        context: &str,
    ) -> Result<Evaluation, ReasoningError> {
        self.record(Call::Evaluate {
            context_chars: context.chars().count(),
            report: report.markdown_report.clone(),
        });
        self.check(OutputShape::Evaluation)?;

        let round = self.evaluated_reports().len();
        let acceptable = self.verdicts.lock().unwrap().pop_front().unwrap_or(false);
        let mut evaluation = evaluation(acceptable);
        evaluation.summary_of_evaluation =
            format!("Evaluation {}: {}", round, evaluation.summary_of_evaluation);
        Ok(evaluation)
    }
}

// =============================================================================
// SEARCH
// =============================================================================

/// Search tool that answers every query except the ones told to fail.
pub struct ScriptedSearch {
    failing: HashSet<String>,
    result_chars: usize,
    delay: Duration,
    calls: AtomicUsize,
    finished: AtomicUsize,
}

impl ScriptedSearch {
    pub fn new() -> Self {
        Self {
            failing: HashSet::new(),
            result_chars: 0,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        }
    }

    pub fn failing(mut self, queries: &[&str]) -> Self {
        self.failing = queries.iter().map(|q| q.to_string()).collect();
        self
    }

    /// Pad every summary to at least `chars` characters.
    pub fn with_result_chars(mut self, chars: usize) -> Self {
        self.result_chars = chars;
        self
    }

    /// Add a fixed latency on top of the jitter.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Searches started.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Searches that ran to completion, successful or not.
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchTool for ScriptedSearch {
    async fn search(&self, query: &str, reason: &str) -> Result<String, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        // Vary latency so completion order differs from plan order.
        let jitter = (query.len() * 7 % 13) as u64;
        tokio::time::sleep(self.delay + Duration::from_millis(jitter)).await;
        self.finished.fetch_add(1, Ordering::SeqCst);

        if self.failing.contains(query) {
            return Err(SearchError::SearchFailed(format!("{} timed out", query)));
        }

        let mut summary = format!("Findings for {} ({}).", query, reason);
        while summary.chars().count() < self.result_chars {
            summary.push_str(" Rents and vacancy data.");
        }
        Ok(summary)
    }
}

// =============================================================================
// DELIVERY
// =============================================================================

/// Delivery that remembers what it was given, or fails on request.
pub struct RecordingDelivery {
    fail: bool,
    delivered: Mutex<Vec<String>>,
}

impl RecordingDelivery {
    pub fn new() -> Self {
        Self {
            fail: false,
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn delivered(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryTool for RecordingDelivery {
    async fn deliver(&self, body: &str) -> Result<String, DeliveryError> {
        if self.fail {
            return Err(DeliveryError::Rejected(503, "mail relay unavailable".to_string()));
        }
        self.delivered.lock().unwrap().push(body.to_string());
        Ok("saved to memory".to_string())
    }
}

// =============================================================================
// HELPERS
// =============================================================================

pub fn orchestrator(
    reasoner: &Arc<ScriptedReasoner>,
    search: &Arc<ScriptedSearch>,
    delivery: &Arc<RecordingDelivery>,
) -> PipelineOrchestrator {
    PipelineOrchestrator::new(
        reasoner.clone(),
        SearchExecutor::new(search.clone()),
        delivery.clone(),
    )
}

pub async fn collect<S>(stream: S) -> Vec<Result<ResearchEvent, ResearchError>>
where
    S: Stream<Item = Result<ResearchEvent, ResearchError>>,
{
    stream.collect().await
}

pub fn statuses(events: &[Result<ResearchEvent, ResearchError>]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            Ok(ResearchEvent::Status(s)) => Some(s.clone()),
            _ => None,
        })
        .collect()
}
