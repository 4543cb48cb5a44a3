//! # Research Pipeline
//!
//! One research run: plan, search, then a bounded write/evaluate/refine loop,
//! then delivery. Progress is exposed as a lazy stream of [`ResearchEvent`]s
//! that ends with exactly one `Report` and one `FollowUp` on success, or with
//! a single [`ResearchError`] when a reasoning call fails.
//!
//! The stream does no work until it is polled, and dropping it cancels
//! whatever call is in flight, including every outstanding search.

use async_stream::try_stream;
use futures::Stream;
use std::sync::Arc;
use tracing::{info, warn};

use crate::delivery::DeliveryTool;
use crate::error::ResearchError;
use crate::executor::SearchExecutor;
use crate::model::{
    results_view, EnrichedQuery, Evaluation, PipelinePhase, ResearchEvent,
    EVALUATION_CONTEXT_CHARS, REFINEMENT_CONTEXT_CHARS,
};
use crate::reasoning::ReasoningService;

/// Default number of write/evaluate rounds per run.
pub const MAX_ITERATIONS: usize = 3;

/// Drives a single research run over its collaborators.
pub struct PipelineOrchestrator {
    reasoner: Arc<dyn ReasoningService>,
    executor: SearchExecutor,
    delivery: Arc<dyn DeliveryTool>,
    max_iterations: usize,
}

impl PipelineOrchestrator {
    pub fn new(
        reasoner: Arc<dyn ReasoningService>,
        executor: SearchExecutor,
        delivery: Arc<dyn DeliveryTool>,
    ) -> Self {
        Self {
            reasoner,
            executor,
            delivery,
            max_iterations: MAX_ITERATIONS,
        }
    }

    /// Override the iteration budget. Values below 1 are raised to 1.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Research `query`, using `answers` as clarification context.
    ///
    /// Blank answers mean clarification was skipped.
    pub fn run(
        &self,
        query: &str,
        answers: &str,
    ) -> impl Stream<Item = Result<ResearchEvent, ResearchError>> + Send + '_ {
        self.run_enriched(EnrichedQuery::new(query, answers))
    }

    /// Research an already-enriched query.
    pub fn run_enriched(
        &self,
        query: EnrichedQuery,
    ) -> impl Stream<Item = Result<ResearchEvent, ResearchError>> + Send + '_ {
        let max_iterations = self.max_iterations;

        try_stream! {
            info!(max_iterations, "Starting research run");

            // ── PLAN ──
            yield ResearchEvent::status("Planning research strategy...");
            let plan = self
                .reasoner
                .plan(&query)
                .await
                .map_err(|e| ResearchError::new(PipelinePhase::Plan, e))?;
            yield ResearchEvent::status(format!(
                "Planned {} searches:\n{}",
                plan.len(),
                plan.describe()
            ));

            // ── SEARCH ──
            yield ResearchEvent::status(format!(
                "Executing {} searches in parallel...",
                plan.len()
            ));
            let mut results = self.executor.execute(&plan).await;
            yield ResearchEvent::status(format!(
                "Initial search complete. Got {} results.",
                results.len()
            ));

            // ── WRITE / EVALUATE / REFINE ──
            let mut previous: Option<Evaluation> = None;
            let mut iteration = 1;

            let report = loop {
                yield ResearchEvent::status(format!(
                    "Writing report (iteration {}/{})...",
                    iteration, max_iterations
                ));
                let report = self
                    .reasoner
                    .write(&query, &results, previous.as_ref())
                    .await
                    .map_err(|e| ResearchError::new(PipelinePhase::Write, e))?;
                yield ResearchEvent::status(format!(
                    "Draft {} complete ({} words). Evaluating quality...",
                    iteration,
                    report.word_count()
                ));

                let context = results_view(&results, EVALUATION_CONTEXT_CHARS);
                let evaluation = self
                    .reasoner
                    .evaluate(&query, &report, &context)
                    .await
                    .map_err(|e| ResearchError::new(PipelinePhase::Evaluate, e))?;
                yield ResearchEvent::status(format!(
                    "Evaluation scores: {}\n{}",
                    evaluation.score_line(),
                    evaluation.summary_of_evaluation
                ));

                if evaluation.is_acceptable {
                    info!(iteration, average = evaluation.average_score(), "Report accepted");
                    yield ResearchEvent::status("Report meets quality standards!");
                    break report;
                }

                if iteration >= max_iterations {
                    warn!(iteration, "Iteration budget exhausted without acceptance");
                    yield ResearchEvent::status("Max iterations reached. Proceeding with current report.");
                    break report;
                }

                let gaps = evaluation
                    .gaps
                    .iter()
                    .map(|g| format!("- {}", g))
                    .collect::<Vec<_>>()
                    .join("\n");
                yield ResearchEvent::status(format!(
                    "Report needs improvement. Identified gaps:\n{}\n\nPlanning additional research...",
                    gaps
                ));

                let existing = results_view(&results, REFINEMENT_CONTEXT_CHARS);
                let refinement = self
                    .reasoner
                    .plan_refinement(&query, &evaluation, &existing)
                    .await
                    .map_err(|e| ResearchError::new(PipelinePhase::Refine, e))?;
                yield ResearchEvent::status(format!(
                    "Executing {} additional searches...",
                    refinement.len()
                ));

                let new_results = self.executor.execute(&refinement).await;
                results.extend(new_results);
                previous = Some(evaluation);
                iteration += 1;

                yield ResearchEvent::status(format!(
                    "Now have {} total search results. Rewriting report...",
                    results.len()
                ));
            };

            // ── DELIVER ──
            yield ResearchEvent::status("Delivering report...");
            match self.delivery.deliver(&report.markdown_report).await {
                Ok(receipt) => {
                    yield ResearchEvent::status(format!(
                        "Report delivered ({}). Research complete.",
                        receipt
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "Report delivery failed");
                    yield ResearchEvent::status(format!(
                        "Delivery failed: {}. Research complete.",
                        e
                    ));
                }
            }

            info!(
                iterations = iteration,
                results = results.len(),
                words = report.word_count(),
                "Research run finished"
            );

            yield ResearchEvent::Report(report.markdown_report);
            yield ResearchEvent::FollowUp(report.follow_up_questions);
        }
    }
}
