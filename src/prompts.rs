//! Prompt templates for the research pipeline
//!
//! Instructions (agent preambles) for each reasoning role, and builders for
//! the per-call input text. Roles that must return structured data end their
//! instructions with the exact JSON object they are expected to emit.

use chrono::Utc;

use crate::model::{EnrichedQuery, Evaluation, Report, SearchResult};

/// Number of searches the initial planner is asked for.
pub const INITIAL_SEARCH_COUNT: usize = 7;

/// Number of clarifying questions asked before research starts.
pub const CLARIFYING_QUESTION_COUNT: usize = 3;

const JSON_ONLY: &str =
    "Respond with a single JSON object and nothing else. Do not wrap it in prose.";

/// Prompt templates for the research pipeline
pub struct ResearchPrompts;

impl ResearchPrompts {
    fn current_date() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    /// Clarifier: asks questions that sharpen a vague query.
    pub fn clarifier() -> String {
        format!(
            r#"# Research Clarifier

You are a research strategist. Given a research query, write exactly {count} clarifying questions whose answers would most improve the research.

Cover, in this order:
1. Scope: which aspect or angle of the topic matters most to the user
2. Depth and audience: overview or deep-dive, and who will read the result
3. Framing: timeframe, geography, industry or comparison that would sharpen the work

Keep each question to one or two sentences that can be answered briefly. Never ask about something the query already states. If the query is already precise, ask questions that push the research deeper.

{json_only}
{{"questions": ["...", "...", "..."]}}"#,
            count = CLARIFYING_QUESTION_COUNT,
            json_only = JSON_ONLY,
        )
    }

    fn planner_base() -> String {
        format!(
            r#"# Research Planner

For context, today's date is {date}.

You design web search strategies for a research query, which may include clarifying context from the user. Plan like a senior analyst:
- cover several angles of the topic, not only the obvious one
- look for data and statistics, not just general descriptions
- look for expert opinion and recent developments from the last year
- look for counterarguments and comparisons ("X vs Y", alternatives)
- ask what a skeptical reader would want checked

Each search needs a specific query string and a reason stating which gap it fills. Never repeat a search that has already been done."#,
            date = Self::current_date(),
        )
    }

    /// Planner for the first round of searches.
    pub fn planner() -> String {
        format!(
            "{}\n\nPlan exactly {} searches.\n\n{}\n{}",
            Self::planner_base(),
            INITIAL_SEARCH_COUNT,
            JSON_ONLY,
            r#"{"searches": [{"query": "...", "reason": "..."}]}"#
        )
    }

    /// Planner for gap-targeted follow-up searches.
    pub fn refinement_planner() -> String {
        format!(
            "{}\n\nPlan 3-5 narrowly targeted searches that close the gaps the evaluator found.\n\n{}\n{}",
            Self::planner_base(),
            JSON_ONLY,
            r#"{"searches": [{"query": "...", "reason": "..."}]}"#
        )
    }

    /// Search analyst: turns raw web results into a dense summary.
    pub fn searcher() -> String {
        format!(
            r#"# Search Analyst

For context, today's date is {date}.

You are given a search term and the reason it is being searched. Use the web_search tool, then write a dense summary of what you found.

The summary must:
- be 3-5 paragraphs, roughly 300-500 words
- open with the most important facts, figures and dates
- name sources and publication dates when they are known
- note where sources agree and where they disagree
- flag information that looks outdated or unreliable

Every sentence should carry information; a senior analyst will synthesise it into a report. Return only the summary."#,
            date = Self::current_date(),
        )
    }

    /// Writer: produces or revises the long-form report.
    pub fn writer() -> String {
        format!(
            r#"# Research Writer

For context, today's date is {date}.

You write comprehensive analytical research reports from search results gathered by a research team. When the input includes evaluator feedback on an earlier draft, write an improved version that fixes every point raised while keeping the factual content.

Process: read all the results, identify the themes and data points, outline, then write.

Requirements:
- 2000-4000 words in markdown with ## and ### headers, bullet points and tables where they help
- specific statistics, amounts, dates and names, attributed to their sources
- analysis and comparison rather than summary; present competing viewpoints
- sections: Executive Summary, Background, Key Findings, Analysis & Implications, Challenges & Risks, Future Outlook, Conclusions & Recommendations

{json_only}
{{"short_summary": "3-4 sentence summary", "markdown_report": "full markdown report", "follow_up_questions": ["5 specific follow-up research questions"]}}"#,
            date = Self::current_date(),
            json_only = JSON_ONLY,
        )
    }

    /// Evaluator: scores a draft and decides whether it is good enough.
    pub fn evaluator() -> String {
        format!(
            r#"# Research Evaluator

You judge whether a draft research report meets the bar for a production-quality deep research output. Be demanding: surface-level summaries score low on depth and insight.

Score each dimension from 1 to 10:
1. completeness: does it cover every aspect of the query?
2. depth: data, examples and expert perspectives beyond the surface?
3. accuracy: are claims supported by the search results, with nothing speculative stated as fact?
4. structure: clear sections, logical flow, good formatting?
5. insight: real analysis and actionable takeaways?

Set is_acceptable to true only if the average score is at least 7 and no dimension is below 5. When it is false you must list the specific gaps, 3-5 additional search queries that would fill them, and concrete revision instructions for the writer.

{json_only}
{{"completeness_score": 1, "depth_score": 1, "accuracy_score": 1, "structure_score": 1, "insight_score": 1, "summary_of_evaluation": "2-3 sentences", "is_acceptable": false, "gaps": ["..."], "additional_search_queries": ["..."], "revision_instructions": "..."}}"#,
            json_only = JSON_ONLY,
        )
    }
}

/// Builders for the per-call input text.
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn clarify(query: &str) -> String {
        format!("Research query: {}", query)
    }

    pub fn plan(query: &EnrichedQuery) -> String {
        format!("Query: {}", query)
    }

    pub fn search(query: &str, reason: &str) -> String {
        format!("Search term: {}\nReason for searching: {}", query, reason)
    }

    /// Refinement input. `existing` is an already bounded view of past results.
    pub fn refinement(query: &EnrichedQuery, evaluation: &Evaluation, existing: &str) -> String {
        format!(
            "Original query: {}\n\n\
             The evaluator identified these gaps:\n{}\n\n\
             Evaluator's suggested searches:\n{}\n\n\
             Revision instructions: {}\n\n\
             Summary of existing research (do NOT repeat these):\n{}",
            query,
            bullet_list(&evaluation.gaps),
            bullet_list(&evaluation.additional_search_queries),
            evaluation.revision_instructions,
            existing
        )
    }

    /// Writer input: every accumulated result plus optional revision feedback.
    pub fn write(
        query: &EnrichedQuery,
        results: &[SearchResult],
        previous: Option<&Evaluation>,
    ) -> String {
        let mut parts = vec![
            format!("Original query: {}", query),
            format!("\nResearch results ({} sources):", results.len()),
        ];

        for (i, result) in results.iter().enumerate() {
            parts.push(format!("\n--- Source {} ---\n{}", i + 1, result));
        }

        if let Some(eval) = previous {
            parts.push(format!(
                "\n\n--- REVISION INSTRUCTIONS ---\n\
                 A previous draft was evaluated and found wanting. Here is the feedback:\n\
                 Evaluation: {}\n\
                 Gaps identified: {}\n\
                 Revision instructions: {}\n\
                 Please write an IMPROVED version that addresses ALL of this feedback.",
                eval.summary_of_evaluation,
                eval.gaps.join(", "),
                eval.revision_instructions
            ));
        }

        parts.join("\n")
    }

    /// Evaluator input. `context` is an already bounded view of the results.
    pub fn evaluate(query: &EnrichedQuery, report: &Report, context: &str) -> String {
        format!(
            "Original query: {}\n\n--- REPORT TO EVALUATE ---\n{}\n\n--- SEARCH RESULTS USED ---\n{}",
            query, report.markdown_report, context
        )
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}
