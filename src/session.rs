//! Conversational session
//!
//! [`ResearchSession`] is the envelope around pipeline runs: the first
//! message of a conversation is a query, which gets clarifying questions; the
//! next message answers them (or says "skip") and starts the research. Once a
//! report is out, the next message starts over with a new query.

use async_stream::stream;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::model::{EnrichedQuery, ResearchEvent};
use crate::pipeline::PipelineOrchestrator;
use crate::reasoning::ReasoningService;

/// The message that proceeds without answering clarifying questions.
const SKIP_TOKEN: &str = "skip";

/// Where a conversation is, with exactly the data that phase needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Clarifying {
        query: String,
        questions: Vec<String>,
    },
    Researching {
        query: String,
        enriched: EnrichedQuery,
    },
    Done {
        last_report: String,
    },
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::Clarifying { .. } => SessionPhase::Clarifying,
            SessionState::Researching { .. } => SessionPhase::Researching,
            SessionState::Done { .. } => SessionPhase::Done,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Clarifying,
    Researching,
    Done,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Clarifying => "clarifying",
            SessionPhase::Researching => "researching",
            SessionPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// What the session has to say in response to one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum SessionOutput {
    /// Conversational acknowledgement before slow work starts
    Notice(String),
    /// Clarifying questions to answer (or skip)
    Questions(Vec<String>),
    /// Pipeline status narration
    Progress(String),
    /// The final markdown report
    Report(String),
    /// Suggested follow-up research
    FollowUp(Vec<String>),
    /// The request could not be completed; the session is idle again
    Failed(String),
}

enum Action {
    Clarify(String),
    Research { query: String, answers: String },
}

/// Per-conversation state machine.
pub struct ResearchSession {
    state: SessionState,
    reasoner: Arc<dyn ReasoningService>,
    pipeline: Arc<PipelineOrchestrator>,
}

impl ResearchSession {
    pub fn new(reasoner: Arc<dyn ReasoningService>, pipeline: Arc<PipelineOrchestrator>) -> Self {
        Self {
            state: SessionState::Idle,
            reasoner,
            pipeline,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    /// Handle one user message.
    ///
    /// The returned stream borrows the session, so messages are handled one
    /// at a time. Blank messages produce nothing and leave the state alone.
    pub fn handle_message(&mut self, message: &str) -> impl Stream<Item = SessionOutput> + Send + '_ {
        let message = message.to_string();

        stream! {
            if message.trim().is_empty() {
                debug!(phase = %self.phase(), "Ignoring blank message");
                return;
            }

            let action = match std::mem::take(&mut self.state) {
                SessionState::Clarifying { query, .. } => {
                    let answers = if is_skip(&message) { String::new() } else { message };
                    Action::Research { query, answers }
                }
                SessionState::Researching { query, .. } => {
                    warn!(previous = %query, "Previous research run was abandoned; starting over");
                    Action::Clarify(message)
                }
                SessionState::Idle | SessionState::Done { .. } => Action::Clarify(message),
            };

            match action {
                Action::Clarify(query) => {
                    info!(query = %query, "New research query");
                    yield SessionOutput::Notice(
                        "Let me think about what I need to know to research this thoroughly...".to_string(),
                    );

                    match self.reasoner.clarify(&query).await {
                        Ok(clarifying) => {
                            self.state = SessionState::Clarifying {
                                query,
                                questions: clarifying.questions.clone(),
                            };
                            yield SessionOutput::Questions(clarifying.questions);
                        }
                        Err(e) => {
                            error!(error = %e, "Clarification failed");
                            yield SessionOutput::Failed(format!(
                                "Could not prepare clarifying questions: {}",
                                e
                            ));
                        }
                    }
                }
                Action::Research { query, answers } => {
                    let enriched = EnrichedQuery::new(&query, &answers);
                    info!(skipped = answers.trim().is_empty(), "Starting research");

                    self.state = SessionState::Researching {
                        query,
                        enriched: enriched.clone(),
                    };
                    yield SessionOutput::Notice(
                        "Starting deep research. This may take several minutes as I search, analyze, evaluate, and refine...".to_string(),
                    );

                    let pipeline = Arc::clone(&self.pipeline);
                    let run = pipeline.run_enriched(enriched);
                    futures::pin_mut!(run);

                    while let Some(event) = run.next().await {
                        match event {
                            Ok(ResearchEvent::Status(status)) => {
                                yield SessionOutput::Progress(status);
                            }
                            Ok(ResearchEvent::Report(markdown)) => {
                                self.state = SessionState::Done {
                                    last_report: markdown.clone(),
                                };
                                yield SessionOutput::Report(markdown);
                            }
                            Ok(ResearchEvent::FollowUp(questions)) => {
                                yield SessionOutput::FollowUp(questions);
                            }
                            Err(e) => {
                                error!(error = %e, "Research run failed");
                                self.state = SessionState::Idle;
                                yield SessionOutput::Failed(format!("Research failed: {}", e));
                                return;
                            }
                        }
                    }
                }
            }
        }
    }
}

fn is_skip(message: &str) -> bool {
    message.trim().eq_ignore_ascii_case(SKIP_TOKEN)
}
