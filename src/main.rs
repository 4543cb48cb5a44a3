//! # Deep Research Agent
//!
//! Interactive command-line front end for the research pipeline.
//!
//! ## Quick Start
//! ```bash
//! cargo run -- "impact of remote work on urban housing"
//! ```
//!
//! The agent asks a few clarifying questions, then researches, evaluates and
//! refines on its own. Type `skip` instead of answering to go straight to the
//! research.

// =============================================================================
// IMPORTS
// =============================================================================
use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use deep_research_agent::agent::{AgentSearchTool, RigReasoner};
use deep_research_agent::{
    Config, DeliveryTool, FileDelivery, PipelineOrchestrator, ReasoningService, ResearchSession,
    SearchExecutor, SearchTool, SessionOutput, SessionPhase, WebSearchTool, WebhookDelivery,
};

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "deep-research-agent",
    version,
    about = "An autonomous deep research agent that plans, searches, writes and self-critiques",
    long_about = r#"
Deep Research Agent - long-form research reports from a single question.

For every query the agent will:
  1. Ask a few clarifying questions (answer them, or type 'skip')
  2. Plan and run several web searches in parallel
  3. Write a report, have it evaluated, and fill the gaps it finds
  4. Deliver the final report to a file (or a webhook)

PREREQUISITES:
  1. Install Ollama: https://ollama.ai
  2. Pull a model: ollama pull llama3.2
  3. Start Ollama: ollama serve

EXAMPLES:
  # Start an interactive session
  deep-research-agent

  # Research one query without clarifying questions
  deep-research-agent --skip-clarification "impact of remote work on urban housing"

  # Machine-readable progress, one JSON object per line
  deep-research-agent --json -s "Rust async runtimes compared"
"#
)]
struct Args {
    /// Research query; omit to start an interactive session
    #[arg(value_name = "QUERY")]
    query: Option<String>,

    /// Answer every round of clarifying questions with "skip"
    #[arg(short = 's', long = "skip-clarification")]
    skip_clarification: bool,

    /// Print each output as a JSON line instead of formatted text
    #[arg(long = "json")]
    json: bool,

    /// The Ollama model to use (overrides OLLAMA_MODEL env var)
    #[arg(short = 'm', long = "model", env = "OLLAMA_MODEL")]
    model: Option<String>,

    /// Directory for saved reports (overrides REPORT_DIR env var)
    #[arg(long = "report-dir", env = "REPORT_DIR")]
    report_dir: Option<PathBuf>,

    /// Enable verbose/debug logging
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose)?;

    let mut config = Config::from_env()?;

    if let Some(model) = &args.model {
        info!(model = %model, "Using model from command line");
        config.model = model.clone();
    }
    if let Some(dir) = &args.report_dir {
        config.report_dir = dir.clone();
    }

    config.validate()?;

    info!(
        model = %config.model,
        host = %config.ollama_host,
        max_iterations = config.max_iterations,
        summarize_searches = config.summarize_searches,
        "Configuration loaded"
    );

    let mut session = build_session(&config);
    let renderer = Renderer { json: args.json };

    match args.query {
        Some(query) => run_once(&mut session, &renderer, &query, args.skip_clarification).await,
        None => run_interactive(&mut session, &renderer, args.skip_clarification).await,
    }
}

// =============================================================================
// WIRING
// =============================================================================
/// Assemble the session and its collaborators from configuration.
fn build_session(config: &Config) -> ResearchSession {
    let web_search =
        WebSearchTool::from_api_key(config.tavily_api_key.as_deref(), config.max_search_results);
    info!(backend = web_search.backend_name(), "Search backend selected");

    let search: Arc<dyn SearchTool> = if config.summarize_searches {
        Arc::new(AgentSearchTool::new(config.clone(), web_search))
    } else {
        Arc::new(web_search)
    };

    let delivery: Arc<dyn DeliveryTool> = match &config.report_webhook_url {
        Some(url) => Arc::new(WebhookDelivery::new(url.clone())),
        None => Arc::new(FileDelivery::new(config.report_dir.clone())),
    };

    let reasoner: Arc<dyn ReasoningService> = Arc::new(RigReasoner::new(config.clone()));

    let pipeline = PipelineOrchestrator::new(
        Arc::clone(&reasoner),
        SearchExecutor::new(search),
        delivery,
    )
    .with_max_iterations(config.max_iterations);

    ResearchSession::new(reasoner, Arc::new(pipeline))
}

// =============================================================================
// CONVERSATION LOOPS
// =============================================================================
/// Research a single query, reading clarification answers from stdin.
async fn run_once(
    session: &mut ResearchSession,
    renderer: &Renderer,
    query: &str,
    skip_clarification: bool,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut failed = submit(session, renderer, query, skip_clarification).await?;

    while session.phase() == SessionPhase::Clarifying {
        prompt(session.phase())?;
        let Some(answers) = next_line_or_interrupt(&mut lines, tokio::signal::ctrl_c()).await?
        else {
            break;
        };
        failed = submit(session, renderer, &answers, skip_clarification).await?;
    }

    if failed || session.phase() != SessionPhase::Done {
        anyhow::bail!("research did not complete");
    }

    info!("Research completed successfully");
    Ok(())
}

/// Chat until EOF or `exit`.
async fn run_interactive(
    session: &mut ResearchSession,
    renderer: &Renderer,
    skip_clarification: bool,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    eprintln!("Enter a research query (or 'exit' to quit).");

    loop {
        prompt(session.phase())?;
        let Some(line) = next_line_or_interrupt(&mut lines, tokio::signal::ctrl_c()).await? else {
            break;
        };

        let message = line.trim_end();
        if matches!(message.trim(), "exit" | "quit") {
            break;
        }

        submit(session, renderer, message, skip_clarification).await?;
    }

    info!("Session closed");
    Ok(())
}

/// Read the next input line. Returns `None` on EOF or when `interrupt`
/// fires first.
///
/// Listening for Ctrl-C replaces the default handler, so the prompts must
/// watch for it as well or it would be swallowed while waiting for input.
async fn next_line_or_interrupt<R, F>(lines: &mut Lines<R>, interrupt: F) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        line = lines.next_line() => Ok(line?),
        signal = interrupt => {
            signal?;
            warn!("Interrupted at prompt");
            eprintln!("\nInterrupted.");
            Ok(None)
        }
    }
}

/// Send one message and render everything it produces.
///
/// Ctrl-C abandons the message's stream, which cancels any in-flight work.
/// Returns whether the session reported a failure.
async fn submit(
    session: &mut ResearchSession,
    renderer: &Renderer,
    message: &str,
    skip_clarification: bool,
) -> Result<bool> {
    let mut message = message.to_string();

    loop {
        let mut failed = false;
        let mut asked = false;

        {
            let outputs = session.handle_message(&message);
            futures::pin_mut!(outputs);

            loop {
                tokio::select! {
                    next = outputs.next() => match next {
                        Some(output) => {
                            failed |= matches!(output, SessionOutput::Failed(_));
                            asked |= matches!(output, SessionOutput::Questions(_));
                            renderer.render(&output)?;
                        }
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => {
                        warn!("Interrupted, abandoning current request");
                        eprintln!("\nInterrupted.");
                        return Ok(true);
                    }
                }
            }
        }

        if !(asked && skip_clarification) {
            return Ok(failed);
        }

        info!("Skipping clarification");
        message = "skip".to_string();
    }
}

fn prompt(phase: SessionPhase) -> Result<()> {
    match phase {
        SessionPhase::Clarifying => eprint!("\nanswers> "),
        _ => eprint!("\nquery> "),
    }
    std::io::stderr().flush()?;
    Ok(())
}

// =============================================================================
// RENDERING
// =============================================================================
struct Renderer {
    json: bool,
}

impl Renderer {
    fn render(&self, output: &SessionOutput) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(output)?);
            return Ok(());
        }

        if let SessionOutput::Failed(message) = output {
            error!(error = %message, "Request failed");
            eprintln!("\n{}", render_text(output));
            if message.contains("onnection refused") {
                eprintln!("\nTip: Make sure Ollama is running:");
                eprintln!("   ollama serve");
            }
            return Ok(());
        }

        println!("{}", render_text(output));
        Ok(())
    }
}

fn render_text(output: &SessionOutput) -> String {
    match output {
        SessionOutput::Notice(text) => format!("\n{}", text),
        SessionOutput::Questions(questions) => {
            let mut text =
                String::from("\nBefore I dive in, I have a few questions to sharpen my research:\n\n");
            for (i, q) in questions.iter().enumerate() {
                text.push_str(&format!("{}. {}\n", i + 1, q));
            }
            text.push_str("\nPlease answer these questions (or type 'skip' to proceed without clarification).");
            text
        }
        SessionOutput::Progress(status) => format!("  > {}", status.replace('\n', "\n    ")),
        SessionOutput::Report(markdown) => {
            let rule = "=".repeat(60);
            format!("\n{rule}\nRESEARCH REPORT\n{rule}\n\n{markdown}\n\n{rule}")
        }
        SessionOutput::FollowUp(questions) => {
            let mut text = String::from("\nSuggested follow-up research:\n\n");
            for (i, q) in questions.iter().enumerate() {
                text.push_str(&format!("{}. {}\n", i + 1, q));
            }
            text.push_str("\nEnter a new query to start another research session.");
            text
        }
        SessionOutput::Failed(message) => format!("Research failed: {}", message),
    }
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// Initialize the tracing subscriber for structured logging.
///
/// `RUST_LOG` wins when set; otherwise `--verbose` selects debug output.
/// Logs go to stderr so stdout carries only the conversation.
fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
