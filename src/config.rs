//! # Configuration Module
//!
//! Loads the agent's configuration from environment variables (and a `.env`
//! file when present), with defaults suitable for a local Ollama setup.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::pipeline::MAX_ITERATIONS;

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================
/// Main configuration for the research agent.
#[derive(Debug, Clone)]
pub struct Config {
    /// The Ollama model to use (e.g., "llama3.2", "qwen2.5:14b")
    pub model: String,

    /// Ollama server URL (default: http://localhost:11434)
    pub ollama_host: String,

    /// Temperature for every reasoning call
    pub temperature: f32,

    /// Hits requested from the search backend per query
    pub max_search_results: usize,

    /// Write/evaluate rounds before the current draft is accepted as-is
    pub max_iterations: usize,

    /// Tool-calling turns the search agent may take per search
    pub search_agent_turns: usize,

    /// Summarise each search with an agent (false: use raw formatted hits)
    pub summarize_searches: bool,

    /// Tavily key; DuckDuckGo is used when absent
    pub tavily_api_key: Option<String>,

    /// Directory finished reports are written to
    pub report_dir: PathBuf,

    /// When set, reports are POSTed here instead of written to disk
    pub report_webhook_url: Option<String>,

    /// Log filter for the application
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: "llama3.2".to_string(),
            ollama_host: "http://localhost:11434".to_string(),
            temperature: 0.7,
            max_search_results: 5,
            max_iterations: MAX_ITERATIONS,
            search_agent_turns: 3,
            summarize_searches: true,
            tavily_api_key: None,
            report_dir: PathBuf::from("reports"),
            report_webhook_url: None,
            log_level: "info".to_string(),
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================
impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Rust Concept: The ? Operator
    ///
    /// Each numeric variable is parsed with `.context()` attached, so a typo
    /// like `TEMPERATURE=warm` fails with a message naming the variable.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (silently ignore if not found)
        let _ = dotenvy::dotenv();

        let mut config = Config::default();

        if let Ok(val) = env::var("OLLAMA_MODEL") {
            config.model = val;
        }

        if let Ok(val) = env::var("OLLAMA_API_BASE_URL") {
            config.ollama_host = val;
        }

        if let Some(val) = parse_var("TEMPERATURE", "a floating-point number (e.g., 0.7)")? {
            config.temperature = val;
        }

        if let Some(val) = parse_var("MAX_SEARCH_RESULTS", "a positive integer")? {
            config.max_search_results = val;
        }

        if let Some(val) = parse_var("MAX_RESEARCH_ITERATIONS", "a positive integer")? {
            config.max_iterations = val;
        }

        if let Some(val) = parse_var("SEARCH_AGENT_TURNS", "a positive integer")? {
            config.search_agent_turns = val;
        }

        if let Some(val) = parse_var("SUMMARIZE_SEARCHES", "true or false")? {
            config.summarize_searches = val;
        }

        config.tavily_api_key = non_empty_var("TAVILY_API_KEY");
        config.report_webhook_url = non_empty_var("REPORT_WEBHOOK_URL");

        if let Some(dir) = non_empty_var("REPORT_DIR") {
            config.report_dir = PathBuf::from(dir);
        }

        if let Ok(val) = env::var("RUST_LOG") {
            config.log_level = val;
        }

        Ok(config)
    }

    /// Validate the configuration before any work starts.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!(
                "Temperature must be between 0.0 and 2.0, got: {}",
                self.temperature
            );
        }

        if self.max_search_results == 0 {
            anyhow::bail!("MAX_SEARCH_RESULTS must be at least 1");
        }

        if self.max_iterations == 0 {
            anyhow::bail!("MAX_RESEARCH_ITERATIONS must be at least 1");
        }

        if self.search_agent_turns == 0 {
            anyhow::bail!("SEARCH_AGENT_TURNS must be at least 1");
        }

        if self.model.is_empty() {
            anyhow::bail!("OLLAMA_MODEL cannot be empty");
        }

        if let Some(url) = &self.report_webhook_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("REPORT_WEBHOOK_URL must be an http(s) URL, got: {}", url);
            }
        }

        Ok(())
    }
}

fn parse_var<T>(name: &str, expected: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be {}", name, expected)),
        Err(_) => Ok(None),
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// =============================================================================
// UNIT TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.ollama_host, "http://localhost:11434");
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.max_search_results, 5);
        assert_eq!(config.max_iterations, 3);
        assert!(config.summarize_searches);
        assert!(config.tavily_api_key.is_none());
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_temperature() {
        let config = Config {
            temperature: 3.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_budgets() {
        let no_results = Config {
            max_search_results: 0,
            ..Config::default()
        };
        assert!(no_results.validate().is_err());

        let no_iterations = Config {
            max_iterations: 0,
            ..Config::default()
        };
        assert!(no_iterations.validate().is_err());
    }

    #[test]
    fn test_config_validation_webhook_scheme() {
        let config = Config {
            report_webhook_url: Some("ftp://example.com".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            report_webhook_url: Some("https://hooks.example.com/reports".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_var_reports_variable_name() {
        env::set_var("DEEP_RESEARCH_TEST_BAD_NUMBER", "lots");
        let err = parse_var::<usize>("DEEP_RESEARCH_TEST_BAD_NUMBER", "a positive integer").unwrap_err();
        assert!(err.to_string().contains("DEEP_RESEARCH_TEST_BAD_NUMBER"));

        assert!(parse_var::<usize>("DEEP_RESEARCH_TEST_UNSET", "x").unwrap().is_none());
    }
}
