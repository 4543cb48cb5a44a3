//! Error types for the research pipeline
//!
//! Only reasoning failures abort a run. Search failures are absorbed by the
//! executor and delivery failures are narrated as status events.

use thiserror::Error;

use crate::model::PipelinePhase;
use crate::reasoning::OutputShape;

/// Failure of a reasoning-service call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReasoningError {
    #[error("Reasoning request failed: {0}")]
    Request(String),

    #[error("Response does not match the {shape} schema: {message}")]
    SchemaViolation {
        shape: OutputShape,
        message: String,
    },
}

impl ReasoningError {
    pub fn schema(shape: OutputShape, message: impl Into<String>) -> Self {
        ReasoningError::SchemaViolation {
            shape,
            message: message.into(),
        }
    }
}

/// Failure to hand the finished report to its destination.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Delivery endpoint rejected the report ({0}): {1}")]
    Rejected(u16, String),
}

/// A run-terminating failure: the phase it happened in and why.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{phase} phase failed: {source}")]
pub struct ResearchError {
    pub phase: PipelinePhase,
    #[source]
    pub source: ReasoningError,
}

impl ResearchError {
    pub fn new(phase: PipelinePhase, source: ReasoningError) -> Self {
        Self { phase, source }
    }
}
