//! Brood error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building or running a pipeline
#[derive(Debug, Error)]
pub enum BroodError {
    /// A template references a parameter the context does not carry
    #[error("Missing parameter `{name}` required by stage `{stage}`")]
    MissingParameter { name: String, stage: String },

    /// A parameter is present but cannot be used the way a template or bound needs it
    #[error("Invalid parameter `{name}`: expected {expected}, found {found}")]
    InvalidParameter {
        name: String,
        expected: String,
        found: String,
    },

    /// Malformed template text
    #[error("Template error: {0}")]
    Template(String),

    /// The execution collaborator failed a stage
    #[error("Stage `{stage}` failed: {source}")]
    StageExecution {
        stage: String,
        #[source]
        source: anyhow::Error,
    },

    /// Final stage output does not match the activity list schema
    #[error("Schema validation failed{}: field `{field}` {reason}", record_suffix(.index))]
    SchemaValidation {
        index: Option<usize>,
        field: String,
        reason: String,
    },

    /// Final stage returned too few or too many activities
    #[error("Expected between {min} and {max} activities, got {actual}")]
    CountBounds { min: usize, max: usize, actual: usize },

    /// Run was cancelled between stages
    #[error("Run cancelled before stage `{before_stage}`")]
    Cancelled { before_stage: String },

    /// Artifact could not be written
    #[error("Failed to write artifact {}: {source}", .path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BroodError {
    pub(crate) fn schema(index: Option<usize>, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaValidation {
            index,
            field: field.into(),
            reason: reason.into(),
        }
    }
}

fn record_suffix(index: &Option<usize>) -> String {
    index.map(|i| format!(" on record {i}")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, BroodError>;
