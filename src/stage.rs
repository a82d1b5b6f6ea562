//! Pipeline stages - one resolved instruction bound to one role

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agent::AgentRole;
use crate::context::PipelineContext;
use crate::error::Result;
use crate::template::PromptTemplate;

/// Structured output a stage must emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputSchema {
    /// `{"activities": [ActivityRecord, ...]}`
    ActivityList,
}

impl fmt::Display for OutputSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputSchema::ActivityList => f.write_str("activity_list"),
        }
    }
}

/// Unresolved stage definition
#[derive(Debug, Clone)]
pub struct StageTemplate {
    pub name: String,
    pub description: PromptTemplate,
    pub expected_output: PromptTemplate,
    pub agent: Arc<AgentRole>,
    pub output_schema: Option<OutputSchema>,
    pub output_artifact: Option<PathBuf>,
}

impl StageTemplate {
    pub fn new(
        name: impl Into<String>,
        description: &str,
        expected_output: &str,
        agent: Arc<AgentRole>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            description: PromptTemplate::parse(description)?,
            expected_output: PromptTemplate::parse(expected_output)?,
            agent,
            output_schema: None,
            output_artifact: None,
        })
    }

    pub fn with_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_artifact = Some(path.into());
        self
    }

    /// Resolve both templates against the request context
    pub fn resolve(&self, ctx: &PipelineContext) -> Result<StageSpec> {
        Ok(StageSpec {
            name: self.name.clone(),
            description: self.description.render(ctx, &self.name)?,
            expected_output: self.expected_output.render(ctx, &self.name)?,
            agent: Arc::clone(&self.agent),
            output_schema: self.output_schema,
            output_artifact: self.output_artifact.clone(),
        })
    }
}

/// A resolved pipeline stage
///
/// The instruction text is fixed when the pipeline is built and never
/// re-rendered per run.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSpec {
    pub name: String,
    pub description: String,
    pub expected_output: String,
    pub agent: Arc<AgentRole>,
    pub output_schema: Option<OutputSchema>,
    pub output_artifact: Option<PathBuf>,
}
