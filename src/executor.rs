//! The agent execution seam
//!
//! Brood never talks to a language model or a tool itself. Each stage is
//! handed to a [`StageExecutor`], which runs the bound role (with whatever
//! search or scrape tools the role allows) and returns its raw text.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;

use crate::agent::AgentRole;
use crate::stage::{OutputSchema, StageSpec};

/// Raw output of one completed stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageOutput {
    pub stage: String,
    pub role_name: String,
    pub raw: String,
}

/// Everything the executor needs to run one stage
#[derive(Debug, Clone, Copy)]
pub struct StageInvocation<'a> {
    pub stage: &'a str,
    pub role: &'a AgentRole,
    pub instruction: &'a str,
    pub expected_output: &'a str,
    pub output_schema: Option<OutputSchema>,
    pub verbose: bool,
    /// Outputs of every earlier stage, oldest first
    pub prior: &'a [StageOutput],
}

impl<'a> StageInvocation<'a> {
    pub(crate) fn new(spec: &'a StageSpec, prior: &'a [StageOutput], verbose: bool) -> Self {
        Self {
            stage: &spec.name,
            role: &spec.agent,
            instruction: &spec.description,
            expected_output: &spec.expected_output,
            output_schema: spec.output_schema,
            verbose,
            prior,
        }
    }
}

/// Runs a single stage to completion
#[async_trait]
pub trait StageExecutor: Send + Sync {
    async fn run_stage(&self, invocation: StageInvocation<'_>) -> anyhow::Result<String>;
}

/// A recorded call made to a [`ScriptedExecutor`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub stage: String,
    pub role_name: String,
    pub instruction: String,
    pub prior_stages: Vec<String>,
}

/// Deterministic executor that replays canned outputs by stage name
///
/// Stages without a script fail, which makes it easy to exercise
/// stage-failure paths.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    outputs: HashMap<String, String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, stage: impl Into<String>, output: impl Into<String>) -> Self {
        self.outputs.insert(stage.into(), output.into());
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl StageExecutor for ScriptedExecutor {
    async fn run_stage(&self, invocation: StageInvocation<'_>) -> anyhow::Result<String> {
        self.calls.lock().push(RecordedCall {
            stage: invocation.stage.to_string(),
            role_name: invocation.role.role_name.clone(),
            instruction: invocation.instruction.to_string(),
            prior_stages: invocation.prior.iter().map(|o| o.stage.clone()).collect(),
        });

        self.outputs
            .get(invocation.stage)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no scripted output for stage `{}`", invocation.stage))
    }
}
